/// Scripted Playthrough example — plays a small release history to the end.
///
/// A mini history: first commit → feature → bug fix → refactor → merge → release.
/// Every turn takes the first listed choice; the epilogue then replays the
/// history in another style.
///
/// Run with: cargo run --example scripted_playthrough

use commit_quest::core::audio::HeadlessEngine;
use commit_quest::core::composer::Composer;
use commit_quest::core::narrative::NarrativeSource;
use commit_quest::core::session::Session;
use commit_quest::core::store::MemoryStore;
use commit_quest::core::story::{EpilogueAction, StoryMachine, TurnOutcome};
use commit_quest::schema::commit::{Author, CommitRecord};
use commit_quest::schema::scene::{Scene, Selection};
use commit_quest::schema::style::Style;

fn author(name: &str, login: &str) -> Author {
    Author {
        name: name.to_string(),
        login: Some(login.to_string()),
        avatar: None,
    }
}

fn print_scene(scene: &Scene) {
    println!("{}\n", scene.narrative);
    for choice in &scene.choices {
        println!("  {}) {}", choice.label, choice.text);
    }
    println!();
}

fn main() {
    // --- A release cycle, oldest first ---
    let history = [
        ("1a2b3c4d5e6f", "Initial commit", "Ada Lovelace", "ada", "2024-05-01T09:12:00Z"),
        ("2b3c4d5e6f7a", "feat: add the lantern inventory", "Grace Hopper", "grace", "2024-05-02T14:40:00Z"),
        ("3c4d5e6f7a8b", "fix: crash when the lantern runs dry", "Ada Lovelace", "ada", "2024-05-03T23:55:00Z"),
        ("4d5e6f7a8b9c", "refactor: split the map loader", "Linus Pauling", "linus", "2024-05-06T11:05:00Z"),
        ("5e6f7a8b9c0d", "Merge pull request #12 from grace/lanterns", "Grace Hopper", "grace", "2024-05-07T16:20:00Z"),
        ("6f7a8b9c0d1e", "Release v1.0.0", "Ada Lovelace", "ada", "2024-05-08T10:00:00Z"),
    ];
    let commits: Vec<CommitRecord> = history
        .iter()
        .map(|(sha, message, name, login, date)| {
            CommitRecord::new(sha, message, author(name, login), date)
                .expect("Failed to build commit record")
        })
        .collect();

    // --- Templates only, fixed seed: the run is reproducible ---
    let narrative = NarrativeSource::templates_only().expect("Failed to load style data");
    let story = StoryMachine::with_seed(narrative, MemoryStore::new(), 2026);
    let mut session = Session::new(Composer::new(HeadlessEngine::new()), story);

    let first = session
        .new_game("ada/lanterns", Style::Fantasy, commits)
        .expect("Failed to start game");

    if let Some(plan) = session.composer().plan() {
        println!(
            "Soundtrack: {} bpm, {:?} scale rooted {} semitones above C\n",
            plan.bpm, plan.scale, plan.root
        );
    }

    println!("=== Scene 1 ===\n");
    print_scene(&first);

    // --- Take the first choice until the history runs out ---
    let mut turn = 1;
    loop {
        turn += 1;
        match session
            .make_choice(Selection::Option(0))
            .expect("Turn failed")
        {
            TurnOutcome::Scene(scene) => {
                println!("=== Scene {turn} ===\n");
                print_scene(&scene);
            }
            TurnOutcome::Epilogue(scene) => {
                println!("=== Epilogue ===\n");
                print_scene(&scene);
                break;
            }
            TurnOutcome::Ignored => unreachable!("no scene is being generated"),
        }
        if let Some(state) = session.state() {
            let stats = &state.stats;
            println!(
                "  [HP {}/{}  level {}  XP {}  items {}]\n",
                stats.hp,
                stats.max_hp,
                stats.level,
                stats.xp,
                stats.inventory.len()
            );
        }
    }

    // --- Quest log ---
    if let Some(state) = session.state() {
        println!("Quest log:");
        for entry in &state.quest_log {
            println!("  - {entry}");
        }
        println!();
    }

    // --- Replay in another style ---
    let action = session
        .handle_epilogue(&Selection::Option(1), Style::Horror)
        .expect("Epilogue failed");
    assert_eq!(action, Some(EpilogueAction::ReplayWithStyle));
    if let Some(scene) = session.story().current_scene() {
        println!("=== Replay in {} ===\n", Style::Horror);
        print_scene(scene);
    }

    session.shutdown();
}
