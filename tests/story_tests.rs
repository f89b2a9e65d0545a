/// Story integration tests — whole playthroughs through the public API.
use commit_quest::core::consequences::{level_for_xp, XP_PER_LEVEL};
use commit_quest::core::narrative::NarrativeSource;
use commit_quest::core::store::MemoryStore;
use commit_quest::core::story::{Phase, StoryMachine, TurnOutcome};
use commit_quest::schema::commit::{Author, CommitRecord};
use commit_quest::schema::scene::Selection;
use commit_quest::schema::state::INVENTORY_CAPACITY;
use commit_quest::schema::style::Style;
use pretty_assertions::assert_eq;

fn commit(i: usize, subject: &str) -> CommitRecord {
    CommitRecord::new(
        &format!("{:08x}{:032x}", 0x1000 + i * 4099, i),
        subject,
        Author {
            name: format!("dev{}", i % 3),
            login: Some(format!("dev{}", i % 3)),
            avatar: None,
        },
        &format!("2024-05-{:02}T{:02}:15:00Z", 1 + i % 28, (i * 5) % 24),
    )
    .unwrap()
}

fn history(subjects: &[&str]) -> Vec<CommitRecord> {
    subjects
        .iter()
        .enumerate()
        .map(|(i, s)| commit(i, s))
        .collect()
}

fn machine(seed: u64) -> StoryMachine {
    StoryMachine::with_seed(
        NarrativeSource::templates_only().unwrap(),
        MemoryStore::new(),
        seed,
    )
}

const MIXED: [&str; 20] = [
    "Initial commit",
    "fix: null pointer in parser",
    "add login page",
    "refactor session handling",
    "hotfix for broken build",
    "implement search",
    "Merge pull request #4 from dev1/search",
    "patch memory leak",
    "new settings screen",
    "release v1.0.0",
    "fix typo in readme",
    "feat: export to csv",
    "clean up warnings",
    "add dark mode",
    "bug in date picker",
    "update dependencies",
    "feat: keyboard shortcuts",
    "add tests",
    "docs: contributing guide",
    "bump version",
];

#[test]
fn fifteen_turns_keep_health_and_levels_consistent() {
    for seed in [1, 7, 42, 1234] {
        let mut story = machine(seed);
        story
            .start_game("acme/widgets", Style::Fantasy, history(&MIXED))
            .unwrap();
        let mut levels_seen = vec![1];

        for turn in 0..15 {
            let outcome = story.make_choice(Selection::Option(turn % 3)).unwrap();
            assert!(matches!(outcome, TurnOutcome::Scene(_)));

            let stats = &story.state().unwrap().stats;
            assert!(stats.hp <= stats.max_hp, "hp {} > max {}", stats.hp, stats.max_hp);
            assert!(stats.hp >= 1);
            assert_eq!(stats.level, level_for_xp(stats.xp));
            if stats.level > 1 {
                assert!(stats.xp >= XP_PER_LEVEL[stats.level as usize - 1]);
            }
            levels_seen.push(stats.level);
        }
        assert!(levels_seen.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] + 1));
    }
}

#[test]
fn risky_fix_choices_never_kill() {
    let subjects: Vec<&str> = std::iter::repeat("fix crash").take(40).collect();
    let mut story = machine(3);
    story
        .start_game("acme/widgets", Style::Horror, history(&subjects))
        .unwrap();
    for _ in 0..30 {
        story.make_choice(Selection::Option(0)).unwrap();
        let stats = &story.state().unwrap().stats;
        assert!(stats.hp >= 1 && stats.hp <= stats.max_hp);
    }
    // 300 damage against at most 120 healing bottoms out at least once.
    assert!(story.state().unwrap().stats.hp <= 11);
}

#[test]
fn inventory_is_capped_and_unique() {
    let subjects: Vec<&str> = std::iter::repeat("feat: another shiny thing")
        .take(60)
        .collect();
    let mut story = machine(99);
    story
        .start_game("acme/widgets", Style::Scifi, history(&subjects))
        .unwrap();
    for _ in 0..58 {
        story.make_choice(Selection::Option(1)).unwrap();
        let inventory = &story.state().unwrap().stats.inventory;
        assert!(inventory.len() <= INVENTORY_CAPACITY);
        let mut unique = inventory.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), inventory.len());
    }
    assert!(!story.state().unwrap().stats.inventory.is_empty());
}

#[test]
fn commit_index_only_moves_forward() {
    let mut story = machine(5);
    story
        .start_game("acme/widgets", Style::Fantasy, history(&MIXED[..8]))
        .unwrap();
    let mut last = 0;
    let selections = [
        Selection::Option(0),
        Selection::Custom("sneak around the build server".to_string()),
        Selection::Option(5),
        Selection::Option(2),
        Selection::Custom("   ".to_string()),
        Selection::Option(1),
    ];
    for _ in 0..4 {
        for selection in selections.iter().cloned() {
            let _ = story.make_choice(selection);
            let state = story.state().unwrap();
            assert!(state.commit_index >= last);
            assert!(state.commit_index <= state.commits.len() - 1);
            last = state.commit_index;
        }
    }
    assert_eq!(story.phase(), Phase::Epilogue);
}

#[test]
fn three_commits_end_in_epilogue() {
    let mut story = machine(8);
    story
        .start_game(
            "acme/widgets",
            Style::Scifi,
            history(&["Initial commit", "add core", "fix: tests"]),
        )
        .unwrap();

    assert!(matches!(
        story.make_choice(Selection::Option(1)).unwrap(),
        TurnOutcome::Scene(_)
    ));
    let TurnOutcome::Epilogue(scene) = story.make_choice(Selection::Option(2)).unwrap() else {
        panic!("expected the epilogue after the last commit");
    };
    assert!(scene.is_epilogue);
    assert_eq!(scene.choices.len(), 3);
    assert_eq!(story.phase(), Phase::Epilogue);
    assert_eq!(story.state().unwrap().history.len(), 2);
    assert!(story.make_choice(Selection::Option(0)).is_err());
}

#[test]
fn save_then_load_restores_identical_state() {
    let mut story = machine(21);
    story
        .start_game("acme/widgets", Style::Horror, history(&MIXED))
        .unwrap();
    for turn in 0..6 {
        story.make_choice(Selection::Option(turn % 3)).unwrap();
    }
    story.save_game("before-boss").unwrap();
    let saved = story.state().unwrap().clone();

    for _ in 0..3 {
        story.make_choice(Selection::Option(0)).unwrap();
    }
    assert_ne!(story.state().unwrap().commit_index, saved.commit_index);

    let loaded = story.load_game("before-boss").unwrap().clone();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.commit_index, 6);
    assert_eq!(loaded.history.len(), 6);
    assert_eq!(story.phase(), Phase::AwaitingChoice);
    assert_eq!(story.current_scene(), saved.current_scene.as_ref());
}

#[test]
fn saves_are_listed_and_deleted() {
    let mut story = machine(2);
    story
        .start_game("acme/widgets", Style::Fantasy, history(&MIXED))
        .unwrap();
    story.make_choice(Selection::Option(1)).unwrap();
    story.save_game("alpha").unwrap();
    story.save_game("beta").unwrap();

    let slots: Vec<String> = story
        .list_saves()
        .unwrap()
        .into_iter()
        .map(|s| s.slot)
        .collect();
    assert!(slots.contains(&"alpha".to_string()));
    assert!(slots.contains(&"beta".to_string()));
    assert!(slots.contains(&"auto".to_string()));

    assert!(story.delete_save("alpha").unwrap());
    assert!(!story.delete_save("alpha").unwrap());
    assert!(story.load_game("alpha").is_err());
}

#[test]
fn empty_history_does_not_start() {
    let mut story = machine(1);
    assert!(story
        .start_game("acme/empty", Style::Fantasy, Vec::new())
        .is_err());
    assert_eq!(story.phase(), Phase::Idle);
    assert!(story.state().is_none());
}
