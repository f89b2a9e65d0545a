/// Playthrough — play a repository's history in the terminal.
///
/// Usage: playthrough (--commits <commits.json> | --repo <owner/name>)
///                    [--style <fantasy|scifi|horror>] [--config <config.ron>]
///                    [--seed <n>] [--token-env <VAR>]
///
/// Commands:
///   a | b | c         — pick a listed choice
///   say <text>        — answer in your own words
///   save <slot>       — save the game
///   load <slot>       — load a saved game
///   saves             — list saved games
///   delete <slot>     — delete a saved game
///   stats             — show player stats and quest log
///   music             — toggle the (headless) music transport
///   volume <0-1>      — set master volume
///   help              — list commands
///   quit              — exit

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::sync::mpsc;

use commit_quest::config::GameConfig;
use commit_quest::core::audio::HeadlessEngine;
use commit_quest::core::composer::Composer;
use commit_quest::core::narrative::NarrativeSource;
use commit_quest::core::session::Session;
use commit_quest::core::source::{load_commits_json, CommitSource, GithubSource, RepoRef};
use commit_quest::core::store::DirStore;
use commit_quest::core::story::{EpilogueAction, GameEvent, Phase, StoryMachine, TurnOutcome};
use commit_quest::schema::commit::CommitRecord;
use commit_quest::schema::scene::{Scene, Selection};
use commit_quest::schema::style::Style;

const USAGE: &str = "Usage: playthrough (--commits <commits.json> | --repo <owner/name>) \
[--style <fantasy|scifi|horror>] [--config <config.ron>] [--seed <n>] [--token-env <VAR>]";

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut commits_path = None;
    let mut repo_arg = None;
    let mut style_arg: Option<Style> = None;
    let mut config_path = None;
    let mut seed: Option<u64> = None;
    let mut token_env = "GITHUB_TOKEN".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--commits" if i + 1 < args.len() => {
                i += 1;
                commits_path = Some(args[i].clone());
            }
            "--repo" if i + 1 < args.len() => {
                i += 1;
                repo_arg = Some(args[i].clone());
            }
            "--style" if i + 1 < args.len() => {
                i += 1;
                style_arg = Some(args[i].parse().unwrap_or_else(|e| fail(e)));
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = Some(args[i].parse().unwrap_or_else(|_| fail("--seed must be a number")));
            }
            "--token-env" if i + 1 < args.len() => {
                i += 1;
                token_env = args[i].clone();
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("{USAGE}");
                process::exit(1);
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => GameConfig::load_from_ron(Path::new(path))
            .unwrap_or_else(|e| fail(format!("reading config '{path}': {e}"))),
        None => GameConfig::default(),
    };
    let style = style_arg.unwrap_or(config.style);

    let (repo_name, commits) = match (&commits_path, &repo_arg) {
        (Some(path), None) => {
            let commits = load_commits_json(Path::new(path))
                .unwrap_or_else(|e| fail(format!("reading commits from '{path}': {e}")));
            (path.clone(), commits)
        }
        (None, Some(repo)) => fetch_repo(repo, &token_env, config.max_commits),
        _ => {
            eprintln!("Error: exactly one of --commits or --repo is required");
            eprintln!("{USAGE}");
            process::exit(1);
        }
    };

    let mut builder = NarrativeSource::builder();
    if let Some(dir) = &config.styles_dir {
        builder = builder.styles_dir(&dir.to_string_lossy());
    }
    if let Some(completer) = config.completer() {
        builder = builder.completer(completer);
    }
    let narrative = builder
        .build()
        .unwrap_or_else(|e| fail(format!("loading styles: {e}")));
    let store = DirStore::open(&config.save_dir)
        .unwrap_or_else(|e| fail(format!("opening save directory: {e}")));
    let mut story = match seed {
        Some(seed) => StoryMachine::with_seed(narrative, store, seed),
        None => StoryMachine::new(narrative, store),
    };
    let (tx, rx) = mpsc::channel();
    story.subscribe(tx);

    let mut composer = Composer::new(HeadlessEngine::new());
    composer.set_volume(config.volume);
    let mut session = Session::new(composer, story);

    match session.new_game(&repo_name, style, commits) {
        Ok(_) => {}
        Err(e) => fail(e),
    }
    println!(
        "{} — {} commits, style {}. Type 'help' for commands.\n",
        session.story().narrative().profile(style).title,
        session.state().map_or(0, |s| s.commits.len()),
        style
    );
    drain(&rx);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("quest> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
            None => (line.to_lowercase(), ""),
        };

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Farewell.");
                break;
            }
            "help" | "?" => print_help(),
            "a" | "b" | "c" | "1" | "2" | "3" => {
                let index = match cmd.as_str() {
                    "a" | "1" => 0,
                    "b" | "2" => 1,
                    _ => 2,
                };
                choose(&mut session, Selection::Option(index), style);
            }
            "say" if !rest.is_empty() => {
                choose(&mut session, Selection::Custom(rest.to_string()), style);
            }
            "save" if !rest.is_empty() => match session.save_game(rest) {
                Ok(()) => println!("Saved to slot '{rest}'."),
                Err(e) => println!("Save failed: {e}"),
            },
            "load" if !rest.is_empty() => match session.load_game(rest) {
                Ok(state) => println!(
                    "Loaded '{}' at commit {} of {}.",
                    state.repo,
                    state.commit_index + 1,
                    state.commits.len()
                ),
                Err(e) => println!("Load failed: {e}"),
            },
            "saves" => match session.story_mut().list_saves() {
                Ok(saves) if saves.is_empty() => println!("No saved games."),
                Ok(saves) => {
                    for s in saves {
                        println!(
                            "  {:<12} {:<30} {:<8} {:>3.0}%  level {:<2} {}",
                            s.slot,
                            s.repo,
                            s.style,
                            s.progress * 100.0,
                            s.level,
                            s.saved_at.unwrap_or_default()
                        );
                    }
                }
                Err(e) => println!("Could not list saves: {e}"),
            },
            "delete" if !rest.is_empty() => match session.story_mut().delete_save(rest) {
                Ok(true) => println!("Deleted '{rest}'."),
                Ok(false) => println!("No save named '{rest}'."),
                Err(e) => println!("Delete failed: {e}"),
            },
            "stats" => print_stats(&session),
            "music" => {
                let playing = session.composer_mut().toggle();
                println!("Music {}.", if playing { "playing" } else { "paused" });
            }
            "volume" => match rest.parse::<f64>() {
                Ok(v) => {
                    session.composer_mut().set_volume(v);
                    println!("Volume {:.2}.", session.composer().volume());
                }
                Err(_) => println!("Usage: volume <0-1>"),
            },
            _ => println!("Unknown command '{line}'. Type 'help'."),
        }
        drain(&rx);
    }

    session.shutdown();
}

fn fetch_repo(repo: &str, token_env: &str, max: usize) -> (String, Vec<CommitRecord>) {
    let repo = RepoRef::parse(repo).unwrap_or_else(|e| fail(e));
    let token = std::env::var(token_env).ok().filter(|t| !t.is_empty());
    let source = GithubSource::new(token);
    let meta = source
        .fetch_repo_metadata(&repo)
        .unwrap_or_else(|e| fail(e));
    println!(
        "{} ({} stars){}",
        meta.full_name,
        meta.stars,
        meta.description
            .as_deref()
            .map(|d| format!(": {d}"))
            .unwrap_or_default()
    );
    let commits = source
        .fetch_commits(&repo, max)
        .unwrap_or_else(|e| fail(e));
    (repo.to_string(), commits)
}

fn choose(session: &mut Session<HeadlessEngine, DirStore>, selection: Selection, style: Style) {
    if session.story().phase() == Phase::Epilogue {
        let current = session.state().map_or(style, |s| s.style);
        let next = Style::ALL
            .iter()
            .copied()
            .find(|&s| s != current)
            .unwrap_or(current);
        match session.handle_epilogue(&selection, next) {
            Ok(Some(EpilogueAction::NewRepository)) => {
                println!("Run playthrough again with another --repo or --commits to explore a new history.");
            }
            Ok(Some(_)) => {}
            Ok(None) => println!("Pick A, B or C."),
            Err(e) => println!("{e}"),
        }
        return;
    }
    match session.make_choice(selection) {
        Ok(TurnOutcome::Ignored) => println!("(still writing the next scene...)"),
        Ok(_) => {}
        Err(e) => println!("{e}"),
    }
}

fn drain(rx: &mpsc::Receiver<GameEvent>) {
    for event in rx.try_iter() {
        match event {
            GameEvent::SceneReady {
                scene,
                commit,
                progress,
            } => {
                if let Some(commit) = commit {
                    println!(
                        "[{} by {}, {:.0}%]",
                        commit.short_sha,
                        commit.author.handle(),
                        progress * 100.0
                    );
                }
                print_scene(&scene);
            }
            GameEvent::StatsUpdated(stats) => println!(
                "HP {}/{}  level {}  XP {}  items {}",
                stats.hp,
                stats.max_hp,
                stats.level,
                stats.xp,
                stats.inventory.len()
            ),
            GameEvent::QuestsUpdated(quests) => {
                if let Some(latest) = quests.first() {
                    println!("Quest log: {latest}");
                }
            }
        }
    }
}

fn print_scene(scene: &Scene) {
    println!();
    println!("{}", scene.narrative);
    println!();
    for choice in &scene.choices {
        println!("  {}) {}", choice.label, choice.text);
    }
    println!();
}

fn print_stats(session: &Session<HeadlessEngine, DirStore>) {
    let Some(state) = session.state() else {
        println!("No game in progress.");
        return;
    };
    let stats = &state.stats;
    println!(
        "Chapter {}, commit {} of {}",
        state.chapter,
        state.commit_index + 1,
        state.commits.len()
    );
    println!(
        "HP {}/{}  level {}  XP {}",
        stats.hp, stats.max_hp, stats.level, stats.xp
    );
    if stats.inventory.is_empty() {
        println!("Inventory: empty");
    } else {
        println!("Inventory: {}", stats.inventory.join(", "));
    }
    for entry in &state.quest_log {
        println!("  - {entry}");
    }
}

fn print_help() {
    println!("Commands:");
    println!("  a | b | c         pick a listed choice");
    println!("  say <text>        answer in your own words");
    println!("  save <slot>       save the game");
    println!("  load <slot>       load a saved game");
    println!("  saves             list saved games");
    println!("  delete <slot>     delete a saved game");
    println!("  stats             show player stats and quest log");
    println!("  music             toggle the music transport");
    println!("  volume <0-1>      set master volume");
    println!("  quit              exit");
}
