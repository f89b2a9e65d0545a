/// Plan Dump — prints the musical plan derived from a commit history.
///
/// Usage: plan_dump --commits <commits.json> [--style <fantasy|scifi|horror>] [--json]

use std::env;
use std::path::Path;
use std::process;

use commit_quest::core::analyzer::analyze;
use commit_quest::core::audio::StepEvent;
use commit_quest::core::composer::gated_layers;
use commit_quest::core::plan::MusicalPlan;
use commit_quest::core::source::load_commits_json;
use commit_quest::core::style_profile::StyleLibrary;
use commit_quest::schema::style::Style;

const USAGE: &str =
    "Usage: plan_dump --commits <commits.json> [--style <fantasy|scifi|horror>] [--json]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    let mut commits_path = None;
    let mut style = Style::default();
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--commits" if i + 1 < args.len() => {
                i += 1;
                commits_path = Some(args[i].clone());
            }
            "--style" if i + 1 < args.len() => {
                i += 1;
                style = args[i].parse().unwrap_or_else(|e| {
                    eprintln!("Error: {e}");
                    process::exit(1);
                });
            }
            "--json" => json = true,
            "--help" | "-h" => {
                println!("{USAGE}");
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("{USAGE}");
                process::exit(1);
            }
        }
        i += 1;
    }

    let commits_path = commits_path.unwrap_or_else(|| {
        eprintln!("Error: --commits is required");
        eprintln!("{USAGE}");
        process::exit(1);
    });

    let commits = load_commits_json(Path::new(&commits_path)).unwrap_or_else(|e| {
        eprintln!("Error reading commits from '{}': {}", commits_path, e);
        process::exit(1);
    });
    let analysis = analyze(&commits).unwrap_or_else(|| {
        eprintln!("Error: '{}' contains no commits", commits_path);
        process::exit(1);
    });
    let library = StyleLibrary::builtin().unwrap_or_else(|e| {
        eprintln!("Error loading styles: {e}");
        process::exit(1);
    });
    let profile = library.get(style);
    let plan = MusicalPlan::derive(profile, &analysis);

    if json {
        match serde_json::to_string_pretty(&plan) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("Error serializing plan: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let music = &analysis.music;
    println!("Commits:   {} by {} authors", analysis.total_commits, analysis.author_count);
    println!("Seed:      {:#010x}", analysis.hash_seed);
    println!(
        "Key:       {} {:?} ({:?} mode by peak hour {:02}:00)",
        plan.root_name(),
        plan.scale,
        music.mode,
        analysis.peak_hour
    );
    println!(
        "Tempo:     {} bpm, energy {:.2}, complexity {:.2}",
        plan.bpm, music.energy, music.complexity
    );
    println!("Layers:    {:?}", gated_layers(profile, &analysis));
    println!();

    println!("Melody:");
    for (step, event) in plan.melody.iter().enumerate() {
        println!("  {:2}  {}", step, describe(event, plan.bpm));
    }
    println!("Bass:      {}", steps_line(&plan.bass));
    let chords: Vec<String> = plan
        .chords
        .iter()
        .map(|triad| {
            triad
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join("-")
        })
        .collect();
    println!("Chords:    {}", chords.join(" | "));
    let kit: String = plan
        .percussion
        .iter()
        .map(|&v| match v {
            v if v >= 0.75 => 'X',
            v if v >= 0.4 => 'x',
            v if v > 0.0 => '.',
            _ => '-',
        })
        .collect();
    println!("Drums:     {kit}");
}

fn describe(event: &StepEvent, bpm: u32) -> String {
    match event {
        StepEvent::Rest => "rest".to_string(),
        StepEvent::Note {
            pitches,
            duration,
            velocity,
        } => {
            let names: Vec<String> = pitches.iter().map(|p| p.name()).collect();
            let hz: Vec<String> = pitches
                .iter()
                .map(|p| format!("{:.1}", p.frequency()))
                .collect();
            format!(
                "{:<6} {:>8} Hz  {:<3} {:.3}s  vel {:.2}",
                names.join("+"),
                hz.join("+"),
                duration.notation(),
                duration.seconds(bpm),
                velocity
            )
        }
        StepEvent::Hit { velocity } => format!("hit vel {velocity:.2}"),
    }
}

fn steps_line(events: &[StepEvent]) -> String {
    events
        .iter()
        .map(|e| match e {
            StepEvent::Note { pitches, .. } => pitches
                .iter()
                .map(|p| p.name())
                .collect::<Vec<_>>()
                .join("+"),
            StepEvent::Rest => "-".to_string(),
            StepEvent::Hit { .. } => "x".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
