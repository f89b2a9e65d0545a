/// Prompt construction and response parsing for the language-model producer.

use regex::Regex;
use std::fmt::Write;
use std::sync::OnceLock;

use super::SceneContext;
use crate::core::classify::{classifier, CommitCategory};
use crate::schema::scene::{Choice, Scene};
use crate::schema::state::{chapter_for, progress_fraction};

/// Longest commit body quoted into a prompt, in characters.
const BODY_MAX_CHARS: usize = 400;

/// Choices offered when a response carries none we can recover.
pub const GENERIC_CHOICES: [(&str, &str); 3] = [
    ("A", "Press forward boldly"),
    ("B", "Proceed with caution"),
    ("C", "Take a moment to rest"),
];

pub fn generic_choices() -> Vec<Choice> {
    GENERIC_CHOICES
        .iter()
        .map(|(label, text)| Choice::new(label, text))
        .collect()
}

/// Coarse time-of-day band for an hour, 0-23.
pub fn time_of_day(hour: u8) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        21..=23 => "night",
        _ => "the dead of night",
    }
}

/// User prompt for the scene at `ctx.current_index`.
pub fn build_prompt(ctx: &SceneContext<'_>) -> String {
    let total = ctx.commits.len();
    let index = ctx.current_index;
    let progress = (progress_fraction(index, total) * 100.0).round();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Chapter {}, quest {} of {} ({progress}% of the journey).",
        chapter_for(index),
        index + 1,
        total
    );
    out.push('\n');

    if let Some(commit) = ctx.current_commit() {
        let _ = writeln!(out, "Current event:");
        let _ = writeln!(out, "- Title: {}", commit.subject);
        if !commit.body.is_empty() {
            let body: String = commit.body.chars().take(BODY_MAX_CHARS).collect();
            let _ = writeln!(out, "- Details: {}", body.replace('\n', " "));
        }
        let kinds: Vec<&str> = classifier()
            .categories(&commit.subject)
            .iter()
            .map(CommitCategory::label)
            .collect();
        if !kinds.is_empty() {
            let _ = writeln!(out, "- Kind: {}", kinds.join(", "));
        }
        let _ = writeln!(out, "- Actor: {}", commit.author.handle());
        let _ = writeln!(
            out,
            "- Time: {} ({:02}:00)",
            time_of_day(commit.hour),
            commit.hour
        );
    }

    match index.checked_sub(1).and_then(|i| ctx.commits.get(i)) {
        Some(previous) => {
            let _ = writeln!(out, "Previous event: {}", previous.subject);
        }
        None => {
            let _ = writeln!(out, "This is the beginning of the journey.");
        }
    }
    if let Some(choice) = ctx.prior_choice {
        let _ = writeln!(out, "The player chose: \"{choice}\"");
    }

    let player = ctx.player;
    let inventory = if player.inventory.is_empty() {
        "empty".to_string()
    } else {
        player.inventory.join(", ")
    };
    let _ = writeln!(
        out,
        "Player: HP {}/{}, level {}, XP {}, inventory: {inventory}.",
        player.hp, player.max_hp, player.level, player.xp
    );
    out.push('\n');
    out.push_str(
        "Continue the story with the next scene, reacting to the player's choice. \
         End with exactly three choices labeled A), B) and C).",
    );
    out
}

fn marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    // A line starting with an optional bullet or bold marker, then A-C and a
    // closing bracket, period or colon: "A)", "**B.**", "[C]", "- A:".
    MARKER.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*(?:[-*][ \t]+)?\**\[?([A-Ca-c])[\]\).:]\**[ \t]*")
            .expect("choice marker regex is valid")
    })
}

/// Split a model response into narrative and up to three choices.
///
/// The narrative is everything before the first choice marker. Returns
/// `None` when no narrative text remains. A response with no recognizable
/// choices gets the generic three.
pub fn parse_response(text: &str) -> Option<Scene> {
    let markers: Vec<_> = marker().captures_iter(text).collect();
    let narrative_end = markers
        .first()
        .and_then(|c| c.get(0))
        .map_or(text.len(), |m| m.start());
    let narrative = text[..narrative_end].trim().to_string();
    if narrative.is_empty() {
        return None;
    }

    let mut choices = Vec::new();
    for (i, caps) in markers.iter().enumerate() {
        let (Some(whole), Some(label)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = markers
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map_or(text.len(), |m| m.start());
        let body = text[whole.end()..end]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let body = body.trim_matches('*').trim().to_string();
        if body.is_empty() {
            continue;
        }
        choices.push(Choice {
            label: label.as_str().to_ascii_uppercase(),
            text: body,
        });
        if choices.len() == 3 {
            break;
        }
    }

    if choices.is_empty() {
        choices = generic_choices();
    }
    Some(Scene {
        narrative,
        choices,
        is_epilogue: false,
    })
}
