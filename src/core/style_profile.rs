/// Style profiles — the narrative vocabulary and music settings of each style.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::audio::{Envelope, Waveform};
use crate::core::template::{Template, TemplateError};
use crate::core::theory::{NoteValue, ScaleKind};
use crate::schema::scene::Choice;
use crate::schema::style::Style;

mod data {
    pub const FANTASY: &str = include_str!("../../style_data/fantasy.ron");
    pub const SCIFI: &str = include_str!("../../style_data/scifi.ron");
    pub const HORROR: &str = include_str!("../../style_data/horror.ron");
}

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("style '{style}' template {index}: {source}")]
    Template {
        style: Style,
        index: usize,
        #[source]
        source: TemplateError,
    },
    #[error("style '{style}' is invalid: {reason}")]
    Invalid { style: Style, reason: String },
}

/// Quest-log flavor lines keyed by commit category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestFlavor {
    pub refactor: String,
    pub release: String,
    pub merge: String,
    /// Prefix for level-up entries; the new level is appended.
    pub level_up: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbSettings {
    pub decay: f64,
    pub wet: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelaySettings {
    pub time: NoteValue,
    pub feedback: f64,
    pub wet: f64,
}

/// Synth voice settings for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthSettings {
    pub waveform: Waveform,
    pub envelope: Envelope,
    pub volume_db: f64,
}

/// Music side of a style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicStyle {
    /// Candidate scales; one is drawn per plan.
    pub scales: Vec<ScaleKind>,
    /// Inclusive octave range for the melody note pool.
    pub melody_octaves: (u8, u8),
    pub bass_octave: u8,
    pub chord_octave: u8,
    pub melody: SynthSettings,
    pub bass: SynthSettings,
    pub pad: SynthSettings,
    pub percussion: SynthSettings,
    pub reverb: ReverbSettings,
    pub delay: DelaySettings,
    pub limiter_db: f64,
}

/// A fully loaded style profile.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleProfile {
    pub style: Style,
    pub title: String,
    /// System instruction for the language model.
    pub system_prompt: String,
    /// Deterministic narrative templates, picked by commit index.
    pub templates: Vec<Template>,
    /// Fixed three-choice set offered with template narratives.
    pub choices: Vec<Choice>,
    pub items: Vec<String>,
    pub quests: QuestFlavor,
    pub epilogue: Template,
    pub music: MusicStyle,
}

// RON shape: templates are plain strings in data files and get parsed on load.

#[derive(Debug, Deserialize)]
#[serde(rename = "Style")]
struct RonStyle {
    style: Style,
    title: String,
    system_prompt: String,
    templates: Vec<String>,
    choices: Vec<Choice>,
    items: Vec<String>,
    quests: QuestFlavor,
    epilogue: String,
    music: MusicStyle,
}

impl StyleProfile {
    /// Load a style profile from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<StyleProfile, StyleError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate a style profile from a RON string.
    pub fn parse_ron(input: &str) -> Result<StyleProfile, StyleError> {
        let raw: RonStyle = ron::from_str(input)?;
        let style = raw.style;

        let templates = raw
            .templates
            .iter()
            .enumerate()
            .map(|(index, text)| {
                Template::parse(text).map_err(|source| StyleError::Template {
                    style,
                    index,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let epilogue = Template::parse(&raw.epilogue).map_err(|source| StyleError::Template {
            style,
            index: templates.len(),
            source,
        })?;

        let invalid = |reason: &str| StyleError::Invalid {
            style,
            reason: reason.to_string(),
        };
        if templates.is_empty() {
            return Err(invalid("at least one narrative template is required"));
        }
        if raw.choices.len() != 3 {
            return Err(invalid("exactly three fallback choices are required"));
        }
        if raw.items.is_empty() {
            return Err(invalid("item list is empty"));
        }
        if raw.music.scales.is_empty() {
            return Err(invalid("music.scales is empty"));
        }
        if raw.music.melody_octaves.0 > raw.music.melody_octaves.1 {
            return Err(invalid("music.melody_octaves is reversed"));
        }

        Ok(StyleProfile {
            style,
            title: raw.title,
            system_prompt: raw.system_prompt,
            templates,
            choices: raw.choices,
            items: raw.items,
            quests: raw.quests,
            epilogue,
            music: raw.music,
        })
    }
}

/// One profile per style. Built-in profiles are always present; loaded
/// files replace them per style.
#[derive(Debug, Clone)]
pub struct StyleLibrary {
    fantasy: StyleProfile,
    scifi: StyleProfile,
    horror: StyleProfile,
}

impl StyleLibrary {
    /// The profiles compiled into the crate.
    pub fn builtin() -> Result<StyleLibrary, StyleError> {
        Ok(StyleLibrary {
            fantasy: StyleProfile::parse_ron(data::FANTASY)?,
            scifi: StyleProfile::parse_ron(data::SCIFI)?,
            horror: StyleProfile::parse_ron(data::HORROR)?,
        })
    }

    pub fn get(&self, style: Style) -> &StyleProfile {
        match style {
            Style::Fantasy => &self.fantasy,
            Style::Scifi => &self.scifi,
            Style::Horror => &self.horror,
        }
    }

    /// Replace the profile for `profile.style`.
    pub fn register(&mut self, profile: StyleProfile) {
        match profile.style {
            Style::Fantasy => self.fantasy = profile,
            Style::Scifi => self.scifi = profile,
            Style::Horror => self.horror = profile,
        }
    }

    /// Load every `.ron` file in a directory as a style override.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, StyleError> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                self.register(StyleProfile::load_from_ron(&path)?);
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}
