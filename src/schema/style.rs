use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The presentation variant a playthrough is skinned with.
///
/// Style drives both the narrative vocabulary and the music profile.
/// `Horror` is the "dread" variant: darker chord degrees, sparser
/// percussion, and an always-on atmosphere pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Fantasy,
    Scifi,
    Horror,
}

impl Style {
    pub const ALL: [Style; 3] = [Style::Fantasy, Style::Scifi, Style::Horror];

    /// Returns the tag string for this style (e.g., "fantasy").
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Fantasy => "fantasy",
            Self::Scifi => "scifi",
            Self::Horror => "horror",
        }
    }

    /// True for the dread variant, which changes voice gating and harmony.
    pub fn is_dread(&self) -> bool {
        matches!(self, Self::Horror)
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown style '{0}' (expected fantasy, scifi or horror)")]
pub struct UnknownStyle(pub String);

impl FromStr for Style {
    type Err = UnknownStyle;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fantasy" => Ok(Self::Fantasy),
            "scifi" | "sci-fi" => Ok(Self::Scifi),
            "horror" | "dread" => Ok(Self::Horror),
            other => Err(UnknownStyle(other.to_string())),
        }
    }
}
