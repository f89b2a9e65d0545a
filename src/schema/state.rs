use serde::{Deserialize, Serialize};

use super::analysis::CommitAnalysis;
use super::commit::CommitRecord;
use super::scene::Scene;
use super::style::Style;

/// Maximum number of items a player can carry.
pub const INVENTORY_CAPACITY: usize = 8;
/// Maximum number of quest log entries kept.
pub const QUEST_LOG_CAPACITY: usize = 10;
pub const MAX_LEVEL: u32 = 10;
pub const STARTING_HP: i32 = 100;

/// Player statistics, as broadcast to observers after each turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub hp: i32,
    pub max_hp: i32,
    pub xp: u32,
    pub level: u32,
    /// Ordered, duplicate-free, at most `INVENTORY_CAPACITY` entries.
    pub inventory: Vec<String>,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            hp: STARTING_HP,
            max_hp: STARTING_HP,
            xp: 0,
            level: 1,
            inventory: Vec::new(),
        }
    }
}

/// One resolved turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub narrative: String,
    pub choice_text: String,
    pub commit_sha: String,
}

/// The whole mutable session, and the unit of persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Repository identifier, `owner/name`.
    pub repo: String,
    pub style: Style,
    pub commits: Vec<CommitRecord>,
    pub analysis: CommitAnalysis,
    pub commit_index: usize,
    pub chapter: usize,
    pub stats: PlayerStats,
    /// Most recent first, at most `QUEST_LOG_CAPACITY` entries.
    pub quest_log: Vec<String>,
    pub history: Vec<HistoryEntry>,
    pub current_scene: Option<Scene>,
    pub started_at: String,
    #[serde(default)]
    pub saved_at: Option<String>,
}

impl GameState {
    /// The commit under the cursor.
    pub fn current_commit(&self) -> Option<&CommitRecord> {
        self.commits.get(self.commit_index)
    }

    pub fn last_index(&self) -> usize {
        self.commits.len().saturating_sub(1)
    }

    /// Fraction of the history walked so far, 0.0..=1.0.
    pub fn progress(&self) -> f64 {
        progress_fraction(self.commit_index, self.commits.len())
    }

    /// Push a quest entry at the front, dropping the oldest past capacity.
    pub fn log_quest(&mut self, entry: impl Into<String>) {
        self.quest_log.insert(0, entry.into());
        self.quest_log.truncate(QUEST_LOG_CAPACITY);
    }
}

/// `index / (total - 1)`; a single-commit history counts as complete.
pub fn progress_fraction(index: usize, total: usize) -> f64 {
    if total <= 1 {
        return 1.0;
    }
    (index as f64 / (total - 1) as f64).clamp(0.0, 1.0)
}

/// Chapter number for a cursor position: ten commits per chapter.
pub fn chapter_for(index: usize) -> usize {
    index / 10 + 1
}
