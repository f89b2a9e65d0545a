use serde::{Deserialize, Serialize};

/// Tonal mode derived from when a repository's commits usually land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

/// Music parameters derived from commit statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicProfile {
    pub bpm: u32,
    /// Number of concurrent voices, 1..=4.
    pub voices: u8,
    pub mode: Mode,
    /// 0.0..=1.0, share of fix and refactor work scaled up.
    pub complexity: f64,
    /// 0.0..=1.0, commit rate scaled down.
    pub energy: f64,
}

/// Statistical summary of a commit sequence.
///
/// A pure function of its input: identical commit lists always produce
/// identical summaries, which is what lets a saved game rebuild the same
/// music on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitAnalysis {
    pub total_commits: usize,
    /// Distinct author handles, sorted.
    pub authors: Vec<String>,
    pub author_count: usize,
    pub hour_histogram: [u32; 24],
    pub peak_hour: u8,
    pub avg_subject_length: f64,
    pub fix_count: usize,
    pub feat_count: usize,
    pub refactor_count: usize,
    pub fix_ratio: f64,
    pub feat_ratio: f64,
    pub refactor_ratio: f64,
    /// Observed time span in days, never below 1.
    pub day_span: f64,
    pub commits_per_day: f64,
    pub hash_seed: u32,
    pub music: MusicProfile,
}
