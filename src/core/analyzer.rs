/// Commit analysis — statistics and music parameters from commit metadata.
use rustc_hash::FxHashSet;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::core::classify::{classifier, CommitCategory};
use crate::schema::analysis::{CommitAnalysis, Mode, MusicProfile};
use crate::schema::commit::CommitRecord;

/// Number of leading commits folded into the hash seed.
const SEED_COMMITS: usize = 5;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Summarize a commit sequence.
///
/// Returns `None` for an empty sequence; callers treat that as "repository
/// has no commits" and refuse to start a game.
pub fn analyze(commits: &[CommitRecord]) -> Option<CommitAnalysis> {
    if commits.is_empty() {
        return None;
    }
    let total = commits.len();
    let classifier = classifier();

    let mut author_set = FxHashSet::default();
    let mut hour_histogram = [0u32; 24];
    let mut subject_chars = 0usize;
    let (mut fix_count, mut feat_count, mut refactor_count) = (0usize, 0usize, 0usize);
    let mut earliest: Option<i64> = None;
    let mut latest: Option<i64> = None;

    for commit in commits {
        author_set.insert(commit.author.handle().to_string());
        hour_histogram[usize::from(commit.hour.min(23))] += 1;
        subject_chars += commit.subject.chars().count();

        if classifier.matches(CommitCategory::Fix, &commit.subject) {
            fix_count += 1;
        }
        if classifier.matches(CommitCategory::Feat, &commit.subject) {
            feat_count += 1;
        }
        if classifier.matches(CommitCategory::Refactor, &commit.subject) {
            refactor_count += 1;
        }

        if let Ok(ts) = OffsetDateTime::parse(&commit.date, &Rfc3339) {
            let secs = ts.unix_timestamp();
            earliest = Some(earliest.map_or(secs, |e| e.min(secs)));
            latest = Some(latest.map_or(secs, |l| l.max(secs)));
        }
    }

    let mut authors: Vec<String> = author_set.into_iter().collect();
    authors.sort();
    let author_count = authors.len();

    let peak_hour = peak_hour(&hour_histogram);

    let span_secs = match (earliest, latest) {
        (Some(e), Some(l)) => (l - e) as f64,
        _ => 0.0,
    };
    let day_span = (span_secs / SECONDS_PER_DAY).max(1.0);
    let commits_per_day = total as f64 / day_span;
    let totalf = total as f64;

    let music = MusicProfile {
        bpm: (60.0 + (commits_per_day * 8.0).min(80.0)).round() as u32,
        voices: author_count.clamp(1, 4) as u8,
        mode: if (6..=18).contains(&peak_hour) {
            Mode::Major
        } else {
            Mode::Minor
        },
        complexity: ((fix_count + refactor_count) as f64 / totalf * 3.0).clamp(0.0, 1.0),
        energy: (commits_per_day / 10.0).clamp(0.0, 1.0),
    };

    Some(CommitAnalysis {
        total_commits: total,
        authors,
        author_count,
        hour_histogram,
        peak_hour,
        avg_subject_length: subject_chars as f64 / totalf,
        fix_count,
        feat_count,
        refactor_count,
        fix_ratio: fix_count as f64 / totalf,
        feat_ratio: feat_count as f64 / totalf,
        refactor_ratio: refactor_count as f64 / totalf,
        day_span,
        commits_per_day,
        hash_seed: hash_seed(commits),
        music,
    })
}

/// First maximum of the histogram, so ties go to the earliest hour.
fn peak_hour(histogram: &[u32; 24]) -> u8 {
    let mut peak = 0usize;
    for (hour, count) in histogram.iter().enumerate() {
        if *count > histogram[peak] {
            peak = hour;
        }
    }
    peak as u8
}

/// XOR-fold of the first 8 hex digits of the first five SHAs.
pub fn hash_seed(commits: &[CommitRecord]) -> u32 {
    commits
        .iter()
        .take(SEED_COMMITS)
        .fold(0u32, |acc, c| acc ^ sha_prefix_value(&c.sha))
}

/// Value of the leading hex digits within the first 8 characters; a SHA
/// with no leading hex digit contributes zero.
fn sha_prefix_value(sha: &str) -> u32 {
    let digits: String = sha
        .chars()
        .take(8)
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    u32::from_str_radix(&digits, 16).unwrap_or(0)
}
