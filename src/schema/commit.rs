use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Maximum length of a commit subject, in characters.
pub const SUBJECT_MAX_CHARS: usize = 120;

#[derive(Debug, Error)]
pub enum CommitParseError {
    #[error("commit {sha} has an unparseable timestamp '{date}': {source}")]
    Timestamp {
        sha: String,
        date: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("commit record is missing a sha")]
    MissingSha,
}

/// Who wrote a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Author {
    /// Display handle: the login when known, otherwise the commit name.
    pub fn handle(&self) -> &str {
        self.login.as_deref().unwrap_or(&self.name)
    }
}

/// One version-control commit, as consumed by the game.
///
/// Records are immutable once parsed and are embedded verbatim in save data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    pub short_sha: String,
    pub message: String,
    pub subject: String,
    pub body: String,
    pub author: Author,
    /// RFC 3339 commit timestamp.
    pub date: String,
    /// Hour of day, 0-23 (UTC).
    pub hour: u8,
    /// Day of week, 0 = Sunday.
    pub day_of_week: u8,
}

impl CommitRecord {
    /// Build a record from its parts, deriving subject, body and time fields.
    pub fn new(
        sha: &str,
        message: &str,
        author: Author,
        date: &str,
    ) -> Result<CommitRecord, CommitParseError> {
        if sha.is_empty() {
            return Err(CommitParseError::MissingSha);
        }
        let timestamp =
            OffsetDateTime::parse(date, &Rfc3339).map_err(|source| CommitParseError::Timestamp {
                sha: sha.to_string(),
                date: date.to_string(),
                source,
            })?;
        let timestamp = timestamp.to_offset(time::UtcOffset::UTC);

        let (first_line, rest) = match message.split_once('\n') {
            Some((first, rest)) => (first, rest),
            None => (message, ""),
        };

        Ok(CommitRecord {
            sha: sha.to_string(),
            short_sha: sha.chars().take(7).collect(),
            message: message.to_string(),
            subject: first_line.trim_end().chars().take(SUBJECT_MAX_CHARS).collect(),
            body: rest.trim().to_string(),
            author,
            date: date.to_string(),
            hour: timestamp.hour(),
            day_of_week: timestamp.weekday().number_days_from_sunday(),
        })
    }

    /// Map a raw data-source record into a `CommitRecord`.
    pub fn from_raw(raw: &RawCommit) -> Result<CommitRecord, CommitParseError> {
        let author = Author {
            name: raw.commit.author.name.clone(),
            login: raw.author.as_ref().map(|a| a.login.clone()),
            avatar: raw.author.as_ref().and_then(|a| a.avatar_url.clone()),
        };
        Self::new(&raw.sha, &raw.commit.message, author, &raw.commit.author.date)
    }
}

/// Raw commit record as returned by the repository data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    pub commit: RawCommitDetail,
    #[serde(default)]
    pub author: Option<RawAccount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommitDetail {
    pub message: String,
    pub author: RawSignature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSignature {
    pub name: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawAccount {
    pub login: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
