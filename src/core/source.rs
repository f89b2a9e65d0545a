/// Repository data source — where commit records come from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::schema::commit::{CommitParseError, CommitRecord, RawCommit};

/// Largest page the hosting API serves.
pub const PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_COMMITS: usize = 100;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("'{0}' is not a repository identifier (expected owner/name or a GitHub URL)")]
    MalformedRepo(String),
    #[error("repository {0} not found")]
    NotFound(String),
    #[error("API rate limit reached; supply a token or wait before retrying")]
    RateLimited,
    #[error("data source returned HTTP {0}")]
    Status(u16),
    #[error("data source request failed: {0}")]
    Transport(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Commit(#[from] CommitParseError),
}

/// An `owner/name` repository reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

fn valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl RepoRef {
    /// Accepts `owner/name`, `github.com/owner/name` and
    /// `https://github.com/owner/name[.git][/...]`.
    pub fn parse(input: &str) -> Result<RepoRef, SourceError> {
        let malformed = || SourceError::MalformedRepo(input.to_string());
        let trimmed = input.trim();
        let path = ["https://github.com/", "http://github.com/", "github.com/"]
            .iter()
            .find_map(|prefix| trimmed.strip_prefix(prefix));
        let is_url = path.is_some();
        let path = path.unwrap_or(trimmed).trim_end_matches('/');

        let mut parts = path.split('/');
        let owner = parts.next().ok_or_else(malformed)?;
        let name = parts.next().ok_or_else(malformed)?;
        if !is_url && parts.next().is_some() {
            return Err(malformed());
        }
        let name = name.strip_suffix(".git").unwrap_or(name);
        if !valid_segment(owner) || !valid_segment(name) {
            return Err(malformed());
        }
        Ok(RepoRef {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoRef {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RepoRef::parse(s)
    }
}

/// Repository summary shown before a game starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "stargazers_count")]
    pub stars: u64,
    #[serde(default)]
    pub default_branch: String,
}

/// A provider of repository metadata and commit history.
pub trait CommitSource {
    fn fetch_repo_metadata(&self, repo: &RepoRef) -> Result<RepoMetadata, SourceError>;
    /// Up to `max` commits, newest first. An empty repository yields an
    /// empty list.
    fn fetch_commits(&self, repo: &RepoRef, max: usize) -> Result<Vec<CommitRecord>, SourceError>;
}

/// Map raw records, skipping any that cannot be parsed.
pub fn convert_raw(raw: &[RawCommit]) -> Vec<CommitRecord> {
    raw.iter()
        .filter_map(|r| match CommitRecord::from_raw(r) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "skipping unparseable commit record");
                None
            }
        })
        .collect()
}

/// Parse a recorded API response: a JSON array of raw commit records.
pub fn parse_commits_json(json: &str) -> Result<Vec<CommitRecord>, SourceError> {
    let raw: Vec<RawCommit> = serde_json::from_str(json)?;
    Ok(convert_raw(&raw))
}

/// Load a recorded API response from disk.
pub fn load_commits_json(path: &Path) -> Result<Vec<CommitRecord>, SourceError> {
    let contents = std::fs::read_to_string(path)?;
    parse_commits_json(&contents)
}

#[cfg(feature = "http")]
pub use github::GithubSource;

#[cfg(feature = "http")]
mod github {
    use std::time::Duration;
    use tracing::debug;

    use super::{convert_raw, CommitSource, RepoMetadata, RepoRef, SourceError, PAGE_SIZE};
    use crate::schema::commit::{CommitRecord, RawCommit};

    const API_ROOT: &str = "https://api.github.com";
    const TIMEOUT: Duration = Duration::from_secs(15);
    const USER_AGENT: &str = concat!("commit-quest/", env!("CARGO_PKG_VERSION"));

    /// GitHub REST API client.
    pub struct GithubSource {
        agent: ureq::Agent,
        api_root: String,
        token: Option<String>,
    }

    impl GithubSource {
        pub fn new(token: Option<String>) -> Self {
            let agent = ureq::Agent::config_builder()
                .timeout_global(Some(TIMEOUT))
                .build()
                .new_agent();
            Self {
                agent,
                api_root: API_ROOT.to_string(),
                token,
            }
        }

        /// Point at a different API root (GitHub Enterprise, test servers).
        pub fn with_api_root(mut self, root: &str) -> Self {
            self.api_root = root.trim_end_matches('/').to_string();
            self
        }

        fn get(&self, url: &str, query: &[(&str, String)], repo: &RepoRef) -> Result<String, SourceError> {
            let mut request = self
                .agent
                .get(url)
                .header("Accept", "application/vnd.github+json")
                .header("User-Agent", USER_AGENT);
            for (key, value) in query {
                request = request.query(*key, value.as_str());
            }
            if let Some(token) = &self.token {
                request = request.header("Authorization", &format!("Bearer {token}"));
            }
            let mut response = request.call().map_err(|e| match e {
                ureq::Error::StatusCode(404) => SourceError::NotFound(repo.to_string()),
                ureq::Error::StatusCode(403 | 429) => SourceError::RateLimited,
                ureq::Error::StatusCode(code) => SourceError::Status(code),
                other => SourceError::Transport(other.to_string()),
            })?;
            response
                .body_mut()
                .read_to_string()
                .map_err(|e| SourceError::Transport(e.to_string()))
        }
    }

    impl CommitSource for GithubSource {
        fn fetch_repo_metadata(&self, repo: &RepoRef) -> Result<RepoMetadata, SourceError> {
            let url = format!("{}/repos/{}/{}", self.api_root, repo.owner, repo.name);
            let body = self.get(&url, &[], repo)?;
            Ok(serde_json::from_str(&body)?)
        }

        fn fetch_commits(&self, repo: &RepoRef, max: usize) -> Result<Vec<CommitRecord>, SourceError> {
            let url = format!("{}/repos/{}/{}/commits", self.api_root, repo.owner, repo.name);
            let per_page = max.clamp(1, PAGE_SIZE);
            let mut commits = Vec::new();
            let mut page = 1usize;

            while commits.len() < max {
                let query = [("per_page", per_page.to_string()), ("page", page.to_string())];
                let body = match self.get(&url, &query, repo) {
                    Ok(body) => body,
                    // 409 Conflict: the repository exists but has no commits.
                    Err(SourceError::Status(409)) => break,
                    Err(e) => return Err(e),
                };
                let raw: Vec<RawCommit> = serde_json::from_str(&body)?;
                let fetched = raw.len();
                debug!(repo = %repo, page, fetched, "commit page fetched");
                commits.extend(convert_raw(&raw));
                if fetched < per_page {
                    break;
                }
                page += 1;
            }

            commits.truncate(max);
            Ok(commits)
        }
    }

}
