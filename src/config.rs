/// Game configuration, loaded from RON.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::composer::DEFAULT_VOLUME;
use crate::core::narrative::completer::DEFAULT_CACHE_CAPACITY;
use crate::core::source::DEFAULT_MAX_COMMITS;
use crate::schema::style::Style;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Language-model endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat-completions URL.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 20,
        }
    }
}

impl LlmConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub style: Style,
    /// Master volume, 0.0..=1.0.
    pub volume: f64,
    pub max_commits: usize,
    pub save_dir: PathBuf,
    /// Directory of `.ron` style overrides.
    pub styles_dir: Option<PathBuf>,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    /// Without this section narration comes from templates only.
    pub llm: Option<LlmConfig>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            style: Style::default(),
            volume: DEFAULT_VOLUME,
            max_commits: DEFAULT_MAX_COMMITS,
            save_dir: PathBuf::from("saves"),
            styles_dir: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            cache_ttl_secs: 3600,
            llm: None,
        }
    }
}

impl GameConfig {
    pub fn load_from_ron(path: &Path) -> Result<GameConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<GameConfig, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    pub fn cache_ttl(&self) -> time::Duration {
        time::Duration::seconds(i64::try_from(self.cache_ttl_secs).unwrap_or(i64::MAX))
    }

    /// Cached HTTP completer for the configured endpoint, if any.
    #[cfg(feature = "http")]
    pub fn completer(
        &self,
    ) -> Option<crate::core::narrative::CachedCompleter<crate::core::narrative::completer::HttpCompleter>>
    {
        use crate::core::narrative::completer::HttpCompleter;
        use crate::core::narrative::CachedCompleter;
        use crate::core::store::MemoryStore;

        let llm = self.llm.as_ref()?;
        let http = HttpCompleter::new(
            &llm.endpoint,
            &llm.model,
            llm.api_key(),
            std::time::Duration::from_secs(llm.timeout_secs),
        );
        Some(CachedCompleter::with_store(
            http,
            MemoryStore::with_capacity(self.cache_capacity),
            self.cache_ttl(),
        ))
    }
}
