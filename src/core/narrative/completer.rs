/// Language-generation capability: prompt pair in, free text out.

use thiserror::Error;
use time::Duration;
use tracing::debug;

use crate::core::store::{KvStore, MemoryStore, StoreError};

pub const DEFAULT_CACHE_CAPACITY: usize = 10;
pub const DEFAULT_CACHE_TTL: Duration = Duration::hours(1);
const CACHE_PREFIX: &str = "completion:";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("language model unavailable: {0}")]
    Unavailable(String),
    #[error("language model request failed: {0}")]
    Transport(String),
    #[error("language model returned HTTP {0}")]
    Status(u16),
    #[error("malformed language model response: {0}")]
    Malformed(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response cache error: {0}")]
    Cache(#[from] StoreError),
}

/// Anything that can turn a system instruction plus a user prompt into text.
pub trait TextCompleter {
    fn complete(&mut self, system: &str, user: &str) -> Result<String, CompletionError>;
}

impl<T: TextCompleter + ?Sized> TextCompleter for Box<T> {
    fn complete(&mut self, system: &str, user: &str) -> Result<String, CompletionError> {
        (**self).complete(system, user)
    }
}

/// Memoizes another completer in a small LRU store with expiry.
pub struct CachedCompleter<C, S = MemoryStore> {
    inner: C,
    store: S,
    ttl: Duration,
}

impl<C: TextCompleter> CachedCompleter<C> {
    pub fn new(inner: C) -> Self {
        Self::with_store(
            inner,
            MemoryStore::with_capacity(DEFAULT_CACHE_CAPACITY),
            DEFAULT_CACHE_TTL,
        )
    }
}

impl<C: TextCompleter, S: KvStore> CachedCompleter<C, S> {
    pub fn with_store(inner: C, store: S, ttl: Duration) -> Self {
        Self { inner, store, ttl }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

/// Cache key for a prompt pair.
pub fn cache_key(system: &str, user: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(system.as_bytes());
    hasher.update(&[0]);
    hasher.update(user.as_bytes());
    format!("{CACHE_PREFIX}{}", hasher.finalize().to_hex())
}

impl<C: TextCompleter, S: KvStore> TextCompleter for CachedCompleter<C, S> {
    fn complete(&mut self, system: &str, user: &str) -> Result<String, CompletionError> {
        let key = cache_key(system, user);
        if let Some(hit) = self.store.get(&key)? {
            debug!(key = %key, "completion cache hit");
            return Ok(hit);
        }
        let text = self.inner.complete(system, user)?;
        self.store.set(&key, text.clone(), Some(self.ttl))?;
        Ok(text)
    }
}

#[cfg(feature = "http")]
pub use http::HttpCompleter;

#[cfg(feature = "http")]
mod http {
    use serde::Deserialize;
    use std::time::Duration;

    use super::{CompletionError, TextCompleter};

    const TEMPERATURE: f64 = 0.9;
    const MAX_TOKENS: u32 = 700;

    /// Chat-completions client for OpenAI-compatible endpoints.
    pub struct HttpCompleter {
        agent: ureq::Agent,
        endpoint: String,
        model: String,
        api_key: Option<String>,
    }

    #[derive(Deserialize)]
    struct ChatResponse {
        choices: Vec<ChatChoice>,
    }

    #[derive(Deserialize)]
    struct ChatChoice {
        message: ChatMessage,
    }

    #[derive(Deserialize)]
    struct ChatMessage {
        #[serde(default)]
        content: Option<String>,
    }

    impl HttpCompleter {
        pub fn new(endpoint: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Self {
            let agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .new_agent();
            Self {
                agent,
                endpoint: endpoint.to_string(),
                model: model.to_string(),
                api_key,
            }
        }

        pub fn request_body(&self, system: &str, user: &str) -> serde_json::Value {
            serde_json::json!({
                "model": self.model,
                "temperature": TEMPERATURE,
                "max_tokens": MAX_TOKENS,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user },
                ],
            })
        }
    }

    /// Pull the first message text out of a chat-completions response.
    pub(super) fn extract_content(body: &str) -> Result<String, CompletionError> {
        let parsed: ChatResponse = serde_json::from_str(body)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| CompletionError::Malformed("no message content".to_string()))
    }

    impl TextCompleter for HttpCompleter {
        fn complete(&mut self, system: &str, user: &str) -> Result<String, CompletionError> {
            let body = self.request_body(system, user);
            let mut request = self
                .agent
                .post(&self.endpoint)
                .header("Content-Type", "application/json");
            if let Some(key) = &self.api_key {
                request = request.header("Authorization", &format!("Bearer {key}"));
            }
            let mut response = request.send(body.to_string()).map_err(|e| match e {
                ureq::Error::StatusCode(code) => CompletionError::Status(code),
                other => CompletionError::Transport(other.to_string()),
            })?;
            let text = response
                .body_mut()
                .read_to_string()
                .map_err(|e| CompletionError::Transport(e.to_string()))?;
            extract_content(&text)
        }
    }
}
