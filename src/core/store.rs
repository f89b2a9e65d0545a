/// Key-value persistence for settings, save slots and the response cache.

use rustc_hash::FxHashMap;
use thiserror::Error;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    RonWrite(#[from] ron::Error),
    #[error("timestamp formatting error: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("entry '{key}' is unreadable: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid key '{0}'")]
    InvalidKey(String),
}

/// Minimal get/set/delete/list store with optional per-entry expiry.
pub trait KvStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError>;
    /// Returns whether a live entry was removed.
    fn delete(&mut self, key: &str) -> Result<bool, StoreError>;
    /// Live entries whose key starts with `prefix`, sorted by key.
    fn list(&mut self, prefix: &str) -> Result<Vec<(String, String)>, StoreError>;
}

fn expiry(ttl: Option<Duration>) -> Option<OffsetDateTime> {
    ttl.map(|ttl| OffsetDateTime::now_utc() + ttl)
}

fn is_expired(expires_at: Option<OffsetDateTime>) -> bool {
    expires_at.is_some_and(|at| OffsetDateTime::now_utc() >= at)
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<OffsetDateTime>,
    last_used: u64,
}

/// In-process store. With a capacity, the least recently used entry is
/// evicted to make room.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: FxHashMap<String, MemoryEntry>,
    capacity: Option<usize>,
    tick: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn prune_expired(&mut self) {
        self.entries.retain(|_, e| !is_expired(e.expires_at));
    }
}

impl KvStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let tick = self.touch();
        let expired = match self.entries.get(key) {
            Some(entry) => is_expired(entry.expires_at),
            None => return Ok(None),
        };
        if expired {
            self.entries.remove(key);
            return Ok(None);
        }
        Ok(self.entries.get_mut(key).map(|entry| {
            entry.last_used = tick;
            entry.value.clone()
        }))
    }

    fn set(&mut self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
        let tick = self.touch();
        if let Some(capacity) = self.capacity {
            if !self.entries.contains_key(key) && self.entries.len() >= capacity {
                self.prune_expired();
            }
            while !self.entries.contains_key(key) && self.entries.len() >= capacity {
                let oldest = self
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_used)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        self.entries.remove(&k);
                    }
                    None => break,
                }
            }
        }
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: expiry(ttl),
                last_used: tick,
            },
        );
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|e| !is_expired(e.expires_at)))
    }

    fn list(&mut self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
        self.prune_expired();
        let mut out: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect();
        out.sort();
        Ok(out)
    }
}

#[cfg(feature = "fs")]
pub use dir::DirStore;

#[cfg(feature = "fs")]
mod dir {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use serde::{Deserialize, Serialize};
    use time::format_description::well_known::Rfc3339;
    use time::{Duration, OffsetDateTime};
    use tracing::warn;

    use super::{expiry, is_expired, KvStore, StoreError};

    /// Readable part of a file name; the digest suffix keeps names unique.
    const READABLE_CHARS: usize = 40;

    /// On-disk record for one key.
    #[derive(Debug, Serialize, Deserialize)]
    #[serde(rename = "Entry")]
    struct DirEntry {
        key: String,
        value: String,
        #[serde(default)]
        expires_at: Option<String>,
    }

    impl DirEntry {
        fn expires(&self) -> Option<OffsetDateTime> {
            self.expires_at
                .as_deref()
                .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
        }
    }

    /// Directory-backed store: one RON file per key.
    ///
    /// Files are named `<readable>-<blake3 of key>.ron`, so distinct keys
    /// never share a file whatever characters they contain.
    #[derive(Debug, Clone)]
    pub struct DirStore {
        dir: PathBuf,
    }

    impl DirStore {
        /// Open (and create if needed) a store rooted at `dir`.
        pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
            let dir = dir.into();
            std::fs::create_dir_all(&dir)?;
            Ok(Self { dir })
        }

        pub fn dir(&self) -> &Path {
            &self.dir
        }

        pub(crate) fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
            if key.is_empty() {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
            let readable: String = key
                .chars()
                .take(READABLE_CHARS)
                .map(|c| match c {
                    'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
                    _ => '_',
                })
                .collect();
            let digest = blake3::hash(key.as_bytes()).to_hex();
            Ok(self.dir.join(format!("{readable}-{digest}.ron")))
        }

        fn read_entry(path: &Path) -> Result<DirEntry, StoreError> {
            let contents = std::fs::read_to_string(path)?;
            Ok(ron::from_str(&contents)?)
        }

        /// Entry stored for `key`, if its file exists and belongs to it.
        fn entry_for(&self, key: &str, path: &Path) -> Result<Option<DirEntry>, StoreError> {
            if !path.exists() {
                return Ok(None);
            }
            match Self::read_entry(path) {
                Ok(entry) if entry.key == key => Ok(Some(entry)),
                Ok(_) => Ok(None),
                Err(StoreError::Ron(source)) => Err(StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
                Err(e) => Err(e),
            }
        }

        /// Write through a temp file in the same directory, then rename.
        fn write_atomic(&self, path: &Path, text: &str) -> Result<(), StoreError> {
            let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
            tmp.write_all(text.as_bytes())?;
            tmp.flush()?;
            tmp.persist(path).map_err(|e| e.error)?;
            Ok(())
        }
    }

    impl KvStore for DirStore {
        fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
            let path = self.path_for(key)?;
            let Some(entry) = self.entry_for(key, &path)? else {
                return Ok(None);
            };
            if is_expired(entry.expires()) {
                std::fs::remove_file(&path)?;
                return Ok(None);
            }
            Ok(Some(entry.value))
        }

        fn set(&mut self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), StoreError> {
            let path = self.path_for(key)?;
            let expires_at = match expiry(ttl) {
                Some(at) => Some(at.format(&Rfc3339)?),
                None => None,
            };
            let entry = DirEntry {
                key: key.to_string(),
                value,
                expires_at,
            };
            let text = ron::ser::to_string_pretty(&entry, ron::ser::PrettyConfig::default())?;
            self.write_atomic(&path, &text)
        }

        fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
            let path = self.path_for(key)?;
            let live = match self.entry_for(key, &path) {
                Ok(Some(entry)) => !is_expired(entry.expires()),
                Ok(None) => return Ok(false),
                Err(StoreError::Corrupt { .. }) => {
                    warn!(key = %key, "removing unreadable store entry");
                    true
                }
                Err(e) => return Err(e),
            };
            std::fs::remove_file(path)?;
            Ok(live)
        }

        fn list(&mut self, prefix: &str) -> Result<Vec<(String, String)>, StoreError> {
            let mut out = Vec::new();
            for dir_entry in std::fs::read_dir(&self.dir)? {
                let path = dir_entry?.path();
                if path.extension().and_then(|s| s.to_str()) != Some("ron") {
                    continue;
                }
                let entry = match Self::read_entry(&path) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable store entry");
                        continue;
                    }
                };
                if entry.key.starts_with(prefix) && !is_expired(entry.expires()) {
                    out.push((entry.key, entry.value));
                }
            }
            out.sort();
            Ok(out)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn persists_across_handles() {
            let dir = tempfile::tempdir().unwrap();
            let mut store = DirStore::open(dir.path()).unwrap();
            store.set("save:auto", "state".to_string(), None).unwrap();

            let mut reopened = DirStore::open(dir.path()).unwrap();
            assert_eq!(reopened.get("save:auto").unwrap().as_deref(), Some("state"));
            assert_eq!(reopened.list("save:").unwrap().len(), 1);
            assert!(reopened.delete("save:auto").unwrap());
            assert_eq!(reopened.get("save:auto").unwrap(), None);
        }

        #[test]
        fn keys_with_the_same_readable_name_stay_apart() {
            let dir = tempfile::tempdir().unwrap();
            let mut store = DirStore::open(dir.path()).unwrap();
            store.set("save:my run", "first".to_string(), None).unwrap();
            store.set("save:my/run", "second".to_string(), None).unwrap();

            assert_eq!(store.get("save:my run").unwrap().as_deref(), Some("first"));
            assert_eq!(store.get("save:my/run").unwrap().as_deref(), Some("second"));
            assert_eq!(store.list("save:").unwrap().len(), 2);

            assert!(!store.delete("save:my?run").unwrap());
            assert!(store.delete("save:my run").unwrap());
            assert_eq!(store.get("save:my run").unwrap(), None);
            assert_eq!(store.get("save:my/run").unwrap().as_deref(), Some("second"));
            assert!(store.delete("save:my/run").unwrap());
            assert!(store.list("save:").unwrap().is_empty());
        }

        #[test]
        fn overwrite_leaves_no_temp_files() {
            let dir = tempfile::tempdir().unwrap();
            let mut store = DirStore::open(dir.path()).unwrap();
            for turn in 0..5 {
                store.set("save:auto", format!("turn {turn}"), None).unwrap();
            }
            let files: Vec<PathBuf> = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().path())
                .collect();
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].extension().and_then(|s| s.to_str()), Some("ron"));
            assert_eq!(store.get("save:auto").unwrap().as_deref(), Some("turn 4"));
        }

        #[test]
        fn corrupt_entry_is_reported_and_deletable() {
            let dir = tempfile::tempdir().unwrap();
            let mut store = DirStore::open(dir.path()).unwrap();
            store.set("save:one", "1".to_string(), None).unwrap();
            let path = store.path_for("save:one").unwrap();
            std::fs::write(&path, "Entry(key: \"save:one\", value: ").unwrap();

            assert!(matches!(
                store.get("save:one"),
                Err(StoreError::Corrupt { ref key, .. }) if key == "save:one"
            ));
            assert!(store.list("save:").unwrap().is_empty());
            assert!(store.delete("save:one").unwrap());
            assert!(!path.exists());
        }

        #[test]
        fn skips_unreadable_files() {
            let dir = tempfile::tempdir().unwrap();
            let mut store = DirStore::open(dir.path()).unwrap();
            store.set("save:one", "1".to_string(), None).unwrap();
            std::fs::write(dir.path().join("garbage.ron"), "not ron at all (").unwrap();
            let entries = store.list("save:").unwrap();
            assert_eq!(entries, vec![("save:one".to_string(), "1".to_string())]);
        }

        #[test]
        fn rejects_empty_key() {
            let dir = tempfile::tempdir().unwrap();
            let mut store = DirStore::open(dir.path()).unwrap();
            assert!(matches!(store.get(""), Err(StoreError::InvalidKey(_))));
        }
    }
}
