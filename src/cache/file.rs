//! File-backed cache store
//!
//! One pretty-printed JSON file per key, written atomically (temp file then
//! rename) so an interrupted run never leaves a half-written entry behind.

use super::types::{CacheEntry, CacheStore, Clock, SystemClock};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cache that persists entries under a directory
pub struct FileCache {
    /// Directory holding one file per entry
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCache {
    /// Create a cache rooted at `dir` (created lazily on first write)
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    /// Create a cache rooted at `dir` using a custom clock
    pub fn with_clock(dir: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            clock,
        }
    }

    /// Directory the entries live in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File an entry for `key` is stored in
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::cache(format!(
                    "Failed to read cache file {}: {e}",
                    path.display()
                )))
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&contents) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %path.display(), "Ignoring unreadable cache entry: {e}");
                return Ok(None);
            }
        };

        if entry.key != key {
            return Ok(None);
        }

        if entry.is_expired_at(self.clock.now()) {
            debug!(path = %path.display(), "Cache entry expired");
            if let Err(e) = tokio::fs::remove_file(&path).await {
                debug!(path = %path.display(), "Failed to remove expired cache entry: {e}");
            }
            return Ok(None);
        }

        Ok(Some(entry))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(key, value, self.clock.now(), ttl);
        let contents = serde_json::to_string_pretty(&entry).map_err(|e| Error::Cache {
            message: format!("Failed to serialize cache entry: {e}"),
        })?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Cache {
                message: format!("Failed to create cache dir {}: {e}", self.dir.display()),
            })?;

        // Write to temp file first, then rename for atomicity
        let path = self.entry_path(key);
        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &contents)
            .await
            .map_err(|e| Error::Cache {
                message: format!("Failed to write cache file: {e}"),
            })?;

        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Error::Cache {
                message: format!("Failed to rename cache file: {e}"),
            })?;

        Ok(())
    }
}
