//! Two-tier key/value cache.
//!
//! A fast in-process tier backed by a durable on-disk tier. Entries carry an
//! optional expiration; expired entries are treated as absent and removed
//! lazily when next touched.
//!
//! # Durable layout
//! - `<dir>/<sha256(key)>` holds the raw value
//! - `<dir>/<sha256(key)>.meta` optionally holds an RFC 3339 expiration
//!
//! # Failure model
//! Durable-tier I/O never surfaces to callers: a failed write degrades to
//! fast-tier only, a failed read degrades to a miss. Concurrent writers to
//! the same key race with last-writer-wins; values are written through a
//! temp file + rename so a reader never sees a partial file.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tokio::fs;

use crate::storage::paths::AppPaths;

/// Suffix of the expiration sidecar file.
pub const META_SUFFIX: &str = ".meta";

/// One cached value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Entries without an expiration never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Fast + durable cache rooted at one directory.
#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
    memory: Mutex<HashMap<String, CacheEntry>>,
}

impl CacheStore {
    /// Create a cache rooted at `dir`. The directory is created lazily on
    /// first write if it cannot be created now.
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to create cache dir");
        }
        Self {
            dir,
            memory: Mutex::new(HashMap::new()),
        }
    }

    /// Cache in the per-user cache directory.
    #[must_use]
    pub fn open_default() -> Self {
        Self::new(AppPaths::new().cache_entries_dir())
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Filesystem-safe, collision-resistant name for a key.
    #[must_use]
    pub fn file_name_for(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name_for(key))
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}{META_SUFFIX}", Self::file_name_for(key)))
    }

    fn memory(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Store `value` under `key`, optionally expiring after `ttl`.
    ///
    /// The fast tier is always updated; the durable tier is best-effort.
    pub async fn write(&self, key: &str, value: impl Into<String>, ttl: Option<Duration>) {
        let expires_at = ttl.and_then(expiry_from_ttl);
        let entry = CacheEntry {
            key: key.to_string(),
            value: value.into(),
            expires_at,
        };

        self.memory().insert(key.to_string(), entry.clone());

        if let Err(e) = self.write_durable(&entry).await {
            tracing::warn!(key, error = %e, "Failed to write durable cache entry");
        }
    }

    /// Sidecar first, then value. On any failure the durable entry is
    /// dropped so a value never outlives the expiry it was written with.
    async fn write_durable(&self, entry: &CacheEntry) -> std::io::Result<()> {
        let result = self.write_durable_files(entry).await;
        if result.is_err() {
            self.remove_durable(&entry.key).await;
        }
        result
    }

    async fn write_durable_files(&self, entry: &CacheEntry) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let meta_path = self.meta_path(&entry.key);
        match entry.expires_at {
            Some(at) => write_atomic(&meta_path, at.to_rfc3339().as_bytes()).await?,
            None => remove_if_present(&meta_path).await?,
        }
        write_atomic(&self.value_path(&entry.key), entry.value.as_bytes()).await
    }

    /// Serialize `data` as JSON and cache it.
    pub async fn write_json<T: Serialize + Sync>(&self, key: &str, data: &T, ttl: Option<Duration>) {
        match serde_json::to_string(data) {
            Ok(json) => self.write(key, json, ttl).await,
            Err(e) => tracing::warn!(key, error = %e, "Failed to serialize cache entry"),
        }
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Look up `key`, fast tier first. Expired or unreadable entries miss.
    pub async fn read(&self, key: &str) -> Option<String> {
        self.read_entry(key).await.map(|entry| entry.value)
    }

    /// Like [`read`](Self::read) but returns the expiration too.
    pub async fn read_entry(&self, key: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.read_memory(key) {
            return Some(entry);
        }

        let entry = self.read_durable(key).await?;
        tracing::trace!(key, "Promoting durable cache entry");
        self.memory().insert(key.to_string(), entry.clone());
        Some(entry)
    }

    fn read_memory(&self, key: &str) -> Option<CacheEntry> {
        let mut memory = self.memory();
        let entry = memory.get(key)?;
        if entry.is_expired() {
            memory.remove(key);
            return None;
        }
        Some(entry.clone())
    }

    async fn read_durable(&self, key: &str) -> Option<CacheEntry> {
        let expires_at = match fs::read_to_string(self.meta_path(key)).await {
            Ok(text) => parse_expiry(key, &text),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read cache metadata");
                return None;
            }
        };

        if expires_at.is_some_and(|at| Utc::now() > at) {
            tracing::debug!(key, "Durable cache entry expired");
            self.remove_durable(key).await;
            return None;
        }

        match fs::read_to_string(self.value_path(key)).await {
            Ok(value) => Some(CacheEntry {
                key: key.to_string(),
                value,
                expires_at,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read durable cache entry");
                None
            }
        }
    }

    /// Read and deserialize a JSON entry. Corrupt entries miss.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read(key).await?;
        match serde_json::from_str(&raw) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!(key, error = %e, "Cached JSON is corrupt, ignoring");
                None
            }
        }
    }

    /// Whether the durable entry's sidecar says it has expired.
    ///
    /// No sidecar (or an unparsable one) means not expired; an I/O error is
    /// reported as expired.
    pub async fn is_expired(&self, key: &str) -> bool {
        match fs::read_to_string(self.meta_path(key)).await {
            Ok(text) => parse_expiry(key, &text).is_some_and(|at| Utc::now() > at),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to check cache expiration");
                true
            }
        }
    }

    // =========================================================================
    // Remove
    // =========================================================================

    /// Drop `key` from both tiers.
    pub async fn remove(&self, key: &str) {
        self.memory().remove(key);
        self.remove_durable(key).await;
    }

    async fn remove_durable(&self, key: &str) {
        for path in [self.value_path(key), self.meta_path(key)] {
            if let Err(e) = remove_if_present(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove cache file");
            }
        }
    }

    /// Empty the fast tier and delete every durable file.
    ///
    /// Deletion is attempted for every file; individual failures are logged.
    pub async fn clear_all(&self) {
        let cleared = {
            let mut memory = self.memory();
            let n = memory.len();
            memory.clear();
            n
        };

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return,
            Err(e) => {
                tracing::warn!(dir = %self.dir.display(), error = %e, "Failed to list cache dir");
                return;
            }
        };

        let mut deleted = 0usize;
        let mut failed = 0usize;
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if entry.file_type().await.is_ok_and(|t| t.is_dir()) {
                        continue;
                    }
                    match fs::remove_file(&path).await {
                        Ok(()) => deleted += 1,
                        Err(e) => {
                            failed += 1;
                            tracing::warn!(path = %path.display(), error = %e, "Failed to delete cache file");
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to iterate cache dir");
                    break;
                }
            }
        }

        tracing::info!(memory_entries = cleared, deleted, failed, "Cache cleared");
    }
}

fn expiry_from_ttl(ttl: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| Utc::now().checked_add_signed(delta))
}

fn parse_expiry(key: &str, text: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(text.trim()) {
        Ok(at) => Some(at.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(key, error = %e, "Ignoring unparsable cache expiration");
            None
        }
    }
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write bytes atomically using temp file + rename.
async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let temp_path = parent.join(format!(
        ".{}.tmp.{}.{seq}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("cache"),
        std::process::id()
    ));

    fs::write(&temp_path, content).await?;
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e);
    }
    Ok(())
}
