//! Single-slot store for the accepted connection profile.
//!
//! The in-memory slot is authoritative; the settings file is written in the
//! background after every `set` so a restart can resume the session. File
//! writes and deletes hold one lock and re-check the generation under it,
//! so the file always ends up matching the newest `set` or `clear`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use super::paths::AppPaths;
use crate::core::models::ConnectionProfile;
use crate::error::Result;

/// Holds at most one `ConnectionProfile`.
#[derive(Debug)]
pub struct ProfileStore {
    path: PathBuf,
    current: Mutex<Option<ConnectionProfile>>,
    /// Set once a load has been attempted or the slot was written.
    loaded: AtomicBool,
    /// Bumped on every set/clear; stale background writes are dropped.
    generation: Arc<AtomicU64>,
    /// Held for every change to the settings file.
    file_lock: Arc<Mutex<()>>,
}

impl ProfileStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            current: Mutex::new(None),
            loaded: AtomicBool::new(false),
            generation: Arc::new(AtomicU64::new(0)),
            file_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Store backed by the per-user settings file.
    #[must_use]
    pub fn open_default() -> Self {
        Self::new(AppPaths::new().settings_file())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn slot(&self) -> MutexGuard<'_, Option<ConnectionProfile>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored profile and persist it in the background.
    ///
    /// Returns the persistence task so callers may await it; `None` when no
    /// tokio runtime is available, in which case the write happens inline.
    /// Persistence failures are logged, never returned.
    pub fn set(&self, profile: ConnectionProfile) -> Option<JoinHandle<()>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.slot() = Some(profile.clone());
        self.loaded.store(true, Ordering::SeqCst);
        tracing::debug!(server = %profile.server_url, "Connection profile stored");

        let path = self.path.clone();
        let current_generation = Arc::clone(&self.generation);
        let file_lock = Arc::clone(&self.file_lock);
        let write = move || {
            let _guard = file_lock.lock().unwrap_or_else(PoisonError::into_inner);
            if current_generation.load(Ordering::SeqCst) != generation {
                tracing::trace!("Skipping superseded profile write");
                return;
            }
            if let Err(e) = persist(&path, &profile) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to save connection profile");
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => Some(runtime.spawn_blocking(write)),
            Err(_) => {
                write();
                None
            }
        }
    }

    /// Current profile.
    ///
    /// When the slot is empty, the settings file is read once per store
    /// instance; later calls never touch the disk.
    pub fn get(&self) -> Option<ConnectionProfile> {
        let mut slot = self.slot();
        if slot.is_none() && !self.loaded.swap(true, Ordering::SeqCst) {
            *slot = read_blocking(&self.path);
        }
        slot.clone()
    }

    /// Read the settings file into the slot.
    ///
    /// An absent, empty, or corrupt file leaves the slot empty.
    pub async fn load(&self) -> Option<ConnectionProfile> {
        let generation = self.generation.load(Ordering::SeqCst);
        let loaded = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => parse(&self.path, &text),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to read connection profile");
                None
            }
        };

        let mut slot = self.slot();
        // A set/clear that raced with the read wins.
        if self.generation.load(Ordering::SeqCst) == generation {
            *slot = loaded;
        }
        self.loaded.store(true, Ordering::SeqCst);
        slot.clone()
    }

    /// Forget the profile and delete the settings file.
    pub fn clear(&self) {
        let _guard = self.file_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.slot() = None;
        self.loaded.store(true, Ordering::SeqCst);

        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Connection profile cleared"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to delete connection profile");
            }
        }
    }

    /// A profile with a non-empty server URL is stored.
    pub fn is_connected(&self) -> bool {
        self.get().is_some_and(|p| !p.server_url.is_empty())
    }
}

fn parse(path: &Path, text: &str) -> Option<ConnectionProfile> {
    if text.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt connection profile");
            None
        }
    }
}

fn read_blocking(path: &Path) -> Option<ConnectionProfile> {
    match std::fs::read_to_string(path) {
        Ok(text) => parse(path, &text),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to read connection profile");
            None
        }
    }
}

/// Write through a temp file + rename so readers never see a partial file.
fn persist(path: &Path, profile: &ConnectionProfile) -> Result<()> {
    let content = serde_json::to_string_pretty(profile)?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let temp_path = path.with_extension(format!("json.tmp.{}", std::process::id()));
    std::fs::write(&temp_path, content)?;
    if let Err(e) = std::fs::rename(&temp_path, path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e.into());
    }
    Ok(())
}
