//! Recently used login names.
//!
//! Most-recent-first, deduplicated, capped at [`MAX_ENTRIES`]. Only
//! usernames are stored; secrets never touch this file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Maximum number of remembered usernames.
pub const MAX_ENTRIES: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginHistoryFile {
    version: u32,
    usernames: Vec<String>,
}

impl Default for LoginHistoryFile {
    fn default() -> Self {
        Self {
            version: 1,
            usernames: Vec::new(),
        }
    }
}

/// Login history persisted as JSON.
#[derive(Debug, Clone)]
pub struct LoginHistory {
    path: PathBuf,
}

impl LoginHistory {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remembered usernames, most recent first. Missing or corrupt files
    /// read as empty.
    #[must_use]
    pub fn load(&self) -> Vec<String> {
        match self.read_file() {
            Ok(file) => file.usernames,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable login history");
                Vec::new()
            }
        }
    }

    /// Move `username` to the front of the history and persist.
    ///
    /// Blank names are ignored. Persistence failures are logged.
    pub fn add(&self, username: &str) {
        let username = username.trim();
        if username.is_empty() {
            return;
        }

        let mut usernames = self.load();
        usernames.retain(|u| u != username);
        usernames.insert(0, username.to_string());
        usernames.truncate(MAX_ENTRIES);

        let file = LoginHistoryFile {
            usernames,
            ..LoginHistoryFile::default()
        };
        if let Err(e) = self.write_file(&file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to save login history");
        }
    }

    fn read_file(&self) -> Result<LoginHistoryFile> {
        if !self.path.exists() {
            return Ok(LoginHistoryFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(LoginHistoryFile::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn write_file(&self, file: &LoginHistoryFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(file)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
