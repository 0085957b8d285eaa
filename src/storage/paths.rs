//! Application paths for config, cache, and data.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Application paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Configuration directory.
    pub config: PathBuf,
    /// Cache directory.
    pub cache: PathBuf,
    /// Data directory.
    pub data: PathBuf,
}

impl AppPaths {
    /// Create paths for the insight application.
    #[must_use]
    pub fn new() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("com", "insight", "insight") {
            Self {
                config: proj_dirs.config_dir().to_path_buf(),
                cache: proj_dirs.cache_dir().to_path_buf(),
                data: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            // Fallback to home directory
            let home = directories::BaseDirs::new()
                .map_or_else(|| PathBuf::from("."), |d| d.home_dir().to_path_buf());
            Self {
                config: home.join(".config/insight"),
                cache: home.join(".cache/insight"),
                data: home.join(".local/share/insight"),
            }
        }
    }

    /// All directories under one root. Used by tests and portable installs.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        Self {
            config: root.join("config"),
            cache: root.join("cache"),
            data: root.join("data"),
        }
    }

    /// Persisted connection profile.
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config.join("settings.json")
    }

    /// Recently used login names.
    #[must_use]
    pub fn login_history_file(&self) -> PathBuf {
        self.config.join("login_history.json")
    }

    /// TOML configuration file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    /// Durable tier of the cache store.
    #[must_use]
    pub fn cache_entries_dir(&self) -> PathBuf {
        self.cache.join("entries")
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config)?;
        std::fs::create_dir_all(self.cache_entries_dir())?;
        std::fs::create_dir_all(&self.data)?;
        Ok(())
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn files_live_in_expected_dirs() {
        let paths = AppPaths::under(Path::new("/tmp/insight-test"));
        assert_eq!(paths.settings_file(), Path::new("/tmp/insight-test/config/settings.json"));
        assert_eq!(
            paths.login_history_file(),
            Path::new("/tmp/insight-test/config/login_history.json")
        );
        assert_eq!(paths.cache_entries_dir(), Path::new("/tmp/insight-test/cache/entries"));
    }

    #[test]
    fn ensure_dirs_creates_tree() {
        let tmp = tempfile::TempDir::new().unwrap();
        let paths = AppPaths::under(tmp.path());
        paths.ensure_dirs().unwrap();
        assert!(paths.config.is_dir());
        assert!(paths.cache_entries_dir().is_dir());
    }
}
