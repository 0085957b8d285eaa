//! Test utilities for insight.
//!
//! Shared factories, an isolated directory helper, and assertion macros for
//! unit and integration tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use insight::test_utils::*;
//!
//! let dir = TestDir::new();
//! let paths = dir.app_paths();
//! let profile = make_test_token_profile("https://prtg.local");
//! ```

use std::fs;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

use crate::core::models::{ConnectionProfile, Credentials, ServerStatus};
use crate::storage::AppPaths;

// =============================================================================
// Test Data Factories
// =============================================================================

/// API token used by the token factories.
pub const TEST_TOKEN: &str = "TESTTOKEN1234567890";
/// Username used by the password factories.
pub const TEST_USERNAME: &str = "prtgadmin";
/// Password used by the password factories.
pub const TEST_PASSWORD: &str = "s3cret-pass";

/// Token profile for `server_url` with a known version.
#[must_use]
pub fn make_test_token_profile(server_url: &str) -> ConnectionProfile {
    ConnectionProfile::new(server_url, Credentials::api_token(TEST_TOKEN)).with_version("24.1.92.1554")
}

/// Password profile for `server_url` with a known version.
#[must_use]
pub fn make_test_password_profile(server_url: &str) -> ConnectionProfile {
    ConnectionProfile::new(
        server_url,
        Credentials::password(TEST_USERNAME, TEST_PASSWORD),
    )
    .with_version("24.1.92.1554")
}

/// A fully populated server status.
#[must_use]
pub fn make_test_server_status() -> ServerStatus {
    ServerStatus {
        version: Some("24.1.92.1554".to_string()),
        new_alarms: Some("1".to_string()),
        alarms: Some("3".to_string()),
        ack_alarms: Some("0".to_string()),
        warning_sensors: Some("2".to_string()),
        up_sensors: Some("118".to_string()),
        clock: Some("16.10.2026 09:15:02".to_string()),
    }
}

/// Status endpoint JSON body reporting `version`.
#[must_use]
pub fn make_status_json(version: &str) -> String {
    serde_json::json!({
        "Version": version,
        "NewAlarms": "1",
        "Alarms": "3",
        "AckAlarms": "0",
        "WarnSens": "2",
        "UpSens": "118",
        "Clock": "16.10.2026 09:15:02",
    })
    .to_string()
}

/// Config file contents with every section set.
#[must_use]
pub fn make_test_config_toml() -> String {
    r#"[general]
timeout_seconds = 10
log_level = "debug"

[connection]
insecure_tls = false

[refresh]
enabled = true
interval_seconds = 15

[cache]
status_ttl_seconds = 120
"#
    .to_string()
}

// =============================================================================
// Isolated Directories
// =============================================================================

/// Temporary directory removed on drop.
///
/// ```rust,ignore
/// use insight::test_utils::TestDir;
///
/// let dir = TestDir::new();
/// dir.create_file("config/config.toml", "[general]\ntimeout_seconds = 30");
/// assert!(dir.file_exists("config/config.toml"));
/// ```
pub struct TestDir {
    inner: tempfile::TempDir,
}

impl TestDir {
    /// Create a new isolated temporary directory.
    ///
    /// # Panics
    ///
    /// Panics if the temporary directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: tempfile::tempdir().expect("Failed to create temp directory"),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// Application paths rooted in this directory.
    #[must_use]
    pub fn app_paths(&self) -> AppPaths {
        AppPaths::under(self.inner.path())
    }

    /// Create a file, creating parent directories as needed.
    ///
    /// # Panics
    ///
    /// Panics if the file cannot be created or written.
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.inner.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        let mut file = fs::File::create(&path).expect("Failed to create test file");
        file.write_all(content.as_bytes())
            .expect("Failed to write test file");
    }

    #[must_use]
    pub fn file_exists(&self, name: &str) -> bool {
        self.inner.path().join(name).exists()
    }

    #[must_use]
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.inner.path().join(name)
    }
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Assert that a string contains a substring.
#[macro_export]
macro_rules! assert_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            haystack.contains(needle),
            "Expected string to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}

/// Assert that a string does NOT contain a substring.
#[macro_export]
macro_rules! assert_not_contains {
    ($haystack:expr, $needle:expr) => {
        let haystack = $haystack;
        let needle = $needle;
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain {:?}\n\nActual string:\n{:?}",
            needle,
            haystack
        );
    };
}
