//! Storage for configuration, the connection profile, and caches.

pub mod cache;
pub mod config;
pub mod login_history;
pub mod paths;
pub mod profile;

pub use cache::{CacheEntry, CacheStore};
pub use config::{
    Config, ConfigOverrides, ConfigSource, ConfigSources, ENV_CONFIG, ENV_REFRESH_INTERVAL,
    ENV_TIMEOUT, ResolvedConfig,
};
pub use login_history::LoginHistory;
pub use paths::AppPaths;
pub use profile::ProfileStore;
