//! Connection manager.
//!
//! Single owner of the profile store, cache, scheduler, negotiator and login
//! history for one application instance. Nothing here is process-global;
//! two managers built on different paths are fully independent.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::http::normalize_server_url;
use super::models::{ConnectionProfile, ConnectionStatus, Credentials, ServerStatus};
use super::negotiator::AuthNegotiator;
use super::scheduler::{RefreshCallback, RefreshInterval, RefreshScheduler, refresh_callback};
use super::status::StatusFetcher;
use crate::error::{InsightError, Result};
use crate::storage::{AppPaths, CacheStore, LoginHistory, ProfileStore};

/// Cache key of the last fetched server status.
pub const STATUS_CACHE_KEY: &str = "server-status";

/// Owns every connection-layer component.
#[derive(Debug)]
pub struct ConnectionManager {
    profiles: Arc<ProfileStore>,
    cache: Arc<CacheStore>,
    scheduler: RefreshScheduler,
    negotiator: AuthNegotiator,
    login_history: LoginHistory,
    status_ttl: Option<Duration>,
}

impl ConnectionManager {
    /// Build a manager whose files live under `paths`.
    #[must_use]
    pub fn new(paths: &AppPaths, negotiator: AuthNegotiator) -> Self {
        Self {
            profiles: Arc::new(ProfileStore::new(paths.settings_file())),
            cache: Arc::new(CacheStore::new(paths.cache_entries_dir())),
            scheduler: RefreshScheduler::new(),
            negotiator,
            login_history: LoginHistory::new(paths.login_history_file()),
            status_ttl: None,
        }
    }

    /// Expire cached status documents after `ttl`.
    #[must_use]
    pub const fn with_status_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.status_ttl = ttl;
        self
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    #[must_use]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    #[must_use]
    pub const fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    #[must_use]
    pub const fn negotiator(&self) -> &AuthNegotiator {
        &self.negotiator
    }

    #[must_use]
    pub const fn login_history(&self) -> &LoginHistory {
        &self.login_history
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Negotiate a session and, on success, persist it.
    ///
    /// The stored profile carries the normalized URL, trimmed credentials and
    /// the reported server version. The settings file is written before this
    /// returns.
    pub async fn connect(
        &self,
        server_url: &str,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> ConnectionStatus {
        let status = self.negotiator.negotiate(server_url, credentials, cancel).await;
        if !status.connected {
            tracing::info!(message = %status.message, "Connection not established");
            return status;
        }

        let credentials = credentials.sanitized();
        let mut profile =
            ConnectionProfile::new(normalize_server_url(server_url), credentials.clone())
                .with_version(status.version.clone())
                .with_accepted_by(status.strategy);
        profile.insecure_tls = self.negotiator.insecure_tls();

        tracing::info!(
            server = %profile.server_url,
            mode = profile.credential_mode().label(),
            version = %profile.server_version,
            strategy = ?profile.accepted_by,
            "Connected"
        );

        if let Some(handle) = self.profiles.set(profile)
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Profile persistence task failed");
        }
        if let Some(username) = credentials.username() {
            self.login_history.add(username);
        }

        status
    }

    /// Stop refreshing and forget the stored profile.
    pub fn logout(&mut self) {
        self.scheduler.stop();
        self.profiles.clear();
        tracing::info!("Logged out");
    }

    /// The stored profile, if connected.
    ///
    /// # Errors
    /// Returns `NotConnected` when no usable profile is stored.
    pub fn current_profile(&self) -> Result<ConnectionProfile> {
        self.profiles
            .get()
            .filter(|p| !p.server_url.is_empty())
            .ok_or(InsightError::NotConnected)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Fetch the server status for the stored profile and cache it.
    ///
    /// # Errors
    /// Returns an error when not connected or the fetch fails.
    pub async fn refresh_status(&self, fetcher: &StatusFetcher) -> Result<ServerStatus> {
        refresh_status(&self.profiles, &self.cache, fetcher, self.status_ttl).await
    }

    /// Last cached server status, if still fresh.
    pub async fn cached_status(&self) -> Option<ServerStatus> {
        self.cache.read_json(STATUS_CACHE_KEY).await
    }

    /// Scheduler callback that refreshes the status and reports every
    /// outcome to `on_update`. Failures are also returned to the scheduler.
    #[must_use]
    pub fn status_refresh_callback<F>(&self, fetcher: Arc<StatusFetcher>, on_update: F) -> RefreshCallback
    where
        F: Fn(&Result<ServerStatus>) + Send + Sync + 'static,
    {
        let profiles = Arc::clone(&self.profiles);
        let cache = Arc::clone(&self.cache);
        let ttl = self.status_ttl;
        let on_update = Arc::new(on_update);

        refresh_callback(move || {
            let profiles = Arc::clone(&profiles);
            let cache = Arc::clone(&cache);
            let fetcher = Arc::clone(&fetcher);
            let on_update = Arc::clone(&on_update);
            async move {
                let result = refresh_status(&profiles, &cache, &fetcher, ttl).await;
                on_update(&result);
                result.map(|_| ()).map_err(anyhow::Error::from)
            }
        })
    }

    // =========================================================================
    // Auto Refresh
    // =========================================================================

    /// Start (or restart) periodic refresh. `Disabled` stops it.
    ///
    /// # Errors
    /// Returns an error when called outside a tokio runtime.
    pub fn start_auto_refresh(
        &mut self,
        interval: RefreshInterval,
        callback: RefreshCallback,
    ) -> Result<()> {
        match interval.duration() {
            Some(period) => self.scheduler.start(period, callback),
            None => {
                self.scheduler.stop();
                Ok(())
            }
        }
    }

    pub fn stop_auto_refresh(&mut self) {
        self.scheduler.stop();
    }

    /// Change the live refresh period. `Disabled` stops refreshing.
    pub fn update_refresh_interval(&mut self, interval: RefreshInterval) {
        match interval.duration() {
            Some(period) => self.scheduler.update_interval(period),
            None => self.scheduler.stop(),
        }
    }
}

async fn refresh_status(
    profiles: &ProfileStore,
    cache: &CacheStore,
    fetcher: &StatusFetcher,
    ttl: Option<Duration>,
) -> Result<ServerStatus> {
    let profile = profiles
        .get()
        .filter(|p| !p.server_url.is_empty())
        .ok_or(InsightError::NotConnected)?;

    let status = fetcher.fetch(&profile).await.inspect_err(|e| {
        tracing::debug!(error = %e, retryable = e.is_retryable(), "Server status fetch failed");
    })?;
    cache.write_json(STATUS_CACHE_KEY, &status, ttl).await;
    tracing::debug!(version = %status.version_or_unknown(), "Server status refreshed");
    Ok(status)
}
