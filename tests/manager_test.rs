//! Integration tests for the connection manager and profile persistence.
//!
//! Drives the whole layer against a mock server: negotiate, persist, restart,
//! fetch, cache and refresh.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

use insight::core::manager::STATUS_CACHE_KEY;
use insight::core::{
    AuthNegotiator, ConnectionManager, CredentialMode, Credentials, RefreshInterval, StatusFetcher,
    StrategyId,
};
use insight::error::InsightError;
use insight::storage::ProfileStore;
use insight::test_utils::{TestDir, make_test_password_profile, make_test_token_profile};

use common::fixtures::{
    TEST_PASSWORD, TEST_TOKEN, TEST_USERNAME, VERSION, mount_reject_everything, mount_status,
};
use common::logger::TestLogger;

fn manager(dir: &TestDir) -> ConnectionManager {
    ConnectionManager::new(
        &dir.app_paths(),
        AuthNegotiator::new(Duration::from_secs(5), true).with_tls_probe(false),
    )
}

fn fetcher() -> StatusFetcher {
    StatusFetcher::new(Duration::from_secs(5), true).expect("client build")
}

// =============================================================================
// Connect / Logout
// =============================================================================

#[tokio::test]
async fn connect_persists_profile_across_restart() {
    let log = TestLogger::new("connect_persists_profile_across_restart");
    log.phase("setup");
    let dir = TestDir::new();
    let server = MockServer::start().await;
    mount_status(&server, TEST_USERNAME, "passhash", TEST_PASSWORD, 200).await;
    mount_reject_everything(&server).await;

    log.phase("execute");
    let status = manager(&dir)
        .connect(
            &format!("{}/", server.uri()),
            &Credentials::password(format!(" {TEST_USERNAME} "), TEST_PASSWORD),
            &CancellationToken::new(),
        )
        .await;
    log.attempts(&status);

    log.phase("verify");
    assert!(status.connected);
    let restarted = manager(&dir);
    let profile = restarted.current_profile().expect("profile persisted");
    assert_eq!(profile.server_url, server.uri());
    assert_eq!(profile.server_version, VERSION);
    assert_eq!(profile.credential_mode(), CredentialMode::Password);
    assert_eq!(profile.credentials.username(), Some(TEST_USERNAME));
    assert!(profile.insecure_tls);
    assert_eq!(restarted.login_history().load(), vec![TEST_USERNAME]);
    log.finish_ok();
}

#[tokio::test]
async fn failed_connect_keeps_previous_profile() {
    let log = TestLogger::new("failed_connect_keeps_previous_profile");
    let dir = TestDir::new();
    let server = MockServer::start().await;
    mount_reject_everything(&server).await;

    let manager = manager(&dir);
    let previous = make_test_token_profile("https://previous.local");
    if let Some(handle) = manager.profiles().set(previous.clone()) {
        handle.await.unwrap();
    }

    let status = manager
        .connect(
            &server.uri(),
            &Credentials::api_token(TEST_TOKEN),
            &CancellationToken::new(),
        )
        .await;

    assert!(!status.connected);
    assert_eq!(manager.current_profile().unwrap(), previous);
    assert!(manager.login_history().load().is_empty());
    log.finish_ok();
}

#[tokio::test]
async fn token_connect_records_no_username() {
    let log = TestLogger::new("token_connect_records_no_username");
    let dir = TestDir::new();
    let server = MockServer::start().await;
    mount_status(&server, "apitoken", "passhash", TEST_TOKEN, 200).await;

    let status = manager(&dir)
        .connect(
            &server.uri(),
            &Credentials::api_token(TEST_TOKEN),
            &CancellationToken::new(),
        )
        .await;

    assert!(status.connected);
    assert!(!dir.app_paths().login_history_file().exists());
    log.finish_ok();
}

#[tokio::test]
async fn logout_clears_profile_and_file() {
    let log = TestLogger::new("logout_clears_profile_and_file");
    let dir = TestDir::new();
    let mut manager = manager(&dir);
    if let Some(handle) = manager
        .profiles()
        .set(make_test_password_profile("https://prtg.local"))
    {
        handle.await.unwrap();
    }
    assert!(dir.app_paths().settings_file().exists());

    manager.logout();

    assert!(matches!(
        manager.current_profile(),
        Err(InsightError::NotConnected)
    ));
    assert!(!dir.app_paths().settings_file().exists());
    assert!(manager.current_profile().is_err());
    log.finish_ok();
}

// =============================================================================
// Profile Store
// =============================================================================

#[tokio::test]
async fn profile_store_load_reads_what_set_wrote() {
    let log = TestLogger::new("profile_store_load_reads_what_set_wrote");
    let dir = TestDir::new();
    let path = dir.app_paths().settings_file();
    let profile = make_test_token_profile("https://prtg.local");

    let writer = ProfileStore::new(path.clone());
    if let Some(handle) = writer.set(profile.clone()) {
        handle.await.unwrap();
    }

    let reader = ProfileStore::new(path);
    assert_eq!(reader.load().await, Some(profile));
    assert!(reader.is_connected());
    log.finish_ok();
}

#[tokio::test]
async fn profile_file_does_not_leak_into_logs() {
    let (log, capture) = TestLogger::with_capture("profile_file_does_not_leak_into_logs");
    let dir = TestDir::new();
    let store = ProfileStore::new(dir.app_paths().settings_file());

    if let Some(handle) = store.set(make_test_token_profile("https://prtg.local")) {
        handle.await.unwrap();
    }

    capture.assert_logged("Connection profile stored");
    capture.assert_never_logged(TEST_TOKEN);
    log.finish_ok();
}

#[test]
fn profile_store_works_without_runtime() {
    let log = TestLogger::new("profile_store_works_without_runtime");
    let dir = TestDir::new();
    let store = ProfileStore::new(dir.app_paths().settings_file());

    let handle = store.set(make_test_token_profile("https://prtg.local"));

    assert!(handle.is_none());
    assert!(dir.app_paths().settings_file().exists());
    log.finish_ok();
}

// =============================================================================
// Status + Cache
// =============================================================================

#[tokio::test]
async fn refresh_status_requires_connection() {
    let log = TestLogger::new("refresh_status_requires_connection");
    let dir = TestDir::new();

    let err = manager(&dir).refresh_status(&fetcher()).await.unwrap_err();

    assert!(matches!(err, InsightError::NotConnected), "{err:?}");
    log.finish_ok();
}

#[tokio::test]
async fn refresh_status_caches_across_restart() {
    let log = TestLogger::new("refresh_status_caches_across_restart");
    let dir = TestDir::new();
    let server = MockServer::start().await;
    mount_status(&server, "apitoken", "passhash", TEST_TOKEN, 200).await;

    let manager = manager(&dir);
    if let Some(handle) = manager
        .profiles()
        .set(make_test_token_profile(&server.uri()))
    {
        handle.await.unwrap();
    }

    let status = manager.refresh_status(&fetcher()).await.expect("refresh");
    assert_eq!(status.version.as_deref(), Some(VERSION));

    let restarted = self::manager(&dir);
    let cached = restarted.cached_status().await.expect("cached status");
    assert_eq!(cached, status);
    assert!(restarted.cache().read(STATUS_CACHE_KEY).await.is_some());
    log.finish_ok();
}

#[tokio::test]
async fn refresh_after_plaintext_password_connect() {
    let log = TestLogger::new("refresh_after_plaintext_password_connect");
    log.phase("setup");
    let dir = TestDir::new();
    let server = MockServer::start().await;
    // Only the plaintext encoding is accepted, for connect and refresh alike.
    mount_status(&server, TEST_USERNAME, "password", TEST_PASSWORD, 200).await;
    mount_reject_everything(&server).await;

    log.phase("connect");
    let status = manager(&dir)
        .connect(
            &server.uri(),
            &Credentials::password(TEST_USERNAME, TEST_PASSWORD),
            &CancellationToken::new(),
        )
        .await;
    log.attempts(&status);
    assert!(status.connected);
    assert_eq!(status.strategy, Some(StrategyId::Password));

    log.phase("refresh after restart");
    let restarted = manager(&dir);
    let profile = restarted.current_profile().expect("profile persisted");
    assert_eq!(profile.accepted_by, Some(StrategyId::Password));
    let refreshed = restarted
        .refresh_status(&fetcher())
        .await
        .expect("refresh uses the accepted encoding");
    assert_eq!(refreshed.version.as_deref(), Some(VERSION));
    log.finish_ok();
}

#[tokio::test]
async fn status_ttl_expires_cached_status() {
    let log = TestLogger::new("status_ttl_expires_cached_status");
    let dir = TestDir::new();
    let server = MockServer::start().await;
    mount_status(&server, "apitoken", "passhash", TEST_TOKEN, 200).await;

    let manager = manager(&dir).with_status_ttl(Some(Duration::from_millis(100)));
    if let Some(handle) = manager
        .profiles()
        .set(make_test_token_profile(&server.uri()))
    {
        handle.await.unwrap();
    }
    manager.refresh_status(&fetcher()).await.expect("refresh");
    assert!(manager.cached_status().await.is_some());

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(manager.cached_status().await.is_none());
    log.finish_ok();
}

// =============================================================================
// Auto Refresh
// =============================================================================

#[tokio::test]
async fn auto_refresh_reports_successes_and_failures() {
    let log = TestLogger::new("auto_refresh_reports_successes_and_failures");
    log.phase("setup");
    let dir = TestDir::new();
    let server = MockServer::start().await;
    mount_status(&server, "apitoken", "passhash", TEST_TOKEN, 200).await;

    let mut manager = manager(&dir);
    if let Some(handle) = manager
        .profiles()
        .set(make_test_token_profile(&server.uri()))
    {
        handle.await.unwrap();
    }

    let ok = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let callback = {
        let ok = Arc::clone(&ok);
        let failed = Arc::clone(&failed);
        manager.status_refresh_callback(Arc::new(fetcher()), move |result| {
            if result.is_ok() {
                ok.fetch_add(1, Ordering::SeqCst);
            } else {
                failed.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    log.phase("execute");
    manager
        .start_auto_refresh(RefreshInterval::from_secs(1), callback)
        .unwrap();
    assert!(manager.scheduler().is_running());
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    // Logging out mid-schedule turns later ticks into failures.
    manager.profiles().clear();
    tokio::time::sleep(Duration::from_millis(1_000)).await;
    manager.stop_auto_refresh();

    log.phase("verify");
    assert!(!manager.scheduler().is_running());
    assert!(ok.load(Ordering::SeqCst) >= 1);
    assert!(failed.load(Ordering::SeqCst) >= 1);
    log.finish_ok();
}

#[tokio::test]
async fn disabled_interval_stops_refresh() {
    let log = TestLogger::new("disabled_interval_stops_refresh");
    let dir = TestDir::new();
    let mut manager = manager(&dir);
    let callback = manager.status_refresh_callback(Arc::new(fetcher()), |_| {});

    manager
        .start_auto_refresh(RefreshInterval::from_secs(60), Arc::clone(&callback))
        .unwrap();
    assert!(manager.scheduler().is_running());

    manager.update_refresh_interval(RefreshInterval::Disabled);
    assert!(!manager.scheduler().is_running());

    manager
        .start_auto_refresh(RefreshInterval::from_secs(0), callback)
        .unwrap();
    assert!(!manager.scheduler().is_running());
    log.finish_ok();
}
