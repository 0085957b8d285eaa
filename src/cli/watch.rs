//! `watch` command: periodic status refresh until Ctrl+C.
//!
//! The refresh scheduler drives the fetches; every outcome is folded into a
//! shared `WatchState` and rendered as one frame.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::args::{OutputFormat, WatchArgs};
use super::{CommandContext, render_server_status};
use crate::core::models::ServerStatus;
use crate::core::scheduler::RefreshInterval;
use crate::core::status::StatusFetcher;
use crate::error::Result;

/// State tracking across watch iterations.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchState {
    pub last_status: Option<ServerStatus>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub fetch_count: u64,
    pub error_count: u64,
    pub last_error: Option<String>,
}

impl WatchState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the cache so the first frame shows last-known data.
    #[must_use]
    pub fn from_cached(status: Option<ServerStatus>) -> Self {
        Self {
            last_status: status,
            ..Self::default()
        }
    }

    /// Fold one fetch outcome in. Failures keep the last good status.
    pub fn update(&mut self, result: &Result<ServerStatus>) {
        self.fetch_count += 1;
        match result {
            Ok(status) => {
                self.last_status = Some(status.clone());
                self.last_fetch_at = Some(Utc::now());
                self.last_error = None;
            }
            Err(e) => {
                self.error_count += 1;
                self.last_error = Some(e.to_string());
            }
        }
    }
}

/// Run watch mode.
///
/// # Errors
/// Returns `NotConnected` without a stored session, or a scheduler error.
pub async fn run_watch(args: &WatchArgs, ctx: &CommandContext) -> Result<()> {
    let interval = args
        .interval
        .map_or(ctx.config.refresh, RefreshInterval::from_secs);

    let mut manager = ctx.manager(ctx.config.insecure_tls);
    let profile = manager.current_profile()?;
    let fetcher = Arc::new(StatusFetcher::for_profile(&profile, ctx.config.timeout)?);

    let state = Arc::new(Mutex::new(WatchState::from_cached(
        manager.cached_status().await,
    )));
    let server = profile.server_url.clone();
    let format = ctx.format;
    let pretty = ctx.pretty;

    // Immediate refresh; the scheduler's first tick is one interval out.
    let first = manager.refresh_status(&fetcher).await;
    {
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.update(&first);
        render_watch_frame(&guard, &server, format, pretty);
    }

    if interval == RefreshInterval::Disabled {
        tracing::info!("Auto refresh disabled; showing a single snapshot");
        return Ok(());
    }

    let frame_state = Arc::clone(&state);
    let frame_server = server.clone();
    let callback = manager.status_refresh_callback(fetcher, move |result| {
        let mut guard = frame_state.lock().unwrap_or_else(PoisonError::into_inner);
        guard.update(result);
        render_watch_frame(&guard, &frame_server, format, pretty);
    });
    manager.start_auto_refresh(interval, callback)?;

    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Failed to listen for Ctrl+C; stopping watch");
    }
    manager.stop_auto_refresh();

    let guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    tracing::info!(
        fetches = guard.fetch_count,
        errors = guard.error_count,
        "Watch stopped"
    );
    Ok(())
}

fn render_watch_frame(state: &WatchState, server: &str, format: OutputFormat, pretty: bool) {
    if format == OutputFormat::Json {
        let rendered = if pretty {
            serde_json::to_string_pretty(state)
        } else {
            serde_json::to_string(state)
        };
        match rendered {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize watch frame"),
        }
        return;
    }

    if let Some(status) = &state.last_status {
        let updated = state
            .last_fetch_at
            .map_or_else(|| "cached".to_string(), |at| at.format("%H:%M:%S").to_string());
        println!("{}\nUpdated:   {updated}\n", render_server_status(server, status));
    }
    if let Some(err) = &state.last_error {
        eprintln!("Error: {err}");
    }
}
