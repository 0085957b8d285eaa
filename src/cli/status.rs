//! `status` and `cache` commands.

use super::args::{CacheCommand, StatusArgs};
use super::{CommandContext, render_server_status};
use crate::core::status::StatusFetcher;
use crate::error::{InsightError, Result};

/// Print the server status for the stored session.
///
/// With `--cached` the last stored document is shown and the network is not
/// touched.
///
/// # Errors
/// Returns `NotConnected` without a stored session, or the fetch error.
pub async fn status(args: &StatusArgs, ctx: &CommandContext) -> Result<()> {
    let manager = ctx.manager(ctx.config.insecure_tls);
    let profile = manager.current_profile()?;

    let server_status = if args.cached {
        manager.cached_status().await.ok_or_else(|| {
            InsightError::Other(anyhow::anyhow!(
                "no cached status; run `insight status` first"
            ))
        })?
    } else {
        let fetcher = StatusFetcher::for_profile(&profile, ctx.config.timeout)?;
        manager.refresh_status(&fetcher).await?
    };

    if ctx.is_json() {
        ctx.print_json(&server_status)?;
    } else {
        println!("{}", render_server_status(&profile.server_url, &server_status));
    }
    Ok(())
}

/// Run a cache subcommand.
///
/// # Errors
/// Returns an error only if JSON output fails.
pub async fn cache(cmd: &CacheCommand, ctx: &CommandContext) -> Result<()> {
    match cmd {
        CacheCommand::Clear => {
            let manager = ctx.manager(ctx.config.insecure_tls);
            manager.cache().clear_all().await;
            if ctx.is_json() {
                ctx.print_json(&serde_json::json!({ "cleared": true }))?;
            } else {
                println!("Cache cleared.");
            }
            Ok(())
        }
    }
}
