//! `connect` and `logout` commands.

use tokio_util::sync::CancellationToken;

use super::CommandContext;
use super::args::ConnectArgs;
use crate::core::models::Credentials;
use crate::core::negotiator::MSG_CANCELLED;
use crate::error::{InsightError, Result};

/// Negotiate a session and persist it.
///
/// Ctrl+C cancels the attempt between requests.
///
/// # Errors
/// Returns `ConnectFailed` when no strategy was accepted, `Cancelled` when
/// interrupted.
pub async fn connect(args: &ConnectArgs, ctx: &CommandContext) -> Result<()> {
    let credentials = match (&args.token, &args.username, &args.password) {
        (Some(token), _, _) => Credentials::api_token(token.as_str()),
        (None, Some(username), Some(password)) => {
            Credentials::password(username.as_str(), password.as_str())
        }
        _ => return Err(InsightError::MissingCredential { field: "Credentials" }),
    };

    let insecure_tls = ctx.config.insecure_tls && !args.strict_tls;
    let manager = ctx.manager(insecure_tls);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling connection attempt");
            on_interrupt.cancel();
        }
    });

    let status = manager.connect(&args.url, &credentials, &cancel).await;
    interrupt.abort();

    if ctx.is_json() {
        ctx.print_json(&status)?;
    } else if status.connected {
        println!("{} (version {})", status.message, status.version);
        if status.ssl_warning {
            println!("Warning: the server certificate could not be verified.");
        }
    }

    if status.connected {
        return Ok(());
    }
    if status.message == MSG_CANCELLED {
        return Err(InsightError::Cancelled);
    }
    Err(InsightError::ConnectFailed {
        message: status.message,
    })
}

/// Forget the stored session.
///
/// # Errors
/// Returns an error only if JSON output fails.
pub fn logout(ctx: &CommandContext) -> Result<()> {
    let mut manager = ctx.manager(ctx.config.insecure_tls);
    let was_connected = manager.profiles().is_connected();
    manager.logout();

    if ctx.is_json() {
        ctx.print_json(&serde_json::json!({ "loggedOut": was_connected }))?;
    } else if was_connected {
        println!("Logged out.");
    } else {
        println!("No stored session.");
    }
    Ok(())
}
