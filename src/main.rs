//! insight - network monitoring session manager
//!
//! CLI entry point.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use std::process::ExitCode;

use insight::cli::{Cli, CommandContext, Commands, session, status, watch};
use insight::core::logging::{self, LogSettings};
use insight::error::InsightError;
use insight::storage::{AppPaths, ConfigOverrides, ResolvedConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        timeout_secs: cli.timeout,
        refresh_interval_secs: None,
        insecure_tls: None,
    };
    let config = ResolvedConfig::resolve(&overrides);

    // Initialize logging
    let config_level = config.as_ref().ok().and_then(|c| c.log_level.clone());
    let settings = LogSettings::resolve(
        cli.log_level.as_deref(),
        cli.json_output,
        config_level.as_deref(),
    );
    logging::init(&settings, cli.verbose);

    let result = match config {
        Ok(config) => {
            let ctx = CommandContext {
                paths: AppPaths::new(),
                config,
                format: cli.effective_format(),
                pretty: cli.pretty,
            };
            run(&cli.command, &ctx).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.error_code(), "{e}");
            report_error(&e, cli.effective_format() == insight::cli::OutputFormat::Json);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(command: &Commands, ctx: &CommandContext) -> insight::Result<()> {
    match command {
        Commands::Connect(args) => session::connect(args, ctx).await,
        Commands::Status(args) => status::status(args, ctx).await,
        Commands::Watch(args) => watch::run_watch(args, ctx).await,
        Commands::Logout => session::logout(ctx),
        Commands::Cache(cmd) => status::cache(cmd, ctx).await,
    }
}

fn report_error(e: &InsightError, json: bool) {
    if json {
        let body = serde_json::json!({
            "error": {
                "code": e.error_code(),
                "category": e.category().to_string(),
                "message": e.to_string(),
                "hint": e.hint(),
            }
        });
        eprintln!("{body}");
        return;
    }

    eprintln!("Error [{}]: {e}", e.error_code());
    if let Some(hint) = e.hint() {
        eprintln!("Hint: {hint}");
    }
}
