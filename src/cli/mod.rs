//! CLI argument parsing and command dispatch.

pub mod args;
pub mod session;
pub mod status;
pub mod watch;

use serde::Serialize;

pub use args::{Cli, Commands, OutputFormat};

use crate::core::manager::ConnectionManager;
use crate::core::models::ServerStatus;
use crate::core::negotiator::AuthNegotiator;
use crate::error::Result;
use crate::storage::{AppPaths, ResolvedConfig};

/// Everything a command needs besides its own arguments.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub paths: AppPaths,
    pub config: ResolvedConfig,
    pub format: OutputFormat,
    pub pretty: bool,
}

impl CommandContext {
    /// Manager rooted at this context's paths.
    #[must_use]
    pub fn manager(&self, insecure_tls: bool) -> ConnectionManager {
        ConnectionManager::new(
            &self.paths,
            AuthNegotiator::new(self.config.timeout, insecure_tls),
        )
        .with_status_ttl(self.config.status_ttl)
    }

    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Print `value` as JSON on stdout.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        println!("{rendered}");
        Ok(())
    }
}

/// Human rendering of a server status block.
#[must_use]
pub fn render_server_status(server: &str, status: &ServerStatus) -> String {
    let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());
    format!(
        "Server:    {server}\n\
         Version:   {}\n\
         Alarms:    {} (new {}, acknowledged {})\n\
         Warnings:  {}\n\
         Up:        {}\n\
         Clock:     {}",
        status.version_or_unknown(),
        field(&status.alarms),
        field(&status.new_alarms),
        field(&status.ack_alarms),
        field(&status.warning_sensors),
        field(&status.up_sensors),
        field(&status.clock),
    )
}
