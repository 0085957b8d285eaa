//! CLI argument definitions using clap.

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};

/// Insight - connect to and watch a network monitoring server.
#[derive(Parser, Debug)]
#[command(name = "insight")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Human,
    /// JSON
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate against a server and remember the session
    Connect(ConnectArgs),

    /// Show the server status for the stored session
    Status(StatusArgs),

    /// Refresh the server status periodically until interrupted
    Watch(WatchArgs),

    /// Forget the stored session
    Logout,

    /// Manage the local cache
    #[command(subcommand)]
    Cache(CacheCommand),
}

/// Arguments for the `connect` command.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("auth").required(true).args(["token", "username"])))]
pub struct ConnectArgs {
    /// Server URL (scheme optional, https assumed)
    pub url: String,

    /// API token
    #[arg(long, env = "INSIGHT_TOKEN", hide_env_values = true, conflicts_with_all = ["username", "password"])]
    pub token: Option<String>,

    /// Username for password login
    #[arg(long, short = 'u', requires = "password")]
    pub username: Option<String>,

    /// Password for password login
    #[arg(long, short = 'p', env = "INSIGHT_PASSWORD", hide_env_values = true, requires = "username")]
    pub password: Option<String>,

    /// Require a valid server certificate
    #[arg(long)]
    pub strict_tls: bool,
}

/// Arguments for the `status` command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show the last cached status without contacting the server
    #[arg(long)]
    pub cached: bool,
}

/// Arguments for the `watch` command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Refresh interval in seconds (0 disables refreshing)
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,
}

/// Cache subcommands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Delete every cached entry
    Clear,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn connect_with_token() {
        let cli = Cli::try_parse_from(["insight", "connect", "prtg.local", "--token", "abc"]).unwrap();
        let Commands::Connect(args) = cli.command else {
            panic!("expected connect");
        };
        assert_eq!(args.url, "prtg.local");
        assert_eq!(args.token.as_deref(), Some("abc"));
        assert!(!args.strict_tls);
    }

    #[test]
    fn connect_requires_credentials() {
        assert!(Cli::try_parse_from(["insight", "connect", "prtg.local"]).is_err());
    }

    #[test]
    fn username_requires_password() {
        assert!(Cli::try_parse_from(["insight", "connect", "prtg.local", "-u", "admin"]).is_err());
    }

    #[test]
    fn token_conflicts_with_username() {
        let parsed = Cli::try_parse_from([
            "insight", "connect", "prtg.local", "--token", "t", "-u", "admin", "-p", "pw",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn json_shorthand() {
        let cli = Cli::try_parse_from(["insight", "status", "--json"]).unwrap();
        assert_eq!(cli.effective_format(), OutputFormat::Json);
    }

    #[test]
    fn watch_interval() {
        let cli = Cli::try_parse_from(["insight", "watch", "--interval", "15"]).unwrap();
        let Commands::Watch(args) = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(args.interval, Some(15));
    }
}
