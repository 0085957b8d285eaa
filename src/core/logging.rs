//! Diagnostic logging to stderr or a file.
//!
//! Level precedence: `--log-level` flag, then `INSIGHT_LOG`, then the
//! config file's `log_level`, then `error`. `RUST_LOG` replaces the whole
//! filter when set.

use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

pub const LOG_LEVEL_ENV: &str = "INSIGHT_LOG";
pub const LOG_FORMAT_ENV: &str = "INSIGHT_LOG_FORMAT";
pub const LOG_FILE_ENV: &str = "INSIGHT_LOG_FILE";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable logs.
    #[default]
    Human,
    /// JSON logs (one event per line).
    Json,
    /// Compact logs (single line, terse).
    Compact,
}

impl LogFormat {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Log level from CLI argument or config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    #[default]
    Error,
}

impl LogLevel {
    /// Parse from CLI argument.
    #[must_use]
    pub fn from_arg(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "verbose" | "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "critical" => Some(Self::Error),
            _ => None,
        }
    }

    /// Convert to tracing filter string.
    #[must_use]
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    #[must_use]
    pub const fn as_tracing_level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Merge CLI flags, `INSIGHT_LOG*` variables and the config file level.
    #[must_use]
    pub fn resolve(cli_level: Option<&str>, json_output: bool, config_level: Option<&str>) -> Self {
        Self::resolve_with(cli_level, json_output, config_level, &|key| {
            std::env::var(key).ok()
        })
    }

    /// Like [`resolve`](Self::resolve) with an explicit environment lookup.
    #[must_use]
    pub fn resolve_with(
        cli_level: Option<&str>,
        json_output: bool,
        config_level: Option<&str>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Self {
        let level = cli_level
            .and_then(LogLevel::from_arg)
            .or_else(|| non_empty(env(LOG_LEVEL_ENV)).and_then(|v| LogLevel::from_arg(&v)))
            .or_else(|| config_level.and_then(LogLevel::from_arg))
            .unwrap_or_default();

        let format = if json_output {
            LogFormat::Json
        } else {
            non_empty(env(LOG_FORMAT_ENV))
                .and_then(|v| LogFormat::from_arg(&v))
                .unwrap_or_default()
        };

        let file = non_empty(env(LOG_FILE_ENV)).map(PathBuf::from);

        Self {
            level,
            format,
            file,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Initialize logging with the given settings.
///
/// `verbose` raises the default `error` level to `debug`.
pub fn init(settings: &LogSettings, verbose: bool) {
    let level = if verbose && settings.level == LogLevel::Error {
        LogLevel::Debug
    } else {
        settings.level
    };

    let file = settings.file.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    let make_writer = |file: Option<&std::fs::File>| -> BoxMakeWriter {
        if let Some(file) = file.and_then(|inner| inner.try_clone().ok()) {
            BoxMakeWriter::new(file)
        } else {
            BoxMakeWriter::new(std::io::stderr)
        }
    };

    let make_filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("insight={}", level.as_filter())))
    };

    match settings.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(make_filter())
                .json()
                .with_writer(make_writer(file.as_ref()))
                .with_span_events(FmtSpan::CLOSE)
                .try_init()
                .ok();
        }
        LogFormat::Compact => {
            tracing_subscriber::fmt()
                .with_env_filter(make_filter())
                .compact()
                .with_writer(make_writer(file.as_ref()))
                .with_target(true)
                .try_init()
                .ok();
        }
        LogFormat::Human => {
            tracing_subscriber::fmt()
                .with_env_filter(make_filter())
                .with_writer(make_writer(file.as_ref()))
                .with_target(false)
                .without_time()
                .try_init()
                .ok();
        }
    }
}
