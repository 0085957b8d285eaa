//! Error types for insight.
//!
//! Uses `thiserror` for structured error types that map to exit codes.
//!
//! ## Error Taxonomy
//!
//! - **Authentication**: a strategy reached the server but was rejected
//! - **Network**: connection, timeout, DNS, or TLS issues
//! - **Configuration**: config file parsing or invalid values
//! - **Storage**: cache and settings file failures
//! - **Internal**: unexpected errors
//!
//! Each error has a stable error code (e.g., `INSIGHT-A001`) for programmatic handling.

use thiserror::Error;

// =============================================================================
// Error Categories
// =============================================================================

/// High-level error categories for classification and routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Credentials rejected by the server.
    Authentication,
    /// Network issues (timeout, DNS, TLS, connection refused).
    Network,
    /// Configuration issues (parse errors, invalid values).
    Configuration,
    /// Cache or settings storage issues.
    Storage,
    /// Internal errors (bugs, unexpected state).
    Internal,
}

impl ErrorCategory {
    /// Returns a human-readable description of the category.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Authentication => "Authentication error",
            Self::Network => "Network error",
            Self::Configuration => "Configuration error",
            Self::Storage => "Storage error",
            Self::Internal => "Internal error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// Unexpected failure
    GeneralError = 1,
    /// Could not authenticate against the server
    AuthFailed = 2,
    /// Invalid configuration or arguments
    ConfigError = 3,
    /// Timeout
    Timeout = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as Self
    }
}

/// Main error type for insight operations.
#[derive(Error, Debug)]
pub enum InsightError {
    // ==========================================================================
    // Authentication errors
    // ==========================================================================
    /// The server answered but rejected the credentials.
    #[error("authentication rejected (HTTP {status})")]
    AuthRejected { status: u16 },

    /// The server answered 2xx but the body carried an error marker.
    #[error("server reported an error: {message}")]
    ServerError { message: String },

    /// Required credential field is empty.
    #[error("{field} cannot be empty")]
    MissingCredential { field: &'static str },

    /// Every negotiation strategy failed.
    #[error("all authentication methods failed: {last_error}")]
    NegotiationFailed { last_error: String },

    /// A connect attempt ended without a session; carries the status message.
    #[error("{message}")]
    ConnectFailed { message: String },

    /// No profile is stored; the caller must connect first.
    #[error("not connected to a monitoring server")]
    NotConnected,

    // ==========================================================================
    // Network errors
    // ==========================================================================
    /// Request timed out.
    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    /// SSL/TLS handshake or certificate error.
    #[error("SSL/TLS error: {message}")]
    SslError { message: String },

    /// Unexpected HTTP status (not an auth rejection).
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Generic network error.
    #[error("network error: {0}")]
    Network(String),

    /// Server URL could not be parsed.
    #[error("invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Operation cancelled by the caller's token.
    #[error("operation cancelled")]
    Cancelled,

    // ==========================================================================
    // Configuration errors
    // ==========================================================================
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    // ==========================================================================
    // Parse errors
    // ==========================================================================
    /// Failed to parse server response.
    #[error("failed to parse response: {0}")]
    ParseResponse(String),

    // ==========================================================================
    // Storage / internal
    // ==========================================================================
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InsightError {
    /// Map error to CLI exit code.
    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self {
            Self::AuthRejected { .. }
            | Self::ServerError { .. }
            | Self::MissingCredential { .. }
            | Self::NegotiationFailed { .. }
            | Self::ConnectFailed { .. }
            | Self::NotConnected => ExitCode::AuthFailed,

            Self::Config(_) | Self::InvalidUrl { .. } => ExitCode::ConfigError,

            Self::Timeout(_) => ExitCode::Timeout,

            Self::SslError { .. }
            | Self::HttpStatus { .. }
            | Self::Network(_)
            | Self::Cancelled
            | Self::ParseResponse(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => ExitCode::GeneralError,
        }
    }

    /// Returns the error category for classification and routing.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthRejected { .. }
            | Self::ServerError { .. }
            | Self::MissingCredential { .. }
            | Self::NegotiationFailed { .. }
            | Self::ConnectFailed { .. }
            | Self::NotConnected => ErrorCategory::Authentication,

            Self::Timeout(_)
            | Self::SslError { .. }
            | Self::HttpStatus { .. }
            | Self::Network(_)
            | Self::InvalidUrl { .. }
            | Self::Cancelled => ErrorCategory::Network,

            Self::Config(_) => ErrorCategory::Configuration,

            Self::Io(_) | Self::Json(_) => ErrorCategory::Storage,

            Self::ParseResponse(_) | Self::Other(_) => ErrorCategory::Internal,
        }
    }

    /// Returns a stable error code for programmatic handling.
    ///
    /// Format: `INSIGHT-{category}{number}`.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AuthRejected { .. } => "INSIGHT-A001",
            Self::ServerError { .. } => "INSIGHT-A002",
            Self::MissingCredential { .. } => "INSIGHT-A003",
            Self::NegotiationFailed { .. } => "INSIGHT-A004",
            Self::NotConnected => "INSIGHT-A005",
            Self::ConnectFailed { .. } => "INSIGHT-A006",

            Self::Timeout(_) => "INSIGHT-N001",
            Self::SslError { .. } => "INSIGHT-N002",
            Self::HttpStatus { .. } => "INSIGHT-N003",
            Self::InvalidUrl { .. } => "INSIGHT-N004",
            Self::Cancelled => "INSIGHT-N005",
            Self::Network(_) => "INSIGHT-N099",

            Self::Config(_) => "INSIGHT-C001",

            Self::Io(_) => "INSIGHT-S001",
            Self::Json(_) => "INSIGHT-S002",

            Self::ParseResponse(_) => "INSIGHT-X001",
            Self::Other(_) => "INSIGHT-X099",
        }
    }

    /// Whether the error is potentially recoverable by retrying.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_) | Self::HttpStatus { .. })
    }

    /// Whether the error originates in TLS negotiation or certificate checks.
    #[must_use]
    pub const fn is_tls_related(&self) -> bool {
        matches!(self, Self::SslError { .. })
    }

    /// A short, actionable hint for the CLI.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        match self {
            Self::AuthRejected { .. }
            | Self::NegotiationFailed { .. }
            | Self::ConnectFailed { .. } => {
                Some("Verify the API token or username/password and the server URL.")
            }
            Self::NotConnected => Some("Run `insight connect <url>` first."),
            Self::SslError { .. } => {
                Some("The server certificate is not trusted; connections still use insecure TLS.")
            }
            Self::Timeout(_) => Some("Increase `timeout_seconds` or set INSIGHT_TIMEOUT."),
            Self::Config(_) => Some("Check config.toml (see INSIGHT_CONFIG)."),
            _ => None,
        }
    }
}

/// Result type alias for insight operations.
pub type Result<T> = std::result::Result<T, InsightError>;
