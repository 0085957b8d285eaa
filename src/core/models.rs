//! Core data models for the connection layer.
//!
//! A `ConnectionProfile` is what gets persisted; `ConnectionStatus` is the
//! transient negotiation result; `ServerStatus` is the optional-field schema
//! of the server's status endpoint.

use serde::{Deserialize, Serialize};

use super::auth_plan::{API_TOKEN_USERNAME, AuthEncoding, StrategyAttempt, StrategyId};

/// Version reported when the server answered but no version could be read.
pub const UNKNOWN_VERSION: &str = "unknown";

// =============================================================================
// Credentials
// =============================================================================

/// Which credential form a profile uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialMode {
    Password,
    ApiToken,
}

impl CredentialMode {
    /// Label used in logs and CLI output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::ApiToken => "api-token",
        }
    }
}

/// One credential set accepted by the monitoring server.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum Credentials {
    Password { username: String, password: String },
    ApiToken { token: String },
}

impl Credentials {
    /// Build username/password credentials.
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Build API-token credentials.
    #[must_use]
    pub fn api_token(token: impl Into<String>) -> Self {
        Self::ApiToken {
            token: token.into(),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> CredentialMode {
        match self {
            Self::Password { .. } => CredentialMode::Password,
            Self::ApiToken { .. } => CredentialMode::ApiToken,
        }
    }

    /// Username to remember in login history (tokens have none).
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Password { username, .. } => Some(username),
            Self::ApiToken { .. } => None,
        }
    }

    /// Trim whitespace from tokens and usernames.
    ///
    /// Passwords are kept verbatim since surrounding spaces may be significant.
    #[must_use]
    pub fn sanitized(&self) -> Self {
        match self {
            Self::Password { username, password } => Self::Password {
                username: username.trim().to_string(),
                password: password.clone(),
            },
            Self::ApiToken { token } => Self::ApiToken {
                token: token.trim().to_string(),
            },
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::ApiToken { token } => f
                .debug_struct("ApiToken")
                .field("token", &format_args!("[REDACTED; {} chars]", token.len()))
                .finish(),
        }
    }
}

// =============================================================================
// Connection Profile
// =============================================================================

const fn default_insecure_tls() -> bool {
    true
}

/// The accepted connection: where, how, and what version answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProfile {
    pub server_url: String,
    pub credentials: Credentials,
    #[serde(default = "default_insecure_tls")]
    pub insecure_tls: bool,
    #[serde(default)]
    pub server_version: String,
    /// Strategy the server accepted; profiles written before this was
    /// recorded read back as `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<StrategyId>,
}

impl ConnectionProfile {
    /// Create a profile with insecure TLS enabled and no known version.
    #[must_use]
    pub fn new(server_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            server_url: server_url.into(),
            credentials,
            insecure_tls: true,
            server_version: String::new(),
            accepted_by: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }

    #[must_use]
    pub const fn with_accepted_by(mut self, strategy: Option<StrategyId>) -> Self {
        self.accepted_by = strategy;
        self
    }

    /// `(username, encoding, secret)` to present to the status endpoint.
    ///
    /// Mirrors the strategy that was accepted at connect time. Anything else,
    /// including the direct probe and unrecorded strategies, uses the
    /// passhash form.
    #[must_use]
    pub fn status_login(&self) -> (&str, AuthEncoding, &str) {
        match (&self.credentials, self.accepted_by) {
            (Credentials::ApiToken { token }, Some(StrategyId::TokenAsUsername)) => {
                (token.as_str(), AuthEncoding::Password, "")
            }
            (Credentials::ApiToken { token }, _) => {
                (API_TOKEN_USERNAME, AuthEncoding::Passhash, token.as_str())
            }
            (Credentials::Password { username, password }, Some(StrategyId::Password)) => {
                (username.as_str(), AuthEncoding::Password, password.as_str())
            }
            (Credentials::Password { username, password }, _) => {
                (username.as_str(), AuthEncoding::Passhash, password.as_str())
            }
        }
    }

    #[must_use]
    pub const fn credential_mode(&self) -> CredentialMode {
        self.credentials.mode()
    }
}

impl std::fmt::Display for ConnectionProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, version {})",
            self.server_url,
            self.credential_mode().label(),
            if self.server_version.is_empty() {
                UNKNOWN_VERSION
            } else {
                &self.server_version
            }
        )
    }
}

// =============================================================================
// Connection Status
// =============================================================================

/// Result of a negotiation. Never persisted.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub version: String,
    pub message: String,
    pub ssl_warning: bool,
    /// Strategy that produced the connection, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyId>,
    /// Every attempt made, in order.
    pub attempts: Vec<StrategyAttempt>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn connected(version: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            connected: true,
            version: version.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            connected: false,
            message: message.into(),
            ..Self::default()
        }
    }
}

// =============================================================================
// Server Status
// =============================================================================

/// Fields of the status endpoint the layer knows about. All optional: servers
/// differ by version and some omit alarm counters entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(rename = "Version", alias = "version", default)]
    pub version: Option<String>,
    #[serde(rename = "NewAlarms", alias = "newAlarms", default)]
    pub new_alarms: Option<String>,
    #[serde(rename = "Alarms", alias = "alarms", default)]
    pub alarms: Option<String>,
    #[serde(rename = "AckAlarms", alias = "ackAlarms", default)]
    pub ack_alarms: Option<String>,
    #[serde(rename = "WarnSens", alias = "warnSens", default)]
    pub warning_sensors: Option<String>,
    #[serde(rename = "UpSens", alias = "upSens", default)]
    pub up_sensors: Option<String>,
    #[serde(rename = "Clock", alias = "clock", default)]
    pub clock: Option<String>,
}

impl ServerStatus {
    /// Version string or the `unknown` sentinel.
    #[must_use]
    pub fn version_or_unknown(&self) -> String {
        self.version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map_or_else(|| UNKNOWN_VERSION.to_string(), str::to_string)
    }
}
