//! Authentication strategies and their precedence.
//!
//! The monitoring server's status endpoint accepts several incompatible
//! credential encodings. An `AuthPlan` is the ordered list of encodings to
//! try for one credential set; the negotiator consumes it front to back and
//! stops at the first success.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::Credentials;

/// Reserved username under which API tokens are presented as a passhash.
pub const API_TOKEN_USERNAME: &str = "apitoken";

/// Default administrator account probed by the direct token shapes.
pub const DEFAULT_ADMIN_USERNAME: &str = "prtgadmin";

/// Status endpoint used by the client-style strategies.
pub const STATUS_PATH: &str = "/api/getstatus.htm";

// =============================================================================
// Strategy Id
// =============================================================================

/// Stable identity of each strategy, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyId {
    /// Token as passhash under the `apitoken` username.
    TokenPasshash,
    /// Token as username with an empty password.
    TokenAsUsername,
    /// Username with plaintext password.
    Password,
    /// Username with password presented as a passhash.
    Passhash,
    /// Raw GETs against alternate endpoint/query shapes.
    DirectProbe,
}

impl StrategyId {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TokenPasshash => "token-passhash",
            Self::TokenAsUsername => "token-as-username",
            Self::Password => "password",
            Self::Passhash => "passhash",
            Self::DirectProbe => "direct-probe",
        }
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Strategy
// =============================================================================

/// How the secret is presented to the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEncoding {
    Password,
    Passhash,
}

impl AuthEncoding {
    /// Query parameter carrying the secret.
    #[must_use]
    pub const fn param(self) -> &'static str {
        match self {
            Self::Password => "password",
            Self::Passhash => "passhash",
        }
    }
}

/// One raw endpoint shape for the direct probe.
#[derive(Clone, PartialEq, Eq)]
pub struct ProbeShape {
    pub path: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl ProbeShape {
    fn new(path: &'static str, params: &[(&'static str, &str)]) -> Self {
        Self {
            path,
            params: params.iter().map(|(k, v)| (*k, (*v).to_string())).collect(),
        }
    }

    /// Parameters as borrowed pairs for URL building.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.params.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }
}

// Params hold secrets.
impl std::fmt::Debug for ProbeShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<_> = self.params.iter().map(|(k, _)| *k).collect();
        f.debug_struct("ProbeShape")
            .field("path", &self.path)
            .field("params", &keys)
            .finish()
    }
}

/// What a strategy does on the wire.
#[derive(Clone)]
pub enum StrategyKind {
    /// One authenticated call to the status endpoint.
    StatusCall {
        username: String,
        secret: String,
        encoding: AuthEncoding,
    },
    /// Several raw GETs tried in order; first acceptable response wins.
    DirectProbe { shapes: Vec<ProbeShape> },
}

impl std::fmt::Debug for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StatusCall { encoding, .. } => f
                .debug_struct("StatusCall")
                .field("encoding", encoding)
                .finish_non_exhaustive(),
            Self::DirectProbe { shapes } => {
                f.debug_struct("DirectProbe").field("shapes", shapes).finish()
            }
        }
    }
}

/// A single entry of an `AuthPlan`.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub id: StrategyId,
    pub kind: StrategyKind,
}

impl Strategy {
    fn status_call(id: StrategyId, username: &str, secret: &str, encoding: AuthEncoding) -> Self {
        Self {
            id,
            kind: StrategyKind::StatusCall {
                username: username.to_string(),
                secret: secret.to_string(),
                encoding,
            },
        }
    }
}

// =============================================================================
// Strategy Attempt
// =============================================================================

/// Record of a single strategy attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyAttempt {
    pub strategy_id: StrategyId,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Auth Plan
// =============================================================================

/// Ordered list of strategies for one credential set.
#[derive(Debug, Clone)]
pub struct AuthPlan {
    pub strategies: Vec<Strategy>,
}

impl AuthPlan {
    /// Build the fixed-precedence plan for the given credentials.
    #[must_use]
    pub fn for_credentials(credentials: &Credentials) -> Self {
        let strategies = match credentials {
            Credentials::ApiToken { token } => vec![
                Strategy::status_call(
                    StrategyId::TokenPasshash,
                    API_TOKEN_USERNAME,
                    token,
                    AuthEncoding::Passhash,
                ),
                Strategy::status_call(
                    StrategyId::TokenAsUsername,
                    token,
                    "",
                    AuthEncoding::Password,
                ),
                Strategy {
                    id: StrategyId::DirectProbe,
                    kind: StrategyKind::DirectProbe {
                        shapes: token_probe_shapes(token),
                    },
                },
            ],
            Credentials::Password { username, password } => vec![
                Strategy::status_call(
                    StrategyId::Password,
                    username,
                    password,
                    AuthEncoding::Password,
                ),
                Strategy::status_call(
                    StrategyId::Passhash,
                    username,
                    password,
                    AuthEncoding::Passhash,
                ),
                Strategy {
                    id: StrategyId::DirectProbe,
                    kind: StrategyKind::DirectProbe {
                        shapes: password_probe_shapes(username, password),
                    },
                },
            ],
        };
        Self { strategies }
    }

    /// Strategy ids in the order they will be attempted.
    #[must_use]
    pub fn ids(&self) -> Vec<StrategyId> {
        self.strategies.iter().map(|s| s.id).collect()
    }
}

fn token_probe_shapes(token: &str) -> Vec<ProbeShape> {
    vec![
        ProbeShape::new(
            "/api/getstatus.xml",
            &[("username", API_TOKEN_USERNAME), ("passhash", token)],
        ),
        ProbeShape::new(
            "/api/table.json",
            &[
                ("content", "status"),
                ("output", "json"),
                ("username", API_TOKEN_USERNAME),
                ("passhash", token),
            ],
        ),
        ProbeShape::new(
            "/api/table.json",
            &[
                ("content", "status"),
                ("username", DEFAULT_ADMIN_USERNAME),
                ("passhash", token),
            ],
        ),
        ProbeShape::new("/api/table.json", &[("apitoken", token)]),
    ]
}

fn password_probe_shapes(username: &str, password: &str) -> Vec<ProbeShape> {
    vec![
        ProbeShape::new(
            "/api/table.json",
            &[
                ("content", "status"),
                ("output", "json"),
                ("username", username),
                ("password", password),
            ],
        ),
        ProbeShape::new(
            "/api/table.json",
            &[
                ("content", "status"),
                ("output", "json"),
                ("username", username),
                ("passhash", password),
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_plan_order() {
        let plan = AuthPlan::for_credentials(&Credentials::api_token("tok"));
        assert_eq!(
            plan.ids(),
            vec![
                StrategyId::TokenPasshash,
                StrategyId::TokenAsUsername,
                StrategyId::DirectProbe
            ]
        );
    }

    #[test]
    fn password_plan_order() {
        let plan = AuthPlan::for_credentials(&Credentials::password("u", "p"));
        assert_eq!(
            plan.ids(),
            vec![
                StrategyId::Password,
                StrategyId::Passhash,
                StrategyId::DirectProbe
            ]
        );
    }

    #[test]
    fn token_strategies_use_reserved_username_then_token_as_username() {
        let plan = AuthPlan::for_credentials(&Credentials::api_token("tok"));
        match &plan.strategies[0].kind {
            StrategyKind::StatusCall {
                username,
                secret,
                encoding,
            } => {
                assert_eq!(username, API_TOKEN_USERNAME);
                assert_eq!(secret, "tok");
                assert_eq!(*encoding, AuthEncoding::Passhash);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        match &plan.strategies[1].kind {
            StrategyKind::StatusCall {
                username, secret, ..
            } => {
                assert_eq!(username, "tok");
                assert!(secret.is_empty());
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn direct_probe_covers_required_shapes() {
        let plan = AuthPlan::for_credentials(&Credentials::api_token("tok"));
        let StrategyKind::DirectProbe { shapes } = &plan.strategies[2].kind else {
            panic!("last strategy should be the direct probe");
        };
        assert_eq!(shapes.len(), 4);
        assert!(shapes.iter().any(|s| s.params.iter().any(|(k, _)| *k == "apitoken")));
        assert!(shapes.iter().any(|s| s.params.iter().any(|(k, _)| *k == "passhash")));

        let plan = AuthPlan::for_credentials(&Credentials::password("u", "p"));
        let StrategyKind::DirectProbe { shapes } = &plan.strategies[2].kind else {
            panic!("last strategy should be the direct probe");
        };
        assert!(shapes.iter().any(|s| s.params.iter().any(|(k, _)| *k == "password")));
        assert!(shapes.iter().any(|s| s.params.iter().any(|(k, _)| *k == "passhash")));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let plan = AuthPlan::for_credentials(&Credentials::password("u", "topsecret"));
        assert!(!format!("{plan:?}").contains("topsecret"));
    }
}
