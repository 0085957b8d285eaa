//! Authentication negotiator.
//!
//! Turns a server URL plus one credential set into a `ConnectionStatus` by
//! walking the `AuthPlan` in order. Strategies run strictly sequentially;
//! the first success wins and no later strategy is started.

use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use tokio_util::sync::CancellationToken;

use super::auth_plan::{AuthPlan, ProbeShape, STATUS_PATH, Strategy, StrategyAttempt, StrategyKind};
use super::http::{
    DEFAULT_TIMEOUT, DIRECT_PROBE_TIMEOUT, body_has_error_marker, build_client, endpoint_url,
    extract_version, map_transport_error, normalize_server_url, redact_url,
};
use super::models::{ConnectionStatus, Credentials, UNKNOWN_VERSION};
use crate::error::{InsightError, Result};

/// Message for a successful client-style strategy.
pub const MSG_CONNECTED: &str = "Connection successful";
/// Message for a successful direct probe.
pub const MSG_CONNECTED_DIRECT: &str = "Connected via direct API";
/// Message returned when the caller cancels.
pub const MSG_CANCELLED: &str = "Connection attempt cancelled";

/// Longest slice of an error body quoted back in messages.
const ERROR_SNIPPET_LEN: usize = 200;

/// What a successful strategy produced.
#[derive(Debug, Clone)]
struct StrategySuccess {
    version: String,
    message: &'static str,
}

/// Negotiates a session against the monitoring server.
#[derive(Debug, Clone)]
pub struct AuthNegotiator {
    timeout: Duration,
    insecure_tls: bool,
    probe_tls: bool,
}

impl Default for AuthNegotiator {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, true)
    }
}

impl AuthNegotiator {
    #[must_use]
    pub const fn new(timeout: Duration, insecure_tls: bool) -> Self {
        Self {
            timeout,
            insecure_tls,
            probe_tls: true,
        }
    }

    /// Enable or disable the strict-validation probe that sets `ssl_warning`
    /// after an insecure https success.
    #[must_use]
    pub const fn with_tls_probe(mut self, enabled: bool) -> Self {
        self.probe_tls = enabled;
        self
    }

    #[must_use]
    pub const fn insecure_tls(&self) -> bool {
        self.insecure_tls
    }

    /// Try every strategy for `credentials` until one is accepted.
    ///
    /// Never returns an error: exhaustion, invalid input and cancellation are
    /// all reported through a non-connected status with a specific message.
    pub async fn negotiate(
        &self,
        server_url: &str,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> ConnectionStatus {
        let server_url = normalize_server_url(server_url);
        if server_url.is_empty() {
            return ConnectionStatus::failed("Server URL cannot be empty");
        }

        let credentials = credentials.sanitized();
        if let Err(e) = validate_credentials(&credentials) {
            tracing::warn!(error = %e, "Rejecting credentials before negotiation");
            return ConnectionStatus::failed(capitalize(&e.to_string()));
        }

        let client = match build_client(self.timeout, self.insecure_tls) {
            Ok(client) => client,
            Err(e) => return ConnectionStatus::failed(format!("Could not create HTTP client: {e}")),
        };

        tracing::info!(
            server = %server_url,
            mode = credentials.mode().label(),
            insecure_tls = self.insecure_tls,
            "Negotiating connection"
        );

        let plan = AuthPlan::for_credentials(&credentials);
        let mut attempts: Vec<StrategyAttempt> = Vec::with_capacity(plan.strategies.len());
        let mut last_error: Option<InsightError> = None;
        let mut tls_trouble = false;

        for strategy in &plan.strategies {
            if cancel.is_cancelled() {
                return cancelled(attempts, tls_trouble);
            }

            tracing::info!(strategy = %strategy.id, "Trying authentication strategy");

            let started_at = Utc::now();
            let start = Instant::now();
            let result = self
                .execute_strategy(&client, &server_url, strategy, cancel)
                .await;
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            attempts.push(StrategyAttempt {
                strategy_id: strategy.id,
                started_at,
                duration_ms,
                success: result.is_ok(),
                error: result.as_ref().err().map(ToString::to_string),
            });

            match result {
                Ok(success) => {
                    tracing::info!(
                        strategy = %strategy.id,
                        version = %success.version,
                        duration_ms,
                        "Authentication succeeded"
                    );
                    let ssl_warning =
                        tls_trouble || self.probe_certificate(&server_url, cancel).await;
                    return ConnectionStatus {
                        connected: true,
                        version: success.version,
                        message: success.message.to_string(),
                        ssl_warning,
                        strategy: Some(strategy.id),
                        attempts,
                    };
                }
                Err(InsightError::Cancelled) => return cancelled(attempts, tls_trouble),
                Err(e) => {
                    tracing::warn!(strategy = %strategy.id, error = %e, "Authentication strategy failed");
                    tls_trouble |= e.is_tls_related();
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.map_or_else(
            || "no strategy was attempted".to_string(),
            |e| e.to_string(),
        );
        tracing::warn!(server = %server_url, error = %last_error, "All authentication strategies failed");

        ConnectionStatus {
            ssl_warning: tls_trouble,
            attempts,
            ..ConnectionStatus::failed(capitalize(
                &InsightError::NegotiationFailed { last_error }.to_string(),
            ))
        }
    }

    async fn execute_strategy(
        &self,
        client: &Client,
        server_url: &str,
        strategy: &Strategy,
        cancel: &CancellationToken,
    ) -> Result<StrategySuccess> {
        match &strategy.kind {
            StrategyKind::StatusCall {
                username,
                secret,
                encoding,
            } => {
                let url = endpoint_url(
                    server_url,
                    STATUS_PATH,
                    &[
                        ("id", "0"),
                        ("username", username.as_str()),
                        (encoding.param(), secret.as_str()),
                    ],
                )?;
                let body = self.get_accepted(client, url, self.timeout, cancel).await?;
                Ok(StrategySuccess {
                    version: extract_version(&body).unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
                    message: MSG_CONNECTED,
                })
            }
            StrategyKind::DirectProbe { shapes } => {
                self.direct_probe(client, server_url, shapes, cancel).await
            }
        }
    }

    async fn direct_probe(
        &self,
        client: &Client,
        server_url: &str,
        shapes: &[ProbeShape],
        cancel: &CancellationToken,
    ) -> Result<StrategySuccess> {
        let mut last_error = None;

        for shape in shapes {
            if cancel.is_cancelled() {
                return Err(InsightError::Cancelled);
            }
            let url = endpoint_url(server_url, shape.path, &shape.pairs())?;
            match self
                .get_accepted(client, url, DIRECT_PROBE_TIMEOUT, cancel)
                .await
            {
                Ok(body) => {
                    return Ok(StrategySuccess {
                        version: extract_version(&body)
                            .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
                        message: MSG_CONNECTED_DIRECT,
                    });
                }
                Err(InsightError::Cancelled) => return Err(InsightError::Cancelled),
                Err(e) => {
                    tracing::debug!(path = shape.path, error = %e, "Direct probe shape failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| InsightError::Network("no direct endpoints".into())))
    }

    /// GET `url` and return the body if the server accepted the request.
    async fn get_accepted(
        &self,
        client: &Client,
        url: Url,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let safe_url = redact_url(&url);
        tracing::debug!(url = %safe_url, "GET");

        let request = async {
            let response = client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| map_transport_error(&e, timeout))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| map_transport_error(&e, timeout))?;
            Ok::<_, InsightError>((status, body))
        };

        let (status, body) = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(InsightError::Cancelled),
            result = request => result?,
        };

        tracing::debug!(url = %safe_url, status = status.as_u16(), bytes = body.len(), "Response");
        check_response(status, &body, &safe_url)?;
        Ok(body)
    }

    /// Whether a strict client rejects the server certificate.
    async fn probe_certificate(&self, server_url: &str, cancel: &CancellationToken) -> bool {
        if !self.probe_tls
            || !self.insecure_tls
            || !server_url.to_ascii_lowercase().starts_with("https://")
        {
            return false;
        }

        let Ok(strict) = build_client(self.timeout, false) else {
            return false;
        };

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return false,
            outcome = strict.get(server_url).send() => outcome,
        };

        match outcome {
            Ok(_) => false,
            Err(e) => {
                let mapped = map_transport_error(&e, self.timeout);
                let warn = mapped.is_tls_related();
                if warn {
                    tracing::warn!(server = %server_url, error = %mapped, "Server certificate failed validation");
                }
                warn
            }
        }
    }
}

fn check_response(status: StatusCode, body: &str, url: &str) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(InsightError::AuthRejected {
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        return Err(InsightError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    if body_has_error_marker(body) {
        return Err(InsightError::ServerError {
            message: snippet(body),
        });
    }
    Ok(())
}

fn validate_credentials(credentials: &Credentials) -> Result<()> {
    match credentials {
        Credentials::ApiToken { token } if token.is_empty() => {
            Err(InsightError::MissingCredential { field: "API key" })
        }
        Credentials::Password { username, .. } if username.is_empty() => {
            Err(InsightError::MissingCredential { field: "username" })
        }
        _ => Ok(()),
    }
}

fn cancelled(attempts: Vec<StrategyAttempt>, ssl_warning: bool) -> ConnectionStatus {
    tracing::info!("Negotiation cancelled");
    ConnectionStatus {
        ssl_warning,
        attempts,
        ..ConnectionStatus::failed(MSG_CANCELLED)
    }
}

fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_SNIPPET_LEN) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}
