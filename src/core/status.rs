//! Server status fetching for an accepted profile.
//!
//! This is the data-fetch the refresh scheduler drives once a session has
//! been negotiated.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use super::auth_plan::STATUS_PATH;
use super::http::{
    body_has_error_marker, build_client, endpoint_url, map_transport_error, redact_url,
};
use super::models::{ConnectionProfile, ServerStatus};
use crate::error::{InsightError, Result};

/// Fetcher for the monitoring server's status endpoint.
pub struct StatusFetcher {
    client: Client,
    timeout: Duration,
}

impl StatusFetcher {
    /// Create a fetcher honoring the profile's TLS policy.
    ///
    /// # Errors
    /// Returns an error if the HTTP client fails to build.
    pub fn new(timeout: Duration, insecure_tls: bool) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout, insecure_tls)?,
            timeout,
        })
    }

    /// Create a fetcher matching a stored profile.
    ///
    /// # Errors
    /// Returns an error if the HTTP client fails to build.
    pub fn for_profile(profile: &ConnectionProfile, timeout: Duration) -> Result<Self> {
        Self::new(timeout, profile.insecure_tls)
    }

    /// Fetch the status document using the profile's stored credentials.
    ///
    /// The credentials are encoded the way the server accepted them at
    /// connect time (see [`ConnectionProfile::status_login`]).
    ///
    /// # Errors
    /// Returns an error on transport failure, rejection, or an unparsable body.
    pub async fn fetch(&self, profile: &ConnectionProfile) -> Result<ServerStatus> {
        let (username, encoding, secret) = profile.status_login();
        let url = endpoint_url(
            &profile.server_url,
            STATUS_PATH,
            &[("id", "0"), ("username", username), (encoding.param(), secret)],
        )?;
        let safe_url = redact_url(&url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_transport_error(&e, self.timeout))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(InsightError::AuthRejected {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(InsightError::HttpStatus {
                status: status.as_u16(),
                url: safe_url,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(&e, self.timeout))?;
        if body_has_error_marker(&body) {
            return Err(InsightError::ServerError {
                message: body.trim().chars().take(200).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|e| InsightError::ParseResponse(e.to_string()))
    }
}
