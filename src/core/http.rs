//! HTTP client utilities.
//!
//! Builds the client used against the monitoring server and holds the small
//! amount of URL and response handling shared by the negotiator and the
//! status fetcher.

use std::error::Error;
use std::io::ErrorKind;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Url};

use crate::error::{InsightError, Result};

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request budget for raw direct-probe requests.
pub const DIRECT_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Query parameters whose values never reach the logs.
const SECRET_PARAMS: &[&str] = &["passhash", "password", "apitoken"];

/// Fragments TLS stacks put in their error text.
const TLS_MARKERS: &[&str] = &["certificate", "handshake", "tls", "ssl", "corrupt message"];

/// Build a configured HTTP client.
///
/// `insecure_tls` disables certificate and hostname validation for this
/// client only; nothing process-wide is touched.
///
/// # Errors
///
/// Returns error if client construction fails.
pub fn build_client(timeout: Duration, insecure_tls: bool) -> Result<Client> {
    ClientBuilder::new()
        .timeout(timeout)
        .user_agent(format!("insight/{}", env!("CARGO_PKG_VERSION")))
        .danger_accept_invalid_certs(insecure_tls)
        .build()
        .map_err(|e| InsightError::Network(error_chain(&e)))
}

/// Normalize a user-entered server URL.
///
/// Trims whitespace, prefixes `https://` when no http(s) scheme is present,
/// and strips trailing slashes. Returns an empty string for blank input.
#[must_use]
pub fn normalize_server_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let lower = trimmed.to_ascii_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    with_scheme.trim_end_matches('/').to_string()
}

/// Build `{base}{path}?{params}` with every value percent-encoded.
///
/// # Errors
///
/// Returns `InvalidUrl` when the base cannot be parsed.
pub fn endpoint_url(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(&format!("{base}{path}")).map_err(|e| InsightError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// Render a URL for logging with credential values replaced.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut safe = url.clone();
    // An empty password means the username slot carries a token.
    let username_is_secret = url
        .query_pairs()
        .any(|(k, v)| k == "password" && v.is_empty());
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let hidden = SECRET_PARAMS.contains(&k.as_ref())
                || (username_is_secret && k == "username");
            let value = if hidden {
                "[HIDDEN]".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), value)
        })
        .collect();
    if pairs.is_empty() {
        return safe.to_string();
    }
    safe.query_pairs_mut().clear().extend_pairs(pairs);
    safe.to_string()
}

/// Whether a response body carries the server's explicit error marker.
#[must_use]
pub fn body_has_error_marker(body: &str) -> bool {
    body.contains("<error>") || body.contains("\"error\"")
}

/// Pull a version string out of a JSON or XML status body.
#[must_use]
pub fn extract_version(body: &str) -> Option<String> {
    if let Ok(status) = serde_json::from_str::<crate::core::models::ServerStatus>(body)
        && let Some(version) = status.version.filter(|v| !v.trim().is_empty())
    {
        return Some(version.trim().to_string());
    }

    ["Version", "version", "prtg-version"]
        .iter()
        .find_map(|tag| xml_element(body, tag))
}

fn xml_element(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    let value = body[start..end].trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Classify a transport failure.
#[must_use]
pub fn map_transport_error(e: &reqwest::Error, timeout: Duration) -> InsightError {
    if e.is_timeout() {
        return InsightError::Timeout(timeout.as_secs());
    }
    let chain = error_chain(e);
    if is_tls_failure(e) {
        InsightError::SslError { message: chain }
    } else {
        InsightError::Network(chain)
    }
}

/// Whether the TLS layer produced this failure.
///
/// Only the sources are inspected. The top-level reqwest message quotes the
/// request URL, and host names or paths may contain anything. TLS stacks
/// surface as `InvalidData` I/O errors or with a recognizable message.
#[must_use]
pub fn is_tls_failure(e: &(dyn Error + 'static)) -> bool {
    let mut source = e.source();
    while let Some(inner) = source {
        if inner
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == ErrorKind::InvalidData)
        {
            return true;
        }
        let text = inner.to_string().to_lowercase();
        if TLS_MARKERS.iter().any(|marker| text.contains(marker)) {
            return true;
        }
        source = inner.source();
    }
    false
}

/// Join an error and all of its sources; reqwest's top-level text alone is
/// rarely specific enough to show a user.
///
/// reqwest quotes the request URL in its message, so the URL is redacted
/// before anything else is appended.
#[must_use]
pub fn error_chain(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    if let Some(url) = e.url() {
        message = message.replace(url.as_str(), &redact_url(url));
    }
    let mut source = e.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
