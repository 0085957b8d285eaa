//! Mock monitoring server helpers.
//!
//! Mounts wiremock responders for the status endpoint, matched on the exact
//! credential query the negotiator sends.

#![allow(dead_code)]

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub use insight::test_utils::{TEST_PASSWORD, TEST_TOKEN, TEST_USERNAME, make_status_json};

pub const STATUS_PATH: &str = "/api/getstatus.htm";
pub const VERSION: &str = "24.1.92.1554";

/// `/api/getstatus.htm` answering `code` for the given username/secret pair.
pub async fn mount_status(
    server: &MockServer,
    username: &str,
    secret_param: &str,
    secret: &str,
    code: u16,
) {
    let response = if code == 200 {
        ResponseTemplate::new(200).set_body_string(make_status_json(VERSION))
    } else {
        ResponseTemplate::new(code).set_body_string("<error>Unauthorized</error>")
    };

    Mock::given(method("GET"))
        .and(path(STATUS_PATH))
        .and(query_param("id", "0"))
        .and(query_param("username", username))
        .and(query_param(secret_param, secret))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Every request not matched by a more specific mock gets `401`.
pub async fn mount_reject_everything(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .with_priority(u8::MAX)
        .mount(server)
        .await;
}

/// Requests the mock server received, as `path?query` strings.
pub async fn received_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| match r.url.query() {
            Some(q) => format!("{}?{q}", r.url.path()),
            None => r.url.path().to_string(),
        })
        .collect()
}
