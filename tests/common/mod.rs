//! Common helpers for integration tests.
//!
//! - `fixtures`: wiremock responders for the monitoring API
//! - `log_capture`: tracing capture for log assertions
//! - `logger`: structured test output

pub mod fixtures;
pub mod log_capture;
pub mod logger;
