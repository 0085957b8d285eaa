//! insight - connection and resilience layer for a network monitoring viewer
//!
//! Negotiates sessions against a monitoring server's HTTP API, remembers the
//! accepted connection, caches fetched data across restarts, and refreshes it
//! on a schedule.

#![forbid(unsafe_code)]
#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod core;
pub mod error;
pub mod storage;

/// Test utilities module - included in test builds or when test-utils feature is enabled.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{ExitCode, InsightError, Result};

// Re-export test utilities for external test crates
#[cfg(any(test, feature = "test-utils"))]
pub use test_utils::*;
