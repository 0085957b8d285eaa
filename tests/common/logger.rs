//! Structured test output for integration tests.
//!
//! A `TestLogger` prints timestamped, phase-tagged lines to stderr (shown by
//! `cargo test -- --nocapture`) and appends them to `TEST_LOG_FILE` when set.
//!
//! # Usage
//!
//! ```rust,ignore
//! let log = TestLogger::new("negotiator_falls_back");
//! log.phase("setup");
//! log.phase("execute");
//! log.attempts(&status);
//! log.finish_ok();
//! ```
//!
//! # Environment Variables
//!
//! - `TEST_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! - `TEST_LOG_FILE` - also append lines to this file

#![allow(dead_code)]

use std::env;
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

use chrono::Utc;

use insight::core::ConnectionStatus;

use super::log_capture::TestLogCapture;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" | "err" => Some(Self::Error),
            _ => None,
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

struct Sink {
    min_level: LogLevel,
    file: Mutex<Option<File>>,
}

fn sink() -> &'static Sink {
    static SINK: OnceLock<Sink> = OnceLock::new();
    SINK.get_or_init(|| Sink {
        min_level: env::var("TEST_LOG_LEVEL")
            .ok()
            .and_then(|s| LogLevel::parse(&s))
            .unwrap_or(LogLevel::Info),
        file: Mutex::new(env::var("TEST_LOG_FILE").ok().and_then(|path| {
            OpenOptions::new().create(true).append(true).open(path).ok()
        })),
    })
}

/// Per-test logger with phase and duration tracking.
pub struct TestLogger {
    test_name: String,
    start_time: Instant,
    current_phase: Mutex<String>,
}

impl TestLogger {
    #[must_use]
    pub fn new(test_name: &str) -> Self {
        let logger = Self {
            test_name: test_name.to_string(),
            start_time: Instant::now(),
            current_phase: Mutex::new("init".to_string()),
        };
        logger.log(LogLevel::Info, "Test starting");
        logger
    }

    /// Logger plus a tracing capture scoped to the current thread.
    pub fn with_capture(test_name: &str) -> (Self, TestLogCapture) {
        let capture = TestLogCapture::start();
        (Self::new(test_name), capture)
    }

    /// Common phases: "setup", "execute", "verify".
    pub fn phase(&self, phase: &str) {
        if let Ok(mut current) = self.current_phase.lock() {
            *current = phase.to_string();
        }
        self.log(LogLevel::Debug, &format!("Phase: {phase}"));
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// One line per negotiation attempt.
    pub fn attempts(&self, status: &ConnectionStatus) {
        for attempt in &status.attempts {
            self.debug(&format!(
                "attempt {} success={} {}ms {}",
                attempt.strategy_id,
                attempt.success,
                attempt.duration_ms,
                attempt.error.as_deref().unwrap_or("")
            ));
        }
        self.info(&format!(
            "connected={} message={:?}",
            status.connected, status.message
        ));
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn finish_ok(&self) {
        let duration_ms = self.start_time.elapsed().as_millis() as u64;
        self.log(LogLevel::Info, &format!("Test passed (duration: {duration_ms}ms)"));
    }

    fn log(&self, level: LogLevel, message: &str) {
        let sink = sink();
        if level < sink.min_level {
            return;
        }
        let phase = self
            .current_phase
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();
        let line = format!(
            "[{}] [{level}] [{}:{phase}] {message}",
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.test_name
        );
        eprintln!("{line}");
        if let Ok(mut guard) = sink.file.lock()
            && let Some(file) = guard.as_mut()
        {
            let _ = writeln!(file, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parsing_and_order() {
        assert_eq!(LogLevel::parse("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::parse("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("nope"), None);
        assert!(LogLevel::Trace < LogLevel::Error);
    }
}
