//! Core types for log events.
//!
//! This module provides:
//! - [`LogLevel`]: Severity levels written into each line
//! - [`LogEvent`]: A single log call, formatted into one line and dropped

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// `DD/MM/YYYY HH:mm:ss`, used for lines, banners, and alert bodies.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Formats a timestamp the way it appears in log lines.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// General information
    Info,
    /// Warning conditions
    Warn,
    /// Debugging information
    Debug,
    /// Error conditions, eligible for alerting
    Error,
}

impl LogLevel {
    /// Returns the label written into the line.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Debug => "DEBUG",
            Self::Error => "ERROR",
        }
    }

    /// Returns true for levels that may trigger a notification.
    #[must_use]
    pub const fn is_alerting(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single log call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Severity level
    pub level: LogLevel,
    /// Application-defined event code, e.g. `APP_001`
    pub code: String,
    /// Emitting module or component
    pub module: String,
    /// Free-form message
    pub text: String,
    /// When the call was made
    pub timestamp: DateTime<Local>,
}

impl LogEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(
        level: LogLevel,
        code: impl Into<String>,
        module: impl Into<String>,
        text: impl Into<String>,
        timestamp: DateTime<Local>,
    ) -> Self {
        Self {
            level,
            code: code.into(),
            module: module.into(),
            text: text.into(),
            timestamp,
        }
    }

    /// Serializes the event into its line form (without the trailing newline).
    ///
    /// `[client] [DD/MM/YYYY HH:mm:ss] [LEVEL] [code] [module]: text`
    #[must_use]
    pub fn format_line(&self, client: &str) -> String {
        format!(
            "[{client}] [{}] [{}] [{}] [{}]: {}",
            format_timestamp(&self.timestamp),
            self.level,
            self.code,
            self.module,
            self.text
        )
    }
}
