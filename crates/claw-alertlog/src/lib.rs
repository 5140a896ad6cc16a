//! # claw-alertlog
//!
//! Rotating file logger with throttled error-alert email.
//!
//! This crate provides:
//!
//! - [`AppLogger`]: The facade: `info`, `warn`, `debug`, `error`
//! - [`RotatingWriter`]: Monthly period files with count-based retention
//! - [`NotificationGate`]: At most one alert attempt per throttle window
//! - [`NotificationChannel`]: Alert delivery, with [`SmtpChannel`] and [`LogChannel`]
//! - [`LoggerConfig`] / [`ConfigProvider`]: Configuration, env loading, setters
//!
//! Logging is fail-open: no call on [`AppLogger`] returns an error or panics
//! because of I/O or delivery failures. Problems are reported through
//! `tracing`.
//!
//! ## Example
//!
//! ```rust,no_run
//! use claw_alertlog::{AppLogger, ChannelConfig, LoggerConfig};
//! use std::time::Duration;
//!
//! let channel = ChannelConfig::builder()
//!     .host("smtp.example.com")
//!     .port(465)
//!     .username("alerts@example.com")
//!     .password("secret")
//!     .to("oncall@example.com")
//!     .build()
//!     .ok();
//!
//! let mut config = LoggerConfig::new("Acme")
//!     .with_base_dir("/var/log/apps")
//!     .with_throttle_window(Duration::from_secs(60));
//! config.channel = channel;
//!
//! let logger = AppLogger::new(config);
//! logger.info("APP_001", "Main", "Started");
//! logger.error("DB_042", "Storage", "write failed");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channels;
pub mod clock;
pub mod config;
mod dispatch;
pub mod error;
pub mod logger;
pub mod throttle;
pub mod types;
pub mod writer;

// Re-export main types
pub use channels::{AlertMessage, LogChannel, NotificationChannel, SmtpChannel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    is_rotation_file, period_filename, ChannelConfig, ChannelConfigBuilder, ConfigProvider,
    LoggerConfig,
};
pub use error::{LogError, Result};
pub use logger::{AppLogger, AppLoggerBuilder, LoggerState};
pub use throttle::NotificationGate;
pub use types::{format_timestamp, LogEvent, LogLevel};
pub use writer::RotatingWriter;
