//! The logging facade.
//!
//! [`AppLogger`] is the only type application code calls. Each level
//! operation formats a line, appends it through the [`RotatingWriter`],
//! echoes it to stderr when enabled, and for errors may hand an alert to the
//! notification channel. None of these steps can fail the caller.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::channels::{AlertMessage, NotificationChannel, SmtpChannel};
use crate::clock::{Clock, SystemClock};
use crate::config::{ChannelConfig, ConfigProvider, LoggerConfig};
use crate::dispatch;
use crate::error::LogError;
use crate::throttle::NotificationGate;
use crate::types::{LogEvent, LogLevel};
use crate::writer::RotatingWriter;

/// Lifecycle of the facade. Moves to `Ready` once and stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    /// The period file could not be opened yet; lines are dropped.
    Uninitialized,
    /// The period file was opened at least once.
    Ready,
}

/// Leveled file logger with throttled error alerts.
///
/// Construct one per application, at startup, and share it by reference or
/// `Arc`. All methods take `&self`.
pub struct AppLogger {
    config: Arc<ConfigProvider>,
    writer: RotatingWriter,
    gate: NotificationGate,
    channel: RwLock<Option<Arc<dyn NotificationChannel>>>,
    state: RwLock<LoggerState>,
    attempts: AtomicU64,
}

impl AppLogger {
    /// Creates a logger on the system clock, with an SMTP channel when the
    /// configuration carries one.
    #[must_use]
    pub fn new(config: LoggerConfig) -> Self {
        Self::builder(config).build()
    }

    /// Creates a logger from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(LoggerConfig::from_env())
    }

    /// Returns a builder for custom clocks or channels.
    #[must_use]
    pub fn builder(config: LoggerConfig) -> AppLoggerBuilder {
        AppLoggerBuilder {
            config,
            clock: None,
            channel: None,
        }
    }

    // ============ Level Operations ============

    /// Logs at INFO.
    pub fn info(&self, code: &str, module: &str, text: &str) {
        self.log(LogLevel::Info, code, module, text);
    }

    /// Logs at WARN.
    pub fn warn(&self, code: &str, module: &str, text: &str) {
        self.log(LogLevel::Warn, code, module, text);
    }

    /// Logs at DEBUG.
    pub fn debug(&self, code: &str, module: &str, text: &str) {
        self.log(LogLevel::Debug, code, module, text);
    }

    /// Logs at ERROR and, if allowed by the throttle, fires an alert.
    pub fn error(&self, code: &str, module: &str, text: &str) {
        self.log(LogLevel::Error, code, module, text);
    }

    /// Logs at an arbitrary level.
    ///
    /// While the logger is `Uninitialized` the call only retries opening the
    /// period file and returns if that fails again.
    pub fn log(&self, level: LogLevel, code: &str, module: &str, text: &str) {
        if !self.ensure_initialized() {
            return;
        }

        let client = self.config.client_identity();
        let mut stamped = None;
        let written = self.writer.append_with(|now| {
            let event = LogEvent::new(level, code, module, text, *now);
            let line = event.format_line(&client);
            stamped = Some((event, line.clone()));
            line
        });
        let Some((event, line)) = stamped else {
            return;
        };
        if let Err(err) = written {
            warn!(error = %err, code = %event.code, "failed to write log line");
        }

        if self.config.console_echo() {
            let _ = writeln!(std::io::stderr().lock(), "{line}");
        }

        if level.is_alerting() {
            self.maybe_notify(event, client);
        }
    }

    // ============ Accessors ============

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LoggerState {
        *self.state.read()
    }

    /// Shared configuration view.
    #[must_use]
    pub fn config(&self) -> &ConfigProvider {
        &self.config
    }

    /// Client identity.
    #[must_use]
    pub fn client_identity(&self) -> String {
        self.config.client_identity()
    }

    /// Sets the client identity. The next line opens a file under the new
    /// identity's directory unless the target directory is overridden.
    pub fn set_client_identity(&self, client: impl Into<String>) {
        self.config.set_client_identity(client);
    }

    /// Directory holding the period files.
    #[must_use]
    pub fn target_directory(&self) -> PathBuf {
        self.config.target_directory()
    }

    /// Overrides the target directory, or restores the derived one with `None`.
    pub fn set_target_directory(&self, dir: Option<PathBuf>) {
        self.config.set_target_directory(dir);
    }

    /// Throttle window.
    #[must_use]
    pub fn throttle_window(&self) -> Duration {
        self.config.throttle_window()
    }

    /// Sets the throttle window.
    pub fn set_throttle_window(&self, window: Duration) {
        self.config.set_throttle_window(window);
    }

    /// Retention limit.
    #[must_use]
    pub fn retention_limit(&self) -> usize {
        self.config.retention_limit()
    }

    /// Sets the retention limit. Applied at the next rotation.
    pub fn set_retention_limit(&self, limit: usize) {
        self.config.set_retention_limit(limit);
    }

    /// Console echo flag.
    #[must_use]
    pub fn console_echo(&self) -> bool {
        self.config.console_echo()
    }

    /// Sets console echo.
    pub fn set_console_echo(&self, echo: bool) {
        self.config.set_console_echo(echo);
    }

    /// Validated mail channel parameters, if any.
    #[must_use]
    pub fn channel_config(&self) -> Option<ChannelConfig> {
        self.config.channel_config()
    }

    /// True if alerts can currently be attempted.
    #[must_use]
    pub fn channel_ready(&self) -> bool {
        self.config.channel_config().is_some()
            && self.channel.read().as_ref().is_some_and(|c| c.is_ready())
    }

    /// File currently written to.
    #[must_use]
    pub fn active_file(&self) -> Option<PathBuf> {
        self.writer.active_file()
    }

    /// Number of alerts handed to the channel so far.
    #[must_use]
    pub fn notifications_attempted(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Replaces the mail channel parameters and rebuilds the SMTP channel
    /// from them. `None` turns notifications off.
    pub fn reconfigure_channel(&self, channel: Option<ChannelConfig>) {
        let rebuilt = channel
            .clone()
            .map(|c| Arc::new(SmtpChannel::new(c)) as Arc<dyn NotificationChannel>);
        self.config.set_channel_config(channel);
        *self.channel.write() = rebuilt;
        info!(enabled = self.channel_ready(), "mail channel reconfigured");
    }

    // ============ Internal ============

    fn ensure_initialized(&self) -> bool {
        if *self.state.read() == LoggerState::Ready {
            return true;
        }

        let mut state = self.state.write();
        if *state == LoggerState::Ready {
            return true;
        }
        match self.writer.ensure_ready() {
            Ok(()) => {
                *state = LoggerState::Ready;
                info!(dir = %self.config.target_directory().display(), "logger ready");
                true
            }
            Err(err) => {
                warn!(
                    error = %LogError::NotInitialized,
                    cause = %err,
                    dir = %self.config.target_directory().display(),
                    "dropping log line"
                );
                false
            }
        }
    }

    fn maybe_notify(&self, event: LogEvent, client: String) {
        if self.config.channel_config().is_none() {
            return;
        }
        let Some(channel) = self.channel.read().clone() else {
            return;
        };
        if !channel.is_ready() {
            debug!(channel = %channel.name(), "channel not ready, alert skipped");
            return;
        }
        if !self.gate.should_attempt(event.timestamp) {
            return;
        }

        self.attempts.fetch_add(1, Ordering::Relaxed);
        let alert = AlertMessage::new(client, event.code, event.module, event.text, event.timestamp);
        dispatch::spawn_alert(channel, alert);
    }
}

impl std::fmt::Debug for AppLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppLogger")
            .field("client", &self.config.client_identity())
            .field("state", &self.state())
            .field("writer", &self.writer)
            .field("channel", &*self.channel.read())
            .finish_non_exhaustive()
    }
}

/// Builder for [`AppLogger`].
pub struct AppLoggerBuilder {
    config: LoggerConfig,
    clock: Option<Arc<dyn Clock>>,
    channel: Option<Arc<dyn NotificationChannel>>,
}

impl AppLoggerBuilder {
    /// Uses `clock` instead of the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Uses `channel` instead of an SMTP channel built from the config.
    ///
    /// Alerts are still only attempted while the config carries a valid
    /// [`ChannelConfig`].
    #[must_use]
    pub fn channel(mut self, channel: Arc<dyn NotificationChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Builds the logger and opens the current period file.
    ///
    /// If the file cannot be opened the logger starts `Uninitialized` and
    /// retries on every log call.
    #[must_use]
    pub fn build(self) -> AppLogger {
        let config = Arc::new(ConfigProvider::new(self.config));
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let channel = self.channel.or_else(|| {
            config
                .channel_config()
                .map(|c| Arc::new(SmtpChannel::new(c)) as Arc<dyn NotificationChannel>)
        });

        let logger = AppLogger {
            writer: RotatingWriter::new(Arc::clone(&config), clock),
            gate: NotificationGate::new(Arc::clone(&config)),
            config,
            channel: RwLock::new(channel),
            state: RwLock::new(LoggerState::Uninitialized),
            attempts: AtomicU64::new(0),
        };
        logger.ensure_initialized();
        logger
    }
}
