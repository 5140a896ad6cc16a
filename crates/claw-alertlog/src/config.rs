//! Logger configuration.
//!
//! This module provides:
//! - [`LoggerConfig`]: Plain configuration value with builders and env loading
//! - [`ChannelConfig`]: Validated mail channel parameters
//! - [`ConfigProvider`]: Shared, runtime-adjustable view used by the writer,
//!   the gate, and the facade

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{LogError, Result};

/// Client identity used when none is configured.
pub const DEFAULT_CLIENT: &str = "unknown-client";
/// Base directory used when none is configured.
pub const DEFAULT_BASE_DIR: &str = "logs";
/// Number of period files kept by default.
pub const DEFAULT_RETENTION_LIMIT: usize = 30;
/// Minimum spacing between two notification attempts by default.
pub const DEFAULT_THROTTLE_WINDOW: Duration = Duration::from_secs(60);
/// Port that selects implicit TLS instead of STARTTLS.
pub const SECURE_SMTP_PORT: u16 = 465;

const ROTATION_FILE_PREFIX: &str = "log-";
const ROTATION_FILE_SUFFIX: &str = ".txt";

/// Environment variable names read by [`LoggerConfig::from_env`].
pub mod env {
    /// Client identity.
    pub const CLIENT: &str = "ALERTLOG_CLIENT";
    /// Base directory; files go to `<base>/<client>/`.
    pub const BASE_DIR: &str = "ALERTLOG_BASE_DIR";
    /// Explicit target directory, overrides `<base>/<client>/`.
    pub const DIR: &str = "ALERTLOG_DIR";
    /// SMTP host.
    pub const SMTP_HOST: &str = "ALERTLOG_SMTP_HOST";
    /// SMTP port.
    pub const SMTP_PORT: &str = "ALERTLOG_SMTP_PORT";
    /// SMTP username.
    pub const SMTP_USER: &str = "ALERTLOG_SMTP_USER";
    /// SMTP password.
    pub const SMTP_PASSWORD: &str = "ALERTLOG_SMTP_PASSWORD";
    /// Sender address, defaults to the username.
    pub const SMTP_FROM: &str = "ALERTLOG_SMTP_FROM";
    /// Recipient address.
    pub const SMTP_TO: &str = "ALERTLOG_SMTP_TO";
    /// Verbose transport diagnostics.
    pub const SMTP_DEBUG: &str = "ALERTLOG_SMTP_DEBUG";
    /// Retention limit (file count).
    pub const MAX_FILES: &str = "ALERTLOG_MAX_FILES";
    /// Throttle window in milliseconds.
    pub const THROTTLE_MS: &str = "ALERTLOG_THROTTLE_MS";
    /// Console echo toggle.
    pub const CONSOLE: &str = "ALERTLOG_CONSOLE";
}

/// Returns the file name of the monthly period containing `now`,
/// e.g. `log-2025-Jun.txt`.
#[must_use]
pub fn period_filename(now: &DateTime<Local>) -> String {
    format!(
        "{ROTATION_FILE_PREFIX}{}{ROTATION_FILE_SUFFIX}",
        now.format("%Y-%b")
    )
}

/// Returns true if `name` follows the period file naming pattern.
#[must_use]
pub fn is_rotation_file(name: &str) -> bool {
    name.len() > ROTATION_FILE_PREFIX.len() + ROTATION_FILE_SUFFIX.len()
        && name.starts_with(ROTATION_FILE_PREFIX)
        && name.ends_with(ROTATION_FILE_SUFFIX)
}

/// Validated parameters for the mail channel.
///
/// Only obtainable through [`ChannelConfigBuilder::build`] (or deserialization,
/// which runs the same validation), so holding one means notifications may be
/// attempted. Serialization keeps every field, the password included, so a
/// serialized config reads back as the same value; only `Debug` redacts.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ChannelConfigBuilder")]
pub struct ChannelConfig {
    host: String,
    port: u16,
    username: String,
    password: String,
    from: String,
    to: String,
    debug: bool,
}

impl ChannelConfig {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> ChannelConfigBuilder {
        ChannelConfigBuilder::default()
    }

    /// SMTP host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// SMTP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// SMTP username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// SMTP password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Sender address.
    #[must_use]
    pub fn from(&self) -> &str {
        &self.from
    }

    /// Recipient address.
    #[must_use]
    pub fn to(&self) -> &str {
        &self.to
    }

    /// Whether transport diagnostics are logged.
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// Implicit TLS on the well-known secure port, STARTTLS otherwise.
    #[must_use]
    pub const fn secure(&self) -> bool {
        self.port == SECURE_SMTP_PORT
    }
}

impl fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("secure", &self.secure())
            .field("debug", &self.debug)
            .finish()
    }
}

/// Builder for [`ChannelConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChannelConfigBuilder {
    host: Option<String>,
    port: Option<i64>,
    username: Option<String>,
    password: Option<String>,
    from: Option<String>,
    to: Option<String>,
    debug: bool,
}

impl ChannelConfigBuilder {
    /// Sets the SMTP host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the SMTP port. Range is checked in [`Self::build`].
    #[must_use]
    pub const fn port(mut self, port: i64) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the SMTP username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the SMTP password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the sender address.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the recipient address.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Enables transport diagnostics.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    ///
    /// Returns `LogError::ConfigInvalid` when a required field is missing or
    /// blank, when the port is outside `1..=65535`, or when an address does
    /// not parse.
    pub fn build(self) -> Result<ChannelConfig> {
        let host = required(self.host, "host")?;
        let port = match self.port {
            None => return Err(LogError::config_invalid("missing port")),
            Some(port) => u16::try_from(port)
                .ok()
                .filter(|p| *p >= 1)
                .ok_or_else(|| LogError::config_invalid(format!("port {port} out of range")))?,
        };
        let username = required(self.username, "username")?;
        let password = required(self.password, "password")?;
        let to = required(self.to, "recipient")?;
        let from = non_blank(self.from).unwrap_or_else(|| username.clone());

        from.parse::<lettre::Address>()?;
        to.parse::<lettre::Address>()?;

        Ok(ChannelConfig {
            host,
            port,
            username,
            password,
            from,
            to,
            debug: self.debug,
        })
    }
}

impl TryFrom<ChannelConfigBuilder> for ChannelConfig {
    type Error = LogError;

    fn try_from(builder: ChannelConfigBuilder) -> Result<Self> {
        builder.build()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| LogError::config_invalid(format!("missing {field}")))
}

/// Logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Label written into every line and every alert.
    pub client: String,
    /// Base directory; the target directory is `<base_dir>/<client>`.
    pub base_dir: PathBuf,
    /// Explicit target directory overriding the derived one.
    pub target_dir: Option<PathBuf>,
    /// Maximum number of period files kept; 0 keeps only the active file.
    pub retention_limit: usize,
    /// Minimum spacing between two notification attempts.
    pub throttle_window: Duration,
    /// Echo each line to stderr.
    pub console_echo: bool,
    /// Mail channel; `None` disables notifications.
    pub channel: Option<ChannelConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            client: DEFAULT_CLIENT.to_string(),
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            target_dir: None,
            retention_limit: DEFAULT_RETENTION_LIMIT,
            throttle_window: DEFAULT_THROTTLE_WINDOW,
            console_echo: true,
            channel: None,
        }
    }
}

impl LoggerConfig {
    /// Creates a config for the given client identity.
    #[must_use]
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            ..Default::default()
        }
    }

    /// Sets the base directory.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Overrides the target directory.
    #[must_use]
    pub fn with_target_dir(mut self, target_dir: impl Into<PathBuf>) -> Self {
        self.target_dir = Some(target_dir.into());
        self
    }

    /// Sets the retention limit.
    #[must_use]
    pub const fn with_retention_limit(mut self, limit: usize) -> Self {
        self.retention_limit = limit;
        self
    }

    /// Sets the throttle window.
    #[must_use]
    pub const fn with_throttle_window(mut self, window: Duration) -> Self {
        self.throttle_window = window;
        self
    }

    /// Sets console echo.
    #[must_use]
    pub const fn with_console_echo(mut self, echo: bool) -> Self {
        self.console_echo = echo;
        self
    }

    /// Sets the mail channel.
    #[must_use]
    pub fn with_channel(mut self, channel: ChannelConfig) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Loads the configuration from the process environment.
    ///
    /// See [`env`] for the variable names.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration through an arbitrary key lookup.
    ///
    /// Unparseable numeric or boolean values fall back to their defaults with
    /// a warning. An incomplete or invalid channel leaves notifications off.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| non_blank(lookup(key));

        let channel_vars = [
            env::SMTP_HOST,
            env::SMTP_PORT,
            env::SMTP_USER,
            env::SMTP_PASSWORD,
            env::SMTP_TO,
        ];
        let channel = if channel_vars.into_iter().all(|key| get(key).is_none()) {
            debug!("no mail channel variables set");
            None
        } else {
            let mut builder = ChannelConfig::builder()
                .debug(parse_bool(env::SMTP_DEBUG, get(env::SMTP_DEBUG), false));
            builder.host = get(env::SMTP_HOST);
            builder.username = get(env::SMTP_USER);
            builder.password = get(env::SMTP_PASSWORD);
            builder.from = get(env::SMTP_FROM);
            builder.to = get(env::SMTP_TO);
            builder.port = match get(env::SMTP_PORT) {
                None => None,
                Some(raw) => match raw.parse::<i64>() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        warn!(key = env::SMTP_PORT, value = %raw, "port is not a number");
                        None
                    }
                },
            };
            match builder.build() {
                Ok(channel) => Some(channel),
                Err(err) => {
                    warn!(error = %err, "invalid mail channel, error alerts are disabled");
                    None
                }
            }
        };

        Self {
            client: get(env::CLIENT).unwrap_or(defaults.client),
            base_dir: get(env::BASE_DIR).map_or(defaults.base_dir, PathBuf::from),
            target_dir: get(env::DIR).map(PathBuf::from),
            retention_limit: parse_number(
                env::MAX_FILES,
                get(env::MAX_FILES),
                defaults.retention_limit,
            ),
            throttle_window: Duration::from_millis(parse_number(
                env::THROTTLE_MS,
                get(env::THROTTLE_MS),
                defaults.throttle_window.as_millis() as u64,
            )),
            console_echo: parse_bool(env::CONSOLE, get(env::CONSOLE), defaults.console_echo),
            channel,
        }
    }
}

/// Maps a client identity onto one directory name under the base directory.
///
/// Separators and NUL become `_`; `.` and `..` fall back to [`DEFAULT_CLIENT`].
fn directory_component(client: &str) -> String {
    let component: String = client
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect();
    match component.as_str() {
        "." | ".." => DEFAULT_CLIENT.to_string(),
        _ => component,
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "ignoring unparseable value");
            default
        }),
    }
}

fn parse_bool(key: &str, raw: Option<String>, default: bool) -> bool {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => default,
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        Some(other) => {
            warn!(key, value = %other, "ignoring unparseable flag");
            default
        }
    }
}

/// Shared configuration view.
///
/// Readers always see a consistent snapshot; setters replace single fields.
/// A new [`ChannelConfig`] set here does not touch a channel that was already
/// built from the previous one.
#[derive(Debug)]
pub struct ConfigProvider {
    inner: RwLock<LoggerConfig>,
}

impl ConfigProvider {
    /// Wraps a configuration.
    #[must_use]
    pub fn new(config: LoggerConfig) -> Self {
        if config.channel.is_none() {
            info!(client = %config.client, "no mail channel configured");
        }
        Self {
            inner: RwLock::new(config),
        }
    }

    /// Returns a copy of the current configuration.
    #[must_use]
    pub fn snapshot(&self) -> LoggerConfig {
        self.inner.read().clone()
    }

    /// Client identity, falling back to [`DEFAULT_CLIENT`] when blank.
    #[must_use]
    pub fn client_identity(&self) -> String {
        let inner = self.inner.read();
        let client = inner.client.trim();
        if client.is_empty() {
            DEFAULT_CLIENT.to_string()
        } else {
            client.to_string()
        }
    }

    /// Directory holding all period files.
    ///
    /// Without an override this is `<base_dir>/<client>`, where the client
    /// identity is reduced to a single path component first.
    #[must_use]
    pub fn target_directory(&self) -> PathBuf {
        let client = self.client_identity();
        let inner = self.inner.read();
        inner
            .target_dir
            .clone()
            .unwrap_or_else(|| inner.base_dir.join(directory_component(&client)))
    }

    /// File name for the period containing `now`.
    #[must_use]
    pub fn current_period_filename(&self, now: &DateTime<Local>) -> String {
        period_filename(now)
    }

    /// Validated mail channel parameters, if any.
    #[must_use]
    pub fn channel_config(&self) -> Option<ChannelConfig> {
        self.inner.read().channel.clone()
    }

    /// Maximum number of period files kept.
    #[must_use]
    pub fn retention_limit(&self) -> usize {
        self.inner.read().retention_limit
    }

    /// Minimum spacing between two notification attempts.
    #[must_use]
    pub fn throttle_window(&self) -> Duration {
        self.inner.read().throttle_window
    }

    /// Whether lines are echoed to stderr.
    #[must_use]
    pub fn console_echo(&self) -> bool {
        self.inner.read().console_echo
    }

    /// Sets the client identity.
    pub fn set_client_identity(&self, client: impl Into<String>) {
        self.inner.write().client = client.into();
    }

    /// Overrides the target directory, or restores the derived one with `None`.
    pub fn set_target_directory(&self, dir: Option<PathBuf>) {
        self.inner.write().target_dir = dir;
    }

    /// Sets the retention limit.
    pub fn set_retention_limit(&self, limit: usize) {
        self.inner.write().retention_limit = limit;
    }

    /// Sets the throttle window.
    pub fn set_throttle_window(&self, window: Duration) {
        self.inner.write().throttle_window = window;
    }

    /// Sets console echo.
    pub fn set_console_echo(&self, echo: bool) {
        self.inner.write().console_echo = echo;
    }

    /// Replaces the mail channel parameters.
    pub fn set_channel_config(&self, channel: Option<ChannelConfig>) {
        self.inner.write().channel = channel;
    }
}
