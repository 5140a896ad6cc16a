//! Notification channels for error alerts.
//!
//! This module provides the [`NotificationChannel`] trait and implementations
//! for delivering an [`AlertMessage`]:
//! - [`SmtpChannel`]: mail delivery over SMTP
//! - [`LogChannel`]: writes alerts to `tracing`, useful without a mail server

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, error, warn};

use crate::config::ChannelConfig;
use crate::error::{LogError, Result};
use crate::types::format_timestamp;

/// Transport timeout for one delivery attempt.
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// An error event to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    /// Client identity of the emitting process.
    pub client: String,
    /// Event code.
    pub code: String,
    /// Emitting module.
    pub module: String,
    /// Event text.
    pub text: String,
    /// When the event occurred.
    pub occurred_at: DateTime<Local>,
}

impl AlertMessage {
    /// Creates a new alert message.
    #[must_use]
    pub fn new(
        client: impl Into<String>,
        code: impl Into<String>,
        module: impl Into<String>,
        text: impl Into<String>,
        occurred_at: DateTime<Local>,
    ) -> Self {
        Self {
            client: client.into(),
            code: code.into(),
            module: module.into(),
            text: text.into(),
            occurred_at,
        }
    }

    /// `[client] Error Alert - code`
    #[must_use]
    pub fn subject(&self) -> String {
        format!("[{}] Error Alert - {}", self.client, self.code)
    }

    /// HTML body, one field per line.
    #[must_use]
    pub fn html_body(&self) -> String {
        format!(
            "<p><strong>Client:</strong> {}</p>\n\
             <p><strong>Code:</strong> {}</p>\n\
             <p><strong>Module:</strong> {}</p>\n\
             <p><strong>Message:</strong> {}</p>\n\
             <p><strong>Time:</strong> {}</p>\n",
            escape_html(&self.client),
            escape_html(&self.code),
            escape_html(&self.module),
            escape_html(&self.text),
            format_timestamp(&self.occurred_at),
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Trait for notification channels.
///
/// A channel owns its own session lifecycle. [`send_alert`](Self::send_alert)
/// makes exactly one delivery attempt and never retries.
pub trait NotificationChannel: Send + Sync + fmt::Debug {
    /// Returns the name of this channel.
    fn name(&self) -> &str;

    /// Returns true if the channel was set up without error.
    fn is_ready(&self) -> bool;

    /// Attempts one delivery of `alert`.
    ///
    /// # Errors
    ///
    /// Returns `LogError::DeliveryFailed` if the channel is not ready or the
    /// delivery fails.
    fn send_alert(&self, alert: &AlertMessage) -> Result<()>;
}

/// Mail channel over SMTP.
///
/// Uses implicit TLS on port 465 and STARTTLS otherwise.
pub struct SmtpChannel {
    config: ChannelConfig,
    session: Option<SmtpSession>,
}

struct SmtpSession {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailbox,
}

impl SmtpChannel {
    /// Builds the channel from one configuration snapshot.
    ///
    /// Setup failures are logged and leave the channel not ready.
    #[must_use]
    pub fn new(config: ChannelConfig) -> Self {
        let session = match Self::open_session(&config) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(host = %config.host(), port = config.port(), error = %err, "mail channel setup failed");
                None
            }
        };
        Self { config, session }
    }

    /// Returns the configuration this channel was built from.
    #[must_use]
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    fn open_session(config: &ChannelConfig) -> Result<SmtpSession> {
        let builder = if config.secure() {
            SmtpTransport::relay(config.host())?
        } else {
            SmtpTransport::starttls_relay(config.host())?
        };
        let transport = builder
            .port(config.port())
            .credentials(Credentials::new(
                config.username().to_string(),
                config.password().to_string(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        Ok(SmtpSession {
            transport,
            from: config.from().parse::<Mailbox>()?,
            to: config.to().parse::<Mailbox>()?,
        })
    }
}

impl fmt::Debug for SmtpChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpChannel")
            .field("config", &self.config)
            .field("ready", &self.session.is_some())
            .finish()
    }
}

impl NotificationChannel for SmtpChannel {
    fn name(&self) -> &str {
        "smtp"
    }

    fn is_ready(&self) -> bool {
        self.session.is_some()
    }

    fn send_alert(&self, alert: &AlertMessage) -> Result<()> {
        let Some(session) = &self.session else {
            return Err(LogError::delivery_failed("mail channel not ready"));
        };

        let message = Message::builder()
            .from(session.from.clone())
            .to(session.to.clone())
            .subject(alert.subject())
            .header(ContentType::TEXT_HTML)
            .body(alert.html_body())?;

        let response = session.transport.send(&message)?;
        if self.config.debug() {
            debug!(
                code = %response.code(),
                message = ?response.message().collect::<Vec<_>>(),
                "smtp response"
            );
        }
        Ok(())
    }
}

/// A channel that writes alerts to `tracing` at error level.
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    /// Creates a new log channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new("log")
    }
}

impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn send_alert(&self, alert: &AlertMessage) -> Result<()> {
        error!(
            client = %alert.client,
            code = %alert.code,
            module = %alert.module,
            occurred_at = %format_timestamp(&alert.occurred_at),
            "ALERT: {}",
            alert.text
        );
        Ok(())
    }
}
