//! Error types for the alert logger.

use thiserror::Error;

/// Errors that can occur inside the logger.
///
/// None of these ever reach the application through the level operations on
/// [`crate::AppLogger`]; they surface from the lower-level components and are
/// reported through `tracing` by the facade.
#[derive(Debug, Error)]
pub enum LogError {
    /// Directory creation, file open, append, or delete failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Notification channel configuration is missing or invalid.
    #[error("invalid channel config: {reason}")]
    ConfigInvalid {
        /// The reason the configuration was rejected.
        reason: String,
    },

    /// Notification session setup or delivery failed.
    #[error("delivery failed: {reason}")]
    DeliveryFailed {
        /// The reason delivery failed.
        reason: String,
    },

    /// A log call arrived before the writer could be initialized.
    #[error("logger not initialized")]
    NotInitialized,
}

impl LogError {
    /// Creates a [`LogError::ConfigInvalid`].
    pub fn config_invalid(reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            reason: reason.into(),
        }
    }

    /// Creates a [`LogError::DeliveryFailed`].
    pub fn delivery_failed(reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            reason: reason.into(),
        }
    }
}

impl From<lettre::address::AddressError> for LogError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::config_invalid(format!("bad mail address: {err}"))
    }
}

impl From<lettre::error::Error> for LogError {
    fn from(err: lettre::error::Error) -> Self {
        Self::delivery_failed(format!("message build: {err}"))
    }
}

impl From<lettre::transport::smtp::Error> for LogError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::delivery_failed(err.to_string())
    }
}

/// Result type alias for logger operations.
pub type Result<T> = std::result::Result<T, LogError>;
