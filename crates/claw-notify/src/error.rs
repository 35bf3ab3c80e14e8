//! Error types for the claw-notify crate.

use thiserror::Error;

/// Errors that can occur while rendering or dispatching notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required setting or is malformed.
    ///
    /// Only raised while a notifier is being constructed.
    #[error("invalid channel configuration: {reason}")]
    InvalidConfig {
        /// The reason the configuration was rejected.
        reason: String,
    },

    /// A template failed to execute against the notification data.
    #[error("template rendering failed for '{template}': {reason}")]
    Render {
        /// Name of the template that failed.
        template: String,
        /// The underlying template diagnostic.
        reason: String,
    },

    /// The command bus could not accept or complete a delivery command.
    #[error("dispatch failed: {reason}")]
    Dispatch {
        /// The reason the dispatch failed.
        reason: String,
    },

    /// The caller cancelled the notification before dispatch completed.
    #[error("notification cancelled")]
    Cancelled,

    /// The caller's deadline elapsed before dispatch completed.
    #[error("notification deadline exceeded")]
    DeadlineExceeded,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl NotifyError {
    /// Shorthand for an [`NotifyError::InvalidConfig`] error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`NotifyError::Dispatch`] error.
    pub fn dispatch(reason: impl Into<String>) -> Self {
        Self::Dispatch {
            reason: reason.into(),
        }
    }

    /// Returns true if this error was caused by the caller's context.
    #[must_use]
    pub const fn is_context_error(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

impl From<serde_json::Error> for NotifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
