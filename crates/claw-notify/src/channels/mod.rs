//! Notification channels.
//!
//! This module provides the [`Notifier`] trait shared by every channel kind
//! and [`build_notifier`], which validates a [`NotificationChannelConfig`]
//! and creates the matching notifier. Email is the only built-in kind.

pub mod email;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::bus::CommandBus;
use crate::context::NotifyContext;
use crate::error::{NotifyError, Result};
use crate::template::TemplateRenderer;
use crate::types::Alert;

pub use email::{EmailNotifier, EmailSettings};

/// The kinds of notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Email via the mail composition service.
    Email,
}

impl ChannelKind {
    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
        }
    }

    /// Parses a channel type name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "email" => Some(Self::Email),
            _ => None,
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration of a single notification channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannelConfig {
    /// Channel name, used in logs and template names.
    pub name: String,
    /// Channel type, e.g. `"email"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form settings interpreted by the channel kind.
    #[serde(default)]
    pub settings: Value,
}

impl NotificationChannelConfig {
    /// Creates a channel configuration.
    pub fn new(name: impl Into<String>, kind: impl Into<String>, settings: Value) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            settings,
        }
    }

    /// Validates the fields shared by every channel kind and returns the kind.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` if the name is empty or the type
    /// is unknown.
    pub fn channel_kind(&self) -> Result<ChannelKind> {
        if self.name.trim().is_empty() {
            return Err(NotifyError::invalid_config("channel name cannot be empty"));
        }
        ChannelKind::parse(&self.kind).ok_or_else(|| {
            NotifyError::invalid_config(format!("unknown channel type '{}'", self.kind))
        })
    }
}

/// A configured notification channel.
///
/// A notifier only exists once its configuration has been validated; any
/// change of configuration means building a new notifier.
#[async_trait]
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Returns the channel name.
    fn name(&self) -> &str;

    /// Returns the channel kind.
    fn kind(&self) -> ChannelKind;

    /// Renders `alerts` as one notification and dispatches it.
    ///
    /// Returns `Ok(true)` once the bus has completed the delivery command.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Render` if rendering fails, `NotifyError::Dispatch`
    /// if the bus fails the command, or a context error if `ctx` is cancelled
    /// or times out first.
    async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<bool>;
}

/// Validates `config` and creates the notifier for its channel kind.
///
/// # Errors
///
/// Returns `NotifyError::InvalidConfig` if the configuration is invalid.
pub fn build_notifier(
    config: &NotificationChannelConfig,
    renderer: &TemplateRenderer,
    bus: Arc<dyn CommandBus>,
) -> Result<Box<dyn Notifier>> {
    let notifier: Box<dyn Notifier> = match config.channel_kind()? {
        ChannelKind::Email => Box::new(EmailNotifier::new(config, renderer, bus)?),
    };
    info!(channel = %config.name, kind = %notifier.kind(), "created notifier");
    Ok(notifier)
}
