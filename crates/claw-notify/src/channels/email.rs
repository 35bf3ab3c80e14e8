//! Email notification channel.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::{ChannelKind, NotificationChannelConfig, Notifier};
use crate::bus::{CommandBus, SendEmailCommand};
use crate::context::NotifyContext;
use crate::error::{NotifyError, Result};
use crate::template::{TemplateRenderer, EMAIL_LAYOUT};
use crate::types::Alert;
use crate::view::NotificationGroup;

/// Separator between addresses in the `addresses` setting.
pub const ADDRESS_SEPARATOR: char = ';';

const MESSAGE_TEMPLATE: &str = "email.message";

/// Settings of an email channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailSettings {
    /// Recipients separated by `;`.
    pub addresses: String,
    /// Optional message template.
    pub message: String,
}

impl EmailSettings {
    /// Reads settings from a channel's free-form settings value.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` if `settings` is not an object or
    /// a field has the wrong type.
    pub fn from_value(settings: &Value) -> Result<Self> {
        match settings {
            Value::Null => Ok(Self::default()),
            Value::Object(_) => Self::deserialize(settings)
                .map_err(|e| NotifyError::invalid_config(format!("invalid email settings: {e}"))),
            _ => Err(NotifyError::invalid_config(
                "email settings must be an object",
            )),
        }
    }

    /// Splits `addresses` into trimmed, non-empty recipients.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        self.addresses
            .split(ADDRESS_SEPARATOR)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Sends alert notifications by publishing [`SendEmailCommand`]s.
pub struct EmailNotifier {
    name: String,
    addresses: Vec<String>,
    has_message: bool,
    renderer: TemplateRenderer,
    bus: Arc<dyn CommandBus>,
}

impl fmt::Debug for EmailNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailNotifier")
            .field("name", &self.name)
            .field("addresses", &self.addresses)
            .field("has_message", &self.has_message)
            .finish_non_exhaustive()
    }
}

/// The `data` payload of an email command: the view model plus the rendered
/// title and message.
#[derive(Serialize)]
struct EmailData<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Message")]
    message: &'a str,
    #[serde(flatten)]
    group: &'a NotificationGroup,
}

impl EmailNotifier {
    /// Creates an email notifier from `config`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` if the settings are malformed, no
    /// recipient is configured, or the message template does not parse.
    pub fn new(
        config: &NotificationChannelConfig,
        renderer: &TemplateRenderer,
        bus: Arc<dyn CommandBus>,
    ) -> Result<Self> {
        let settings = EmailSettings::from_value(&config.settings)?;

        let addresses = settings.recipients();
        if addresses.is_empty() {
            return Err(NotifyError::invalid_config(
                "could not find addresses in settings",
            ));
        }

        let has_message = !settings.message.trim().is_empty();
        let renderer = if has_message {
            renderer.with_message_template(MESSAGE_TEMPLATE, &settings.message)?
        } else {
            renderer.clone()
        };

        Ok(Self {
            name: config.name.clone(),
            addresses,
            has_message,
            renderer,
            bus,
        })
    }

    /// Returns the configured recipients, in order.
    #[must_use]
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// Renders `alerts` into the command this notifier would dispatch.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Render` if the message template fails to execute.
    pub fn build_command(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<SendEmailCommand> {
        let group = self.renderer.group(alerts, ctx.group_labels().clone());
        let message_template = self.has_message.then_some(MESSAGE_TEMPLATE);
        let rendered = self.renderer.render(message_template, &group)?;

        let data = serde_json::to_value(EmailData {
            title: &rendered.title,
            message: &rendered.message,
            group: &group,
        })?;
        let Value::Object(data) = data else {
            return Err(NotifyError::Serialization(
                "email data did not serialize to an object".to_string(),
            ));
        };

        Ok(SendEmailCommand {
            subject: rendered.title,
            to: self.addresses.clone(),
            single_email: false,
            template: EMAIL_LAYOUT.to_string(),
            data,
        })
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn notify(&self, ctx: &NotifyContext, alerts: &[Alert]) -> Result<bool> {
        let cmd = self.build_command(ctx, alerts).inspect_err(|e| {
            warn!(channel = %self.name, error = %e, "failed to render email notification");
        })?;
        let subject = cmd.subject.clone();

        match ctx.run(self.bus.dispatch(cmd.into())).await {
            Ok(()) => {
                info!(
                    channel = %self.name,
                    recipients = self.addresses.len(),
                    alerts = alerts.len(),
                    subject = %subject,
                    "email notification dispatched"
                );
                Ok(true)
            }
            Err(e) => {
                error!(channel = %self.name, error = %e, "failed to send email notification");
                Err(e)
            }
        }
    }
}
