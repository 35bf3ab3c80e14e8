//! Delivery commands and the bus that carries them.
//!
//! Notifiers never talk to a transport directly. They build a
//! [`DeliveryCommand`] and hand it to an injected [`CommandBus`], which
//! completes or fails the command. [`InProcBus`] routes commands to handlers
//! registered in the same process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::error::{NotifyError, Result};

/// Command asking the mail transport to send an email.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailCommand {
    /// Email subject.
    pub subject: String,
    /// Recipients, in configuration order.
    pub to: Vec<String>,
    /// Send one email to all recipients instead of one per recipient.
    pub single_email: bool,
    /// Name of the bundled layout to render the body with.
    pub template: String,
    /// Fully resolved view model the layout is rendered against.
    pub data: Map<String, Value>,
}

/// The kinds of command a bus can route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// [`SendEmailCommand`].
    SendEmail,
}

impl CommandKind {
    /// Returns the kind as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SendEmail => "send_email",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A command produced by a notifier.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryCommand {
    /// Send an email.
    SendEmail(SendEmailCommand),
}

impl DeliveryCommand {
    /// Returns the kind of this command.
    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::SendEmail(_) => CommandKind::SendEmail,
        }
    }
}

impl From<SendEmailCommand> for DeliveryCommand {
    fn from(cmd: SendEmailCommand) -> Self {
        Self::SendEmail(cmd)
    }
}

/// Accepts delivery commands and reports their completion.
///
/// A single `dispatch` call is made per notification; implementations decide
/// whether the command runs inline or is queued.
#[async_trait]
pub trait CommandBus: Send + Sync + fmt::Debug {
    /// Publishes `command` and waits for it to complete.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Dispatch` if the command could not be accepted
    /// or failed.
    async fn dispatch(&self, command: DeliveryCommand) -> Result<()>;
}

/// Executes commands routed to it by an [`InProcBus`].
#[async_trait]
pub trait CommandHandler: Send + Sync + fmt::Debug {
    /// Executes `command`.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    async fn handle(&self, command: DeliveryCommand) -> Result<()>;
}

/// A bus that routes commands to in-process handlers by kind.
#[derive(Debug, Default)]
pub struct InProcBus {
    handlers: RwLock<HashMap<CommandKind, Arc<dyn CommandHandler>>>,
}

impl InProcBus {
    /// Creates a bus with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`, replacing any previous handler.
    pub fn add_handler(&self, kind: CommandKind, handler: Arc<dyn CommandHandler>) {
        let previous = self.handlers.write().insert(kind, handler);
        if previous.is_some() {
            warn!(kind = %kind, "replaced existing command handler");
        } else {
            info!(kind = %kind, "registered command handler");
        }
    }

    /// Returns true if a handler is registered for `kind`.
    #[must_use]
    pub fn has_handler(&self, kind: CommandKind) -> bool {
        self.handlers.read().contains_key(&kind)
    }
}

#[async_trait]
impl CommandBus for InProcBus {
    async fn dispatch(&self, command: DeliveryCommand) -> Result<()> {
        let kind = command.kind();
        let handler = self.handlers.read().get(&kind).cloned();
        let Some(handler) = handler else {
            return Err(NotifyError::dispatch(format!(
                "no handler registered for {kind} commands"
            )));
        };

        debug!(kind = %kind, "dispatching command");
        handler.handle(command).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingBus;
    use super::*;

    fn command() -> DeliveryCommand {
        SendEmailCommand {
            subject: "[FIRING:1]  (AlwaysFiring warning)".to_string(),
            to: vec!["someops@example.com".to_string()],
            single_email: false,
            template: "ng_alert_notification".to_string(),
            data: Map::new(),
        }
        .into()
    }

    #[test]
    fn command_kind() {
        assert_eq!(command().kind(), CommandKind::SendEmail);
        assert_eq!(CommandKind::SendEmail.to_string(), "send_email");
    }

    #[test]
    fn send_email_command_serializes_camel_case() {
        let DeliveryCommand::SendEmail(cmd) = command();
        let value = serde_json::to_value(&cmd).expect("serialize");
        assert_eq!(value["singleEmail"], false);
        assert_eq!(value["template"], "ng_alert_notification");
    }

    #[tokio::test]
    async fn dispatch_without_handler_fails() {
        let bus = InProcBus::new();
        let err = bus.dispatch(command()).await.expect_err("no handler");
        assert!(matches!(err, NotifyError::Dispatch { .. }));
    }

    #[tokio::test]
    async fn dispatch_routes_to_handler() {
        let bus = InProcBus::new();
        let handler = Arc::new(RecordingBus::default());
        bus.add_handler(CommandKind::SendEmail, handler.clone());
        assert!(bus.has_handler(CommandKind::SendEmail));

        bus.dispatch(command()).await.expect("dispatch");
        assert_eq!(handler.emails().len(), 1);
    }

    #[tokio::test]
    async fn replacing_handler_routes_to_latest() {
        let bus = InProcBus::new();
        let first = Arc::new(RecordingBus::default());
        let second = Arc::new(RecordingBus::default());
        bus.add_handler(CommandKind::SendEmail, first.clone());
        bus.add_handler(CommandKind::SendEmail, second.clone());

        bus.dispatch(command()).await.expect("dispatch");
        assert!(first.emails().is_empty());
        assert_eq!(second.emails().len(), 1);
    }
}
