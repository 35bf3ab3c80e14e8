//! Email composition for [`SendEmailCommand`]s.
//!
//! [`EmailService`] turns a send-email command into a multi-part [`Message`]
//! by rendering the command's bundled layout once per configured content
//! type. Composed messages are queued in memory for a transport to pick up.

use std::collections::{BTreeMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::bus::{CommandHandler, DeliveryCommand, SendEmailCommand};
use crate::error::{NotifyError, Result};
use crate::template::{TemplateRenderer, CONTENT_TYPE_HTML, CONTENT_TYPE_TEXT};

/// Sender identity and body formats for composed emails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailerConfig {
    /// Envelope sender address.
    pub from_address: String,
    /// Display name of the sender.
    pub from_name: String,
    /// Content types rendered for each message, in order.
    pub content_types: Vec<String>,
    /// Maximum number of composed messages held in the queue.
    pub max_queue_len: usize,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            from_address: "admin@grafana.localhost".to_string(),
            from_name: "Grafana".to_string(),
            content_types: vec![CONTENT_TYPE_HTML.to_string()],
            max_queue_len: 1000,
        }
    }
}

impl MailerConfig {
    /// Sets the sender address and display name.
    #[must_use]
    pub fn with_from(mut self, address: impl Into<String>, name: impl Into<String>) -> Self {
        self.from_address = address.into();
        self.from_name = name.into();
        self
    }

    /// Sets the content types to render.
    #[must_use]
    pub fn with_content_types<I, S>(mut self, content_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.content_types = content_types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the maximum queue length.
    #[must_use]
    pub const fn with_max_queue_len(mut self, max: usize) -> Self {
        self.max_queue_len = max;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` if the sender address is empty,
    /// no content type is configured, or a content type is unsupported.
    pub fn validate(&self) -> Result<()> {
        if self.from_address.trim().is_empty() {
            return Err(NotifyError::invalid_config("mailer from address cannot be empty"));
        }
        if self.content_types.is_empty() {
            return Err(NotifyError::invalid_config(
                "mailer needs at least one content type",
            ));
        }
        if let Some(unsupported) = self
            .content_types
            .iter()
            .find(|ct| ct.as_str() != CONTENT_TYPE_HTML && ct.as_str() != CONTENT_TYPE_TEXT)
        {
            return Err(NotifyError::invalid_config(format!(
                "unsupported content type '{unsupported}'"
            )));
        }
        Ok(())
    }

    /// Returns the formatted `From` header value.
    #[must_use]
    pub fn from_header(&self) -> String {
        if self.from_name.is_empty() {
            self.from_address.clone()
        } else {
            format!("\"{}\" <{}>", self.from_name, self.from_address)
        }
    }
}

/// A composed email ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Formatted sender.
    pub from: String,
    /// Recipients.
    pub to: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Body per content type.
    pub body: BTreeMap<String, String>,
    /// Whether all recipients share a single email.
    pub single_email: bool,
}

/// Composes messages from send-email commands and queues them.
#[derive(Debug)]
pub struct EmailService {
    config: MailerConfig,
    renderer: TemplateRenderer,
    queue: Mutex<VecDeque<Message>>,
}

impl EmailService {
    /// Creates a service rendering layouts with `renderer`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` if `config` is invalid.
    pub fn new(config: MailerConfig, renderer: TemplateRenderer) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            renderer,
            queue: Mutex::new(VecDeque::new()),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &MailerConfig {
        &self.config
    }

    /// Builds a message for `cmd` without queueing it.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Render` if a layout fails to render.
    pub fn build_message(&self, cmd: &SendEmailCommand) -> Result<Message> {
        if cmd.to.is_empty() {
            return Err(NotifyError::dispatch("email has no recipients"));
        }

        let data = Value::Object(cmd.data.clone());
        let mut body = BTreeMap::new();
        for content_type in &self.config.content_types {
            let rendered = self
                .renderer
                .render_layout(&cmd.template, content_type, &data)?;
            body.insert(content_type.clone(), rendered);
        }

        Ok(Message {
            from: self.config.from_header(),
            to: cmd.to.clone(),
            subject: cmd.subject.clone(),
            body,
            single_email: cmd.single_email,
        })
    }

    /// Composes and queues a message for `cmd`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Dispatch` if the message cannot be composed or
    /// the queue is full.
    pub fn send(&self, cmd: &SendEmailCommand) -> Result<()> {
        let message = self.build_message(cmd).map_err(|e| match e {
            NotifyError::Render { template, reason } => NotifyError::dispatch(format!(
                "failed to render email layout '{template}': {reason}"
            )),
            other => other,
        })?;

        let mut queue = self.queue.lock();
        if queue.len() >= self.config.max_queue_len {
            warn!(
                queued = queue.len(),
                subject = %message.subject,
                "mail queue full, rejecting email"
            );
            return Err(NotifyError::dispatch("mail queue is full"));
        }

        info!(
            to = ?message.to,
            subject = %message.subject,
            parts = message.body.len(),
            "queued email"
        );
        queue.push_back(message);
        Ok(())
    }

    /// Removes and returns the oldest queued message.
    pub fn mail_queue_pop(&self) -> Option<Message> {
        self.queue.lock().pop_front()
    }

    /// Number of queued messages.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.queue.lock().len()
    }
}

#[async_trait]
impl CommandHandler for EmailService {
    async fn handle(&self, command: DeliveryCommand) -> Result<()> {
        match command {
            DeliveryCommand::SendEmail(cmd) => self.send(&cmd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::EMAIL_LAYOUT;
    use serde_json::{json, Map};

    fn renderer() -> TemplateRenderer {
        TemplateRenderer::new("http://localhost/base").expect("renderer")
    }

    fn command(message: &str) -> SendEmailCommand {
        let data = json!({
            "Title": "[FIRING:1]  (AlwaysFiring warning)",
            "Message": message,
            "Status": "firing",
            "Alerts": [{
                "Status": "firing",
                "Labels": {"alertname": "AlwaysFiring", "severity": "warning"},
                "Annotations": {"runbook_url": "http://fix.me"},
                "Fingerprint": "15a37193dce72bab",
                "SilenceURL": "http://localhost/base/alerting/silence/new?alertmanager=grafana&matchers=alertname%3DAlwaysFiring%2Cseverity%3Dwarning",
                "DashboardURL": "http://localhost/base/d/abc",
                "PanelURL": "http://localhost/base/d/abc?viewPanel=5",
            }],
            "GroupLabels": {},
            "CommonLabels": {"alertname": "AlwaysFiring", "severity": "warning"},
            "CommonAnnotations": {"runbook_url": "http://fix.me"},
            "ExternalURL": "http://localhost/base",
            "RuleUrl": "http://localhost/base/alerting/list",
            "AlertPageUrl": "http://localhost/base/alerting/list?alertState=firing&view=state",
        });
        let data: Map<String, Value> = match data {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        SendEmailCommand {
            subject: "[FIRING:1]  (AlwaysFiring warning)".to_string(),
            to: vec![
                "someops@example.com".to_string(),
                "somedev@example.com".to_string(),
            ],
            single_email: false,
            template: EMAIL_LAYOUT.to_string(),
            data,
        }
    }

    fn service(config: MailerConfig) -> EmailService {
        EmailService::new(config, renderer()).expect("service")
    }

    #[test]
    fn default_config_is_valid() {
        MailerConfig::default().validate().expect("valid");
    }

    #[test]
    fn config_rejects_empty_from_address() {
        let config = MailerConfig::default().with_from("  ", "Grafana");
        assert!(matches!(config.validate(), Err(NotifyError::InvalidConfig { .. })));
    }

    #[test]
    fn config_rejects_unknown_content_type() {
        let config = MailerConfig::default().with_content_types(["text/html", "application/pdf"]);
        assert!(matches!(config.validate(), Err(NotifyError::InvalidConfig { .. })));
    }

    #[test]
    fn config_rejects_no_content_types() {
        let config = MailerConfig::default().with_content_types(Vec::<String>::new());
        assert!(EmailService::new(config, renderer()).is_err());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: MailerConfig =
            serde_json::from_value(json!({"from_address": "from@address.com"})).expect("deserialize");
        assert_eq!(config.from_address, "from@address.com");
        assert_eq!(config.content_types, vec![CONTENT_TYPE_HTML.to_string()]);
    }

    #[test]
    fn from_header_formats_display_name() {
        let config = MailerConfig::default().with_from("from@address.com", "Grafana Admin");
        assert_eq!(config.from_header(), "\"Grafana Admin\" <from@address.com>");
        let bare = MailerConfig::default().with_from("from@address.com", "");
        assert_eq!(bare.from_header(), "from@address.com");
    }

    #[test]
    fn build_message_renders_each_content_type() {
        let svc = service(
            MailerConfig::default()
                .with_from("from@address.com", "Grafana Admin")
                .with_content_types([CONTENT_TYPE_HTML, CONTENT_TYPE_TEXT]),
        );
        let message = svc.build_message(&command("")).expect("message");

        assert_eq!(message.from, "\"Grafana Admin\" <from@address.com>");
        assert_eq!(message.to[0], "someops@example.com");
        assert_eq!(message.subject, "[FIRING:1]  (AlwaysFiring warning)");
        assert!(!message.single_email);

        let html = &message.body[CONTENT_TYPE_HTML];
        assert!(html.contains("<li>alertname: AlwaysFiring</li><li>severity: warning</li>"));
        assert!(html.contains("<a href=\"http://localhost/base/d/abc?viewPanel=5\""));

        let text = &message.body[CONTENT_TYPE_TEXT];
        assert!(text.contains("Firing: 1 alerts"));
        assert!(text.contains(" - alertname = AlwaysFiring"));
    }

    #[test]
    fn send_queues_message() {
        let svc = service(MailerConfig::default());
        svc.send(&command("<marquee>hi</marquee>")).expect("send");
        assert_eq!(svc.queue_len(), 1);

        let message = svc.mail_queue_pop().expect("queued");
        assert!(message.body[CONTENT_TYPE_HTML].contains("&lt;marquee&gt;hi&lt;/marquee&gt;"));
        assert!(svc.mail_queue_pop().is_none());
    }

    #[test]
    fn unknown_layout_is_dispatch_error() {
        let svc = service(MailerConfig::default());
        let mut cmd = command("");
        cmd.template = "no_such_layout".to_string();
        let err = svc.send(&cmd).expect_err("should fail");
        assert!(matches!(err, NotifyError::Dispatch { .. }));
        assert_eq!(svc.queue_len(), 0);
    }

    #[test]
    fn command_without_recipients_is_rejected() {
        let svc = service(MailerConfig::default());
        let mut cmd = command("");
        cmd.to.clear();
        assert!(matches!(svc.send(&cmd), Err(NotifyError::Dispatch { .. })));
    }

    #[test]
    fn full_queue_rejects_email() {
        let svc = service(MailerConfig::default().with_max_queue_len(1));
        svc.send(&command("")).expect("first");
        let err = svc.send(&command("")).expect_err("queue full");
        assert!(matches!(err, NotifyError::Dispatch { .. }));
        assert_eq!(svc.queue_len(), 1);
    }

    #[tokio::test]
    async fn handler_sends_email_commands() {
        let svc = service(MailerConfig::default());
        svc.handle(DeliveryCommand::SendEmail(command("")))
            .await
            .expect("handled");
        assert_eq!(svc.queue_len(), 1);
    }
}
