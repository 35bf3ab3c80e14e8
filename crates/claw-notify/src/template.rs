//! Template rendering for notification titles, messages and email layouts.
//!
//! Two handlebars registries are kept side by side. The text registry renders
//! titles, user-supplied messages and plain-text layouts without escaping.
//! The HTML registry renders HTML layouts and escapes every interpolated
//! value, so user content (labels, annotations, the rendered message) can
//! never inject markup into an email body.
//!
//! User templates are rendered against [`TemplateContext`] and may include the
//! bundled `default_title` and `default_message` partials:
//!
//! ```text
//! {{> default_title}}
//! {{#if (gt (len Alerts.Firing) 0)}}You have {{len Alerts.Firing}} alerts firing.{{/if}}
//! {{#each Alerts.Firing}} Firing: {{Labels.alertname}} {{/each}}
//! ```

use chrono::Utc;
use handlebars::{handlebars_helper, no_escape, Handlebars};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{NotifyError, Result};
use crate::links::LinkBuilder;
use crate::types::{Alert, Labels, ALERT_NAME_LABEL};
use crate::view::{NotificationGroup, TemplateContext};

/// Name of the bundled alert notification email layout.
pub const EMAIL_LAYOUT: &str = "ng_alert_notification";

/// Content type of HTML bodies.
pub const CONTENT_TYPE_HTML: &str = "text/html";

/// Content type of plain-text bodies.
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

// (registered name, source) pairs.
const TEXT_TEMPLATES: [(&str, &str); 1] = [(
    "ng_alert_notification.txt",
    include_str!("../templates/ng_alert_notification.txt.hbs"),
)];

const TEXT_PARTIALS: [(&str, &str); 3] = [
    ("default_title", "{{Title}}"),
    (
        "default_message",
        include_str!("../templates/default_message.txt.hbs"),
    ),
    (
        "alert_details_text",
        include_str!("../templates/alert_details.txt.hbs"),
    ),
];

const HTML_TEMPLATES: [(&str, &str); 1] = [(
    "ng_alert_notification.html",
    include_str!("../templates/ng_alert_notification.html.hbs"),
)];

const HTML_PARTIALS: [(&str, &str); 1] = [(
    "alert_details",
    include_str!("../templates/alert_details.html.hbs"),
)];

handlebars_helper!(firing_helper: |alerts: Json| with_status(alerts, "firing"));
handlebars_helper!(resolved_helper: |alerts: Json| with_status(alerts, "resolved"));

/// Filters a serialized alert list down to the alerts with `status`.
fn with_status(alerts: &Value, status: &str) -> Value {
    let matching = alerts
        .as_array()
        .map(|list| {
            list.iter()
                .filter(|a| a.get("Status").and_then(Value::as_str) == Some(status))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    Value::Array(matching)
}

/// Escapes text for inclusion in HTML element content or attribute values.
#[must_use]
pub fn escape_html(data: &str) -> String {
    let mut escaped = String::with_capacity(data.len());
    for c in data.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// A rendered title and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// The notification title, also used as the email subject.
    pub title: String,
    /// The rendered message; empty when no message template is configured.
    pub message: String,
}

/// Renders notification content from alert batches.
///
/// Cloning is cheap enough to give each notifier its own copy with its
/// message template registered.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    links: LinkBuilder,
    text: Handlebars<'static>,
    html: Handlebars<'static>,
}

impl TemplateRenderer {
    /// Creates a renderer that builds links under `external_url`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` if the external URL is invalid.
    pub fn new(external_url: &str) -> Result<Self> {
        let links = LinkBuilder::new(external_url)?;

        let mut text = Handlebars::new();
        text.register_escape_fn(no_escape);
        let mut html = Handlebars::new();
        html.register_escape_fn(escape_html);

        for registry in [&mut text, &mut html] {
            registry.register_helper("firing", Box::new(firing_helper));
            registry.register_helper("resolved", Box::new(resolved_helper));
        }

        for (name, source) in TEXT_PARTIALS {
            text.register_partial(name, source)
                .map_err(|e| bundled_error(name, &e))?;
        }
        for (name, source) in TEXT_TEMPLATES {
            text.register_template_string(name, source)
                .map_err(|e| bundled_error(name, &e))?;
        }
        for (name, source) in HTML_PARTIALS {
            html.register_partial(name, source)
                .map_err(|e| bundled_error(name, &e))?;
        }
        for (name, source) in HTML_TEMPLATES {
            html.register_template_string(name, source)
                .map_err(|e| bundled_error(name, &e))?;
        }

        Ok(Self { links, text, html })
    }

    /// Returns the link builder used for view models.
    #[must_use]
    pub const fn links(&self) -> &LinkBuilder {
        &self.links
    }

    /// Returns a copy of this renderer with a user message template compiled
    /// under `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` if `source` does not parse.
    pub fn with_message_template(&self, name: &str, source: &str) -> Result<Self> {
        let mut renderer = self.clone();
        renderer
            .text
            .register_template_string(name, source)
            .map_err(|e| NotifyError::invalid_config(format!("invalid message template: {e}")))?;
        Ok(renderer)
    }

    /// Returns true if a template named `name` is registered.
    #[must_use]
    pub fn has_template(&self, name: &str) -> bool {
        self.text.has_template(name)
    }

    /// Builds the view model for a batch of alerts.
    #[must_use]
    pub fn group(&self, alerts: &[Alert], group_labels: Labels) -> NotificationGroup {
        NotificationGroup::new(alerts, group_labels, &self.links, Utc::now())
    }

    /// Renders the title and, if `message_template` names a registered
    /// template, the message for `group`.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Render` if the message template fails to execute.
    pub fn render(
        &self,
        message_template: Option<&str>,
        group: &NotificationGroup,
    ) -> Result<Rendered> {
        let title = title(group);
        let message = match message_template {
            Some(name) => {
                let context = TemplateContext::new(group, &title);
                render_with(&self.text, name, &context)?
            }
            None => String::new(),
        };

        debug!(
            title = %title,
            alerts = group.alerts.len(),
            custom_message = message_template.is_some(),
            "rendered notification"
        );
        Ok(Rendered { title, message })
    }

    /// Renders a bundled layout for one content type.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::Render` if the content type is unsupported, the
    /// layout does not exist, or it fails to execute against `data`.
    pub fn render_layout(&self, layout: &str, content_type: &str, data: &Value) -> Result<String> {
        let (registry, name) = match content_type {
            CONTENT_TYPE_HTML => (&self.html, format!("{layout}.html")),
            CONTENT_TYPE_TEXT => (&self.text, format!("{layout}.txt")),
            other => {
                return Err(NotifyError::Render {
                    template: layout.to_string(),
                    reason: format!("unsupported content type '{other}'"),
                });
            }
        };

        if !registry.has_template(&name) {
            return Err(NotifyError::Render {
                template: name,
                reason: "layout not found".to_string(),
            });
        }
        render_with(registry, &name, data)
    }
}

fn render_with<T: Serialize>(registry: &Handlebars<'_>, name: &str, data: &T) -> Result<String> {
    registry.render(name, data).map_err(|e| NotifyError::Render {
        template: name.to_string(),
        reason: e.to_string(),
    })
}

fn bundled_error(name: &str, err: &impl std::fmt::Display) -> NotifyError {
    NotifyError::Render {
        template: name.to_string(),
        reason: format!("bundled template failed to compile: {err}"),
    }
}

/// Derives the notification title for a batch.
///
/// The title is `"{status} {group label values} {suffix}"`. The status part
/// counts firing and resolved alerts. For single-alert batches the suffix
/// lists the alert name followed by the remaining common label values in
/// parentheses; larger batches have no suffix.
#[must_use]
pub fn title(group: &NotificationGroup) -> String {
    let status = match (group.firing_count(), group.resolved_count()) {
        (0, resolved) => format!("[RESOLVED:{resolved}]"),
        (firing, 0) => format!("[FIRING:{firing}]"),
        (firing, resolved) => format!("[FIRING:{firing}, RESOLVED:{resolved}]"),
    };

    let group_values = group
        .group_labels
        .values()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    let suffix = if group.alerts.len() == 1 {
        let remaining: Vec<(&String, &String)> = group
            .common_labels
            .iter()
            .filter(|(k, _)| !group.group_labels.contains_key(*k))
            .collect();
        let values: Vec<&str> = remaining
            .iter()
            .filter(|(k, _)| k.as_str() == ALERT_NAME_LABEL)
            .chain(remaining.iter().filter(|(k, _)| k.as_str() != ALERT_NAME_LABEL))
            .map(|(_, v)| v.as_str())
            .collect();
        if values.is_empty() {
            String::new()
        } else {
            format!("({})", values.join(" "))
        }
    } else {
        String::new()
    };

    format!("{status} {group_values} {suffix}")
}
