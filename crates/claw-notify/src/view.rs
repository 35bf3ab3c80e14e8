//! Rendering-facing view models.
//!
//! Field names of the serialized forms are part of the template surface and
//! must not change: templates address them as `Status`, `Labels`,
//! `SilenceURL`, `CommonLabels`, `RuleUrl` and so on.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::fingerprint::Fingerprint;
use crate::links::LinkBuilder;
use crate::types::{Alert, AlertStatus, Labels};

/// An alert projected for rendering, with its links resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedAlert {
    /// Firing or resolved.
    #[serde(rename = "Status")]
    pub status: AlertStatus,
    /// All labels of the alert.
    #[serde(rename = "Labels")]
    pub labels: Labels,
    /// Annotations without the metadata keys.
    #[serde(rename = "Annotations")]
    pub annotations: Labels,
    /// Label-set fingerprint.
    #[serde(rename = "Fingerprint")]
    pub fingerprint: Fingerprint,
    /// Link to create a silence matching this alert.
    #[serde(rename = "SilenceURL")]
    pub silence_url: String,
    /// Link to the alert's dashboard, empty if unknown.
    #[serde(rename = "DashboardURL")]
    pub dashboard_url: String,
    /// Link to the alert's panel, empty if unknown.
    #[serde(rename = "PanelURL")]
    pub panel_url: String,
}

impl ExtendedAlert {
    /// Projects `alert` as of `now`.
    #[must_use]
    pub fn new(alert: &Alert, links: &LinkBuilder, now: DateTime<Utc>) -> Self {
        let dashboard_uid = alert.dashboard_uid();
        Self {
            status: alert.status_at(now),
            labels: alert.labels.clone(),
            annotations: alert.display_annotations(),
            fingerprint: alert.fingerprint(),
            silence_url: links.silence_url(&alert.labels),
            dashboard_url: links.dashboard_url(dashboard_uid),
            panel_url: links.panel_url(dashboard_uid, alert.panel_id()),
        }
    }
}

/// An ordered list of extended alerts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtendedAlerts(pub Vec<ExtendedAlert>);

impl ExtendedAlerts {
    /// Alerts that are firing, in batch order.
    pub fn firing(&self) -> impl Iterator<Item = &ExtendedAlert> {
        self.with_status(AlertStatus::Firing)
    }

    /// Alerts that are resolved, in batch order.
    pub fn resolved(&self) -> impl Iterator<Item = &ExtendedAlert> {
        self.with_status(AlertStatus::Resolved)
    }

    /// Number of alerts in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all alerts in batch order.
    pub fn iter(&self) -> std::slice::Iter<'_, ExtendedAlert> {
        self.0.iter()
    }

    fn with_status(&self, status: AlertStatus) -> impl Iterator<Item = &ExtendedAlert> {
        self.0.iter().filter(move |a| a.status == status)
    }
}

/// A batch of alerts prepared for a single notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationGroup {
    /// Firing if any alert in the batch is firing.
    #[serde(rename = "Status")]
    pub status: AlertStatus,
    /// The alerts, in the order they were supplied.
    #[serde(rename = "Alerts")]
    pub alerts: ExtendedAlerts,
    /// Labels the batch was grouped by.
    #[serde(rename = "GroupLabels")]
    pub group_labels: Labels,
    /// Labels shared by every alert in the batch.
    #[serde(rename = "CommonLabels")]
    pub common_labels: Labels,
    /// Display annotations shared by every alert in the batch.
    #[serde(rename = "CommonAnnotations")]
    pub common_annotations: Labels,
    /// Base URL links are built under.
    #[serde(rename = "ExternalURL")]
    pub external_url: String,
    /// Link to the alert rule list.
    #[serde(rename = "RuleUrl")]
    pub rule_url: String,
    /// Link to the alert list filtered by the batch status.
    #[serde(rename = "AlertPageUrl")]
    pub alert_page_url: String,
}

impl NotificationGroup {
    /// Builds the view model for `alerts` as of `now`.
    #[must_use]
    pub fn new(
        alerts: &[Alert],
        group_labels: Labels,
        links: &LinkBuilder,
        now: DateTime<Utc>,
    ) -> Self {
        let alerts = ExtendedAlerts(
            alerts
                .iter()
                .map(|alert| ExtendedAlert::new(alert, links, now))
                .collect(),
        );

        let status = if alerts.firing().next().is_some() {
            AlertStatus::Firing
        } else {
            AlertStatus::Resolved
        };

        let common_labels = intersect(alerts.iter().map(|a| &a.labels));
        let common_annotations = intersect(alerts.iter().map(|a| &a.annotations));

        Self {
            status,
            alerts,
            group_labels,
            common_labels,
            common_annotations,
            external_url: links.external_url().to_string(),
            rule_url: links.rule_url(),
            alert_page_url: links.alert_page_url(status),
        }
    }

    /// Number of firing alerts.
    #[must_use]
    pub fn firing_count(&self) -> usize {
        self.alerts.firing().count()
    }

    /// Number of resolved alerts.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.alerts.resolved().count()
    }
}

/// Key/value pairs present with the same value in every set.
fn intersect<'a>(mut sets: impl Iterator<Item = &'a Labels>) -> Labels {
    let Some(first) = sets.next() else {
        return Labels::new();
    };
    let mut common = first.clone();
    for set in sets {
        common.retain(|k, v| set.get(k) == Some(v));
    }
    common
}

/// The context user-supplied message templates are rendered against.
///
/// Same fields as [`NotificationGroup`] plus `Title`, except that `Alerts`
/// is split into `Alerts.All`, `Alerts.Firing` and `Alerts.Resolved`.
#[derive(Debug, Serialize)]
pub struct TemplateContext<'a> {
    /// The rendered notification title.
    #[serde(rename = "Title")]
    pub title: &'a str,
    /// Batch status.
    #[serde(rename = "Status")]
    pub status: AlertStatus,
    /// The alerts, partitioned by status.
    #[serde(rename = "Alerts")]
    pub alerts: AlertsByStatus<'a>,
    /// Labels the batch was grouped by.
    #[serde(rename = "GroupLabels")]
    pub group_labels: &'a Labels,
    /// Labels shared by every alert.
    #[serde(rename = "CommonLabels")]
    pub common_labels: &'a Labels,
    /// Annotations shared by every alert.
    #[serde(rename = "CommonAnnotations")]
    pub common_annotations: &'a Labels,
    /// Base URL.
    #[serde(rename = "ExternalURL")]
    pub external_url: &'a str,
    /// Rule list link.
    #[serde(rename = "RuleUrl")]
    pub rule_url: &'a str,
    /// Alert page link.
    #[serde(rename = "AlertPageUrl")]
    pub alert_page_url: &'a str,
}

/// Alerts of a batch split by status.
#[derive(Debug, Serialize)]
pub struct AlertsByStatus<'a> {
    /// Every alert, in batch order.
    #[serde(rename = "All")]
    pub all: Vec<&'a ExtendedAlert>,
    /// Firing alerts, in batch order.
    #[serde(rename = "Firing")]
    pub firing: Vec<&'a ExtendedAlert>,
    /// Resolved alerts, in batch order.
    #[serde(rename = "Resolved")]
    pub resolved: Vec<&'a ExtendedAlert>,
}

impl<'a> TemplateContext<'a> {
    /// Borrows `group` together with its rendered title.
    #[must_use]
    pub fn new(group: &'a NotificationGroup, title: &'a str) -> Self {
        Self {
            title,
            status: group.status,
            alerts: AlertsByStatus {
                all: group.alerts.iter().collect(),
                firing: group.alerts.firing().collect(),
                resolved: group.alerts.resolved().collect(),
            },
            group_labels: &group.group_labels,
            common_labels: &group.common_labels,
            common_annotations: &group.common_annotations,
            external_url: &group.external_url,
            rule_url: &group.rule_url,
            alert_page_url: &group.alert_page_url,
        }
    }
}
