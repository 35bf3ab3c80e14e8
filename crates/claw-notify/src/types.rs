//! Core input types for the notification pipeline.
//!
//! - [`Labels`]: an ordered label/annotation set
//! - [`AlertStatus`]: whether an alert is firing or resolved
//! - [`Alert`]: a single alert handed to a notifier

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::Fingerprint;

/// A set of labels or annotations.
///
/// Keys are kept sorted so every rendering of the set is stable.
pub type Labels = BTreeMap<String, String>;

/// Label carrying the name of the alert rule.
pub const ALERT_NAME_LABEL: &str = "alertname";

/// Annotation holding the UID of the dashboard the alert belongs to.
pub const DASHBOARD_UID_ANNOTATION: &str = "__dashboardUid__";

/// Annotation holding the ID of the panel the alert belongs to.
pub const PANEL_ID_ANNOTATION: &str = "__panelId__";

/// Annotations that carry metadata rather than display content.
pub const METADATA_ANNOTATIONS: [&str; 2] = [DASHBOARD_UID_ANNOTATION, PANEL_ID_ANNOTATION];

/// The status of an alert or of a batch of alerts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// The alert is actively firing.
    #[default]
    Firing,
    /// The alert has been resolved.
    Resolved,
}

impl AlertStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An alert handed to a notifier for delivery.
///
/// The status is not stored: an alert whose `ends_at` lies at or before the
/// evaluation time is resolved, every other alert is firing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Identifying labels.
    pub labels: Labels,
    /// Descriptive annotations, including metadata keys.
    pub annotations: Labels,
    /// When the alert started firing.
    pub starts_at: Option<DateTime<Utc>>,
    /// When the alert stopped firing.
    pub ends_at: Option<DateTime<Utc>>,
    /// Link back to the source that generated the alert.
    #[serde(default)]
    pub generator_url: String,
}

impl Alert {
    /// Creates a firing alert with the given labels.
    #[must_use]
    pub fn new(labels: Labels) -> Self {
        Self {
            labels,
            ..Self::default()
        }
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Sets the start time.
    #[must_use]
    pub const fn with_starts_at(mut self, at: DateTime<Utc>) -> Self {
        self.starts_at = Some(at);
        self
    }

    /// Sets the end time.
    #[must_use]
    pub const fn with_ends_at(mut self, at: DateTime<Utc>) -> Self {
        self.ends_at = Some(at);
        self
    }

    /// Sets the generator URL.
    #[must_use]
    pub fn with_generator_url(mut self, url: impl Into<String>) -> Self {
        self.generator_url = url.into();
        self
    }

    /// Returns the alert status as of `now`.
    #[must_use]
    pub fn status_at(&self, now: DateTime<Utc>) -> AlertStatus {
        match self.ends_at {
            Some(ends_at) if ends_at <= now => AlertStatus::Resolved,
            _ => AlertStatus::Firing,
        }
    }

    /// Returns the current alert status.
    #[must_use]
    pub fn status(&self) -> AlertStatus {
        self.status_at(Utc::now())
    }

    /// Returns the value of the `alertname` label, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.labels.get(ALERT_NAME_LABEL).map(String::as_str)
    }

    /// Returns the label-set fingerprint of this alert.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.labels)
    }

    /// Returns the dashboard UID metadata annotation, if set and non-empty.
    #[must_use]
    pub fn dashboard_uid(&self) -> Option<&str> {
        self.metadata(DASHBOARD_UID_ANNOTATION)
    }

    /// Returns the panel ID metadata annotation, if set and non-empty.
    #[must_use]
    pub fn panel_id(&self) -> Option<&str> {
        self.metadata(PANEL_ID_ANNOTATION)
    }

    /// Returns the annotations with metadata keys removed.
    #[must_use]
    pub fn display_annotations(&self) -> Labels {
        strip_metadata(&self.annotations)
    }

    fn metadata(&self, key: &str) -> Option<&str> {
        self.annotations
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Returns a copy of `annotations` without the metadata keys.
#[must_use]
pub fn strip_metadata(annotations: &Labels) -> Labels {
    annotations
        .iter()
        .filter(|(k, _)| !METADATA_ANNOTATIONS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn always_firing() -> Alert {
        Alert::default()
            .with_label("alertname", "AlwaysFiring")
            .with_label("severity", "warning")
            .with_annotation("runbook_url", "http://fix.me")
            .with_annotation(DASHBOARD_UID_ANNOTATION, "abc")
            .with_annotation(PANEL_ID_ANNOTATION, "5")
    }

    #[test]
    fn status_as_str() {
        assert_eq!(AlertStatus::Firing.as_str(), "firing");
        assert_eq!(AlertStatus::Resolved.as_str(), "resolved");
        assert_eq!(AlertStatus::Resolved.to_string(), "resolved");
    }

    #[test]
    fn status_serialization_roundtrip() {
        let json = serde_json::to_string(&AlertStatus::Firing).expect("serialize");
        assert_eq!(json, "\"firing\"");
        let parsed: AlertStatus = serde_json::from_str("\"resolved\"").expect("deserialize");
        assert_eq!(parsed, AlertStatus::Resolved);
    }

    #[test]
    fn alert_without_end_is_firing() {
        assert_eq!(always_firing().status(), AlertStatus::Firing);
    }

    #[test]
    fn alert_with_past_end_is_resolved() {
        let now = Utc::now();
        let alert = always_firing().with_ends_at(now - Duration::minutes(5));
        assert_eq!(alert.status_at(now), AlertStatus::Resolved);
    }

    #[test]
    fn alert_with_future_end_is_firing() {
        let now = Utc::now();
        let alert = always_firing().with_ends_at(now + Duration::minutes(5));
        assert_eq!(alert.status_at(now), AlertStatus::Firing);
    }

    #[test]
    fn alert_end_equal_to_now_is_resolved() {
        let now = Utc::now();
        let alert = always_firing().with_ends_at(now);
        assert_eq!(alert.status_at(now), AlertStatus::Resolved);
    }

    #[test]
    fn alert_metadata_accessors() {
        let alert = always_firing();
        assert_eq!(alert.name(), Some("AlwaysFiring"));
        assert_eq!(alert.dashboard_uid(), Some("abc"));
        assert_eq!(alert.panel_id(), Some("5"));
    }

    #[test]
    fn empty_metadata_is_absent() {
        let alert = Alert::default().with_annotation(DASHBOARD_UID_ANNOTATION, "");
        assert_eq!(alert.dashboard_uid(), None);
        assert_eq!(alert.panel_id(), None);
    }

    #[test]
    fn display_annotations_strip_metadata() {
        let annotations = always_firing().display_annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations.get("runbook_url").map(String::as_str), Some("http://fix.me"));
    }

    #[test]
    fn alert_deserializes_from_camel_case() {
        let alert: Alert = serde_json::from_value(serde_json::json!({
            "labels": {"alertname": "DiskFull"},
            "annotations": {},
            "endsAt": "2021-01-01T00:00:00Z"
        }))
        .expect("deserialize");
        assert_eq!(alert.name(), Some("DiskFull"));
        assert_eq!(alert.status(), AlertStatus::Resolved);
    }
}
