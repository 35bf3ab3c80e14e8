//! Absolute links embedded in notifications.

use url::{form_urlencoded, Url};

use crate::error::{NotifyError, Result};
use crate::types::{AlertStatus, Labels};

/// Builds silence, dashboard, panel and rule-list links under an external URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    /// Creates a builder for the given external URL.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::InvalidConfig` if `external_url` is not an absolute URL.
    pub fn new(external_url: &str) -> Result<Self> {
        let parsed = Url::parse(external_url).map_err(|e| {
            NotifyError::invalid_config(format!("invalid external URL '{external_url}': {e}"))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(NotifyError::invalid_config(format!(
                "external URL '{external_url}' cannot be used as a base"
            )));
        }

        Ok(Self {
            base: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the external URL without a trailing slash.
    #[must_use]
    pub fn external_url(&self) -> &str {
        &self.base
    }

    /// Link that opens the silence editor pre-filled with `labels` as matchers.
    #[must_use]
    pub fn silence_url(&self, labels: &Labels) -> String {
        let matchers = labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        let escaped: String = form_urlencoded::byte_serialize(matchers.as_bytes()).collect();
        format!(
            "{}/alerting/silence/new?alertmanager=grafana&matchers={escaped}",
            self.base
        )
    }

    /// Dashboard link, or an empty string when no dashboard is known.
    #[must_use]
    pub fn dashboard_url(&self, dashboard_uid: Option<&str>) -> String {
        dashboard_uid.map_or_else(String::new, |uid| format!("{}/d/{uid}", self.base))
    }

    /// Panel link, or an empty string unless both dashboard and panel are known.
    #[must_use]
    pub fn panel_url(&self, dashboard_uid: Option<&str>, panel_id: Option<&str>) -> String {
        match (dashboard_uid, panel_id) {
            (Some(uid), Some(panel)) => {
                format!("{}?viewPanel={panel}", self.dashboard_url(Some(uid)))
            }
            _ => String::new(),
        }
    }

    /// Link to the alert rule list.
    #[must_use]
    pub fn rule_url(&self) -> String {
        format!("{}/alerting/list", self.base)
    }

    /// Link to the alert list filtered to `status`.
    #[must_use]
    pub fn alert_page_url(&self, status: AlertStatus) -> String {
        format!("{}/alerting/list?alertState={status}&view=state", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn builder() -> LinkBuilder {
        LinkBuilder::new("http://localhost/base").expect("valid url")
    }

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test_case("http://localhost/base", "http://localhost/base" ; "path without slash")]
    #[test_case("http://localhost/base/", "http://localhost/base" ; "path with slash")]
    #[test_case("http://localhost", "http://localhost" ; "host only")]
    #[test_case("https://grafana.example.com:3000/", "https://grafana.example.com:3000" ; "port")]
    fn external_url_normalized(input: &str, expected: &str) {
        let links = LinkBuilder::new(input).expect("valid url");
        assert_eq!(links.external_url(), expected);
    }

    #[test_case("" ; "empty")]
    #[test_case("localhost/base" ; "relative")]
    #[test_case("mailto:ops@example.com" ; "not a base")]
    fn invalid_external_url(input: &str) {
        let err = LinkBuilder::new(input).expect_err("should be rejected");
        assert!(matches!(err, NotifyError::InvalidConfig { .. }));
    }

    #[test]
    fn silence_url_escapes_matchers() {
        let url = builder().silence_url(&labels(&[("severity", "warning"), ("alertname", "AlwaysFiring")]));
        assert_eq!(
            url,
            "http://localhost/base/alerting/silence/new?alertmanager=grafana&matchers=alertname%3DAlwaysFiring%2Cseverity%3Dwarning"
        );
    }

    #[test]
    fn silence_url_escapes_special_values() {
        let url = builder().silence_url(&labels(&[("path", "/var/log & more")]));
        assert!(url.ends_with("matchers=path%3D%2Fvar%2Flog+%26+more"));
    }

    #[test]
    fn dashboard_and_panel_urls() {
        let links = builder();
        assert_eq!(links.dashboard_url(Some("abc")), "http://localhost/base/d/abc");
        assert_eq!(
            links.panel_url(Some("abc"), Some("5")),
            "http://localhost/base/d/abc?viewPanel=5"
        );
    }

    #[test]
    fn missing_dashboard_gives_empty_urls() {
        let links = builder();
        assert_eq!(links.dashboard_url(None), "");
        assert_eq!(links.panel_url(None, Some("5")), "");
        assert_eq!(links.panel_url(Some("abc"), None), "");
    }

    #[test]
    fn rule_and_alert_page_urls() {
        let links = builder();
        assert_eq!(links.rule_url(), "http://localhost/base/alerting/list");
        assert_eq!(
            links.alert_page_url(AlertStatus::Firing),
            "http://localhost/base/alerting/list?alertState=firing&view=state"
        );
        assert_eq!(
            links.alert_page_url(AlertStatus::Resolved),
            "http://localhost/base/alerting/list?alertState=resolved&view=state"
        );
    }
}
