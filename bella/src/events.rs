use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const REPORT_TIMEOUT: Duration = Duration::from_secs(5);

/// An event pushed to the dashboard. Serialized as `{"type": .., "payload": ..}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl DashboardEvent {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Posts events to the dashboard API. Delivery is best effort: failures are logged and dropped.
#[derive(Clone)]
pub struct EventReporter {
    http: reqwest::Client,
    url: Option<String>,
}

impl EventReporter {
    pub fn new(url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.filter(|url| !url.is_empty()),
        }
    }

    pub async fn report(&self, event: &DashboardEvent) {
        let url = match self.url.as_ref() {
            Some(url) => url,
            None => return,
        };
        let result = self
            .http
            .post(url)
            .timeout(REPORT_TIMEOUT)
            .json(event)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        match result {
            Ok(_) => metrics::increment_counter!("bella_dashboard_events_sent"),
            Err(err) => tracing::warn!("Failed to report {} event to dashboard: {}", event.kind, err),
        }
    }
}
