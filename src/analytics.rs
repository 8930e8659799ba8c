//! Fire-and-forget analytics events.
//!
//! Events are posted on a spawned task with a short timeout and a single
//! attempt. An analytics failure must never surface to the user, so
//! errors are logged at debug and dropped.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::config::BotConfig;

#[derive(Debug, Serialize)]
struct EventBody {
    event_name: &'static str,
    payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    bot_user_id: Option<i64>,
    /// UUID goes over the wire as a string.
    #[serde(skip_serializing_if = "Option::is_none")]
    lead_id: Option<String>,
}

#[derive(Clone)]
pub struct Analytics {
    inner: Arc<AnalyticsInner>,
}

struct AnalyticsInner {
    http: Option<reqwest::Client>,
    endpoint: String,
    api_key: SecretString,
}

impl Analytics {
    pub fn new(config: &BotConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.analytics_timeout)
            .build()
            .ok();
        Self {
            inner: Arc::new(AnalyticsInner {
                http,
                endpoint: format!("{}/analytics/events", config.api_base_url),
                api_key: config.api_key.clone(),
            }),
        }
    }

    /// Record an event without blocking the caller.
    pub fn record(
        &self,
        event_name: &'static str,
        payload: Value,
        bot_user_id: Option<i64>,
        lead_id: Option<Uuid>,
    ) {
        let Some(http) = self.inner.http.clone() else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        let body = EventBody {
            event_name,
            payload,
            bot_user_id,
            lead_id: lead_id.map(|id| id.to_string()),
        };
        tokio::spawn(async move {
            let result = http
                .post(&inner.endpoint)
                .header(
                    "Authorization",
                    format!("Api-Key {}", inner.api_key.expose_secret()),
                )
                .json(&body)
                .send()
                .await;
            if let Err(e) = result {
                tracing::debug!(event = body.event_name, error = %e, "analytics event dropped");
            }
        });
    }
}

/// Event names shared with the backend's analytics consumers.
pub mod events {
    pub const FLOW_SELECTED: &str = "flow_selected";
    pub const CITY_SELECTED: &str = "city_selected";
    pub const CATEGORY_SELECTED: &str = "category_selected";
    pub const FORMAT_SELECTED: &str = "format_selected";
    pub const TIME_SELECTED: &str = "training_time_selected";
    pub const SCHOOL_OPENED: &str = "school_opened";
    pub const REGISTER_BUTTON_CLICKED: &str = "register_button_clicked";
    pub const TARIFF_SELECTED: &str = "tariff_selected";
    pub const LEAD_FORM_OPENED: &str = "lead_form_opened";
    pub const LEAD_SUBMITTED: &str = "lead_submitted";
    pub const WHATSAPP_OPENED: &str = "whatsapp_opened";
    pub const PRODUCT_SELECTED: &str = "product_selected";
    pub const CERTIFICATE_FLOW_STARTED: &str = "certificate_flow_started";
    pub const CERTIFICATE_ACTION_SELECTED: &str = "certificate_action_selected";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_id_serializes_as_string() {
        let id = Uuid::new_v4();
        let body = EventBody {
            event_name: events::LEAD_SUBMITTED,
            payload: serde_json::json!({"school_id": 5}),
            bot_user_id: Some(42),
            lead_id: Some(id.to_string()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["lead_id"], id.to_string());
        assert_eq!(json["event_name"], "lead_submitted");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let body = EventBody {
            event_name: events::FLOW_SELECTED,
            payload: Value::Object(Default::default()),
            bot_user_id: None,
            lead_id: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("bot_user_id").is_none());
        assert!(json.get("lead_id").is_none());
    }
}
