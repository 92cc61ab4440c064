//! Notification delivery for new alerts

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{Alert, NotificationChannel, Severity};

/// Result of sending a notification
#[derive(Debug, Clone)]
pub struct NotificationResult {
    /// Channel kind, such as "webhook"
    pub channel_type: String,
    /// Whether delivery succeeded
    pub success: bool,
    /// Failure reason when delivery did not succeed
    pub error: Option<String>,
    /// When delivery was attempted
    pub sent_at: DateTime<Utc>,
}

/// Receives every alert right after it has been stored
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Deliver an alert. Failures are reported, never raised.
    async fn notify(&self, alert: &Alert) -> Vec<NotificationResult>;
}

/// Sends notifications through the configured channels
pub struct NotificationSender {
    client: Client,
    channels: Vec<NotificationChannel>,
}

impl NotificationSender {
    /// Create a new notification sender
    pub fn new(channels: Vec<NotificationChannel>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, channels })
    }

    /// Configured channels
    pub fn channels(&self) -> &[NotificationChannel] {
        &self.channels
    }

    /// Send a single notification
    pub async fn send(&self, channel: &NotificationChannel, alert: &Alert) -> NotificationResult {
        let sent_at = Utc::now();

        let result = match channel {
            NotificationChannel::Slack {
                webhook_url,
                channel: slack_channel,
            } => self.send_slack(webhook_url, slack_channel.as_deref(), alert).await,
            NotificationChannel::Webhook { url, headers } => {
                self.send_webhook(url, headers.as_ref(), alert).await
            }
            NotificationChannel::PagerDuty {
                routing_key,
                events_url,
            } => self.send_pagerduty(events_url, routing_key, alert).await,
        };

        if let Err(e) = &result {
            warn!(alert_id = %alert.id, channel = channel.kind(), error = %e, "Notification failed");
        }

        NotificationResult {
            channel_type: channel.kind().to_string(),
            success: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
            sent_at,
        }
    }

    /// Send Slack notification
    async fn send_slack(
        &self,
        webhook_url: &str,
        channel: Option<&str>,
        alert: &Alert,
    ) -> std::result::Result<(), NotificationError> {
        let color = match alert.severity {
            Severity::Critical => "#dc3545",
            Severity::Warning => "#ffc107",
            Severity::Info => "#17a2b8",
        };

        let unit = alert.unit.as_str();
        let bound = |b: Option<f64>| b.map_or_else(|| "-".to_string(), |v| format!("{v:.1}°{unit}"));

        let payload = SlackPayload {
            channel: channel.map(String::from),
            username: Some("Coldwatch".to_string()),
            attachments: vec![SlackAttachment {
                color: color.to_string(),
                title: format!("Temperature alert: {}", alert.equipment_id),
                text: alert.message.clone(),
                fields: vec![
                    SlackField {
                        title: "Severity".to_string(),
                        value: alert.severity.as_str().to_string(),
                        short: true,
                    },
                    SlackField {
                        title: "Reading".to_string(),
                        value: format!("{:.1}°{}", alert.temperature, unit),
                        short: true,
                    },
                    SlackField {
                        title: "Acceptable range".to_string(),
                        value: format!("{} to {}", bound(alert.threshold.min), bound(alert.threshold.max)),
                        short: true,
                    },
                    SlackField {
                        title: "Location".to_string(),
                        value: alert.location_id.clone(),
                        short: true,
                    },
                ],
                footer: Some("Coldwatch HACCP monitoring".to_string()),
                ts: Some(alert.created_at.timestamp()),
            }],
        };

        let response = self
            .client
            .post(webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::HttpError(format!(
                "Slack returned {}: {}",
                status, body
            )));
        }

        info!(alert_id = %alert.id, "Slack notification sent");
        Ok(())
    }

    /// Send generic webhook notification
    async fn send_webhook(
        &self,
        url: &str,
        headers: Option<&serde_json::Value>,
        alert: &Alert,
    ) -> std::result::Result<(), NotificationError> {
        let payload = WebhookPayload {
            event: "alert.created",
            alert,
        };

        let mut request = self.client.post(url).json(&payload);

        if let Some(headers_map) = headers.and_then(|h| h.as_object()) {
            for (key, value) in headers_map {
                if let Some(value_str) = value.as_str() {
                    request = request.header(key, value_str);
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::HttpError(format!(
                "Webhook returned {}: {}",
                status, body
            )));
        }

        info!(alert_id = %alert.id, url = %url, "Webhook notification sent");
        Ok(())
    }

    /// Send PagerDuty notification
    async fn send_pagerduty(
        &self,
        events_url: &str,
        routing_key: &str,
        alert: &Alert,
    ) -> std::result::Result<(), NotificationError> {
        let severity = match alert.severity {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };

        let payload = PagerDutyPayload {
            routing_key: routing_key.to_string(),
            event_action: "trigger".to_string(),
            dedup_key: Some(alert.id.to_string()),
            payload: PagerDutyEventPayload {
                summary: format!("[{}] {}", severity.to_uppercase(), alert.message),
                source: format!("coldwatch/{}/{}", alert.location_id, alert.equipment_id),
                severity: severity.to_string(),
                timestamp: Some(alert.created_at.to_rfc3339()),
                custom_details: Some(serde_json::json!({
                    "temperature_log_id": alert.temperature_log_id.to_string(),
                    "temperature": alert.temperature,
                    "unit": alert.unit.as_str(),
                    "threshold_min": alert.threshold.min,
                    "threshold_max": alert.threshold.max,
                    "direction": alert.direction.as_str(),
                })),
            },
        };

        let response = self
            .client
            .post(events_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotificationError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::HttpError(format!(
                "PagerDuty returned {}: {}",
                status, body
            )));
        }

        info!(alert_id = %alert.id, "PagerDuty notification sent");
        Ok(())
    }
}

#[async_trait]
impl AlertNotifier for NotificationSender {
    async fn notify(&self, alert: &Alert) -> Vec<NotificationResult> {
        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            results.push(self.send(channel, alert).await);
        }

        results
    }
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Request failed or returned a non-success status
    #[error("HTTP error: {0}")]
    HttpError(String),
}

// Slack payload types
#[derive(Debug, Serialize)]
struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    color: String,
    title: String,
    text: String,
    fields: Vec<SlackField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

// Generic webhook payload
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    alert: &'a Alert,
}

// PagerDuty payload types
#[derive(Debug, Serialize)]
struct PagerDutyPayload {
    routing_key: String,
    event_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dedup_key: Option<String>,
    payload: PagerDutyEventPayload,
}

#[derive(Debug, Serialize)]
struct PagerDutyEventPayload {
    summary: String,
    source: String,
    severity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::{AlertLifecycle, DeviationSeverityPolicy};
    use crate::compliance::statistics::tests::create_test_reading;
    use crate::db::MemoryStore;
    use crate::models::AlertDirection;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_alert() -> Alert {
        let lifecycle = AlertLifecycle::new(
            Arc::new(MemoryStore::new()),
            Arc::new(DeviationSeverityPolicy::default()),
            3,
        );
        let reading = create_test_reading("walkin-1", 55.0, Utc::now());
        lifecycle.build(&reading, AlertDirection::High, None).unwrap()
    }

    #[tokio::test]
    async fn test_webhook_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/alerts"))
            .and(header("x-api-key", "secret"))
            .and(body_partial_json(serde_json::json!({
                "event": "alert.created",
                "alert": { "equipmentId": "walkin-1", "direction": "high", "status": "active" }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sender = NotificationSender::new(
            vec![NotificationChannel::Webhook {
                url: format!("{}/hooks/alerts", server.uri()),
                headers: Some(serde_json::json!({ "x-api-key": "secret" })),
            }],
            Duration::from_secs(5),
        )
        .unwrap();

        let results = sender.notify(&sample_alert()).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success, "{:?}", results[0].error);
        assert_eq!(results[0].channel_type, "webhook");
    }

    #[tokio::test]
    async fn test_failed_delivery_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sender = NotificationSender::new(
            vec![
                NotificationChannel::Slack {
                    webhook_url: format!("{}/slack", server.uri()),
                    channel: None,
                },
                NotificationChannel::PagerDuty {
                    routing_key: "key".to_string(),
                    events_url: format!("{}/pd", server.uri()),
                },
            ],
            Duration::from_secs(5),
        )
        .unwrap();

        let results = sender.notify(&sample_alert()).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert!(results[0].error.as_deref().unwrap().contains("500"));
        assert_eq!(results[1].channel_type, "pagerduty");
    }
}
