//! outbound status change notifications.
//!
//! every activation status transition produces a [`StatusChangeEvent`]. the
//! event is enqueued only after the transition and its history entry are
//! durable; delivery is at-least-once with a bounded retry budget and never
//! blocks or fails the initiating request.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use signet_types::ActivationStatus;

/// event sent when an activation changes status.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeEvent {
    /// activation that transitioned.
    pub activation_id: String,
    /// owning application.
    pub application_id: i64,
    /// status after the transition.
    pub activation_status: ActivationStatus,
    /// when the transition was committed.
    pub timestamp: DateTime<Utc>,
}

/// sink for activation status change events.
///
/// `notify` must be cheap and non-blocking; implementations queue the event
/// and deliver it out-of-band.
pub trait CallbackSink: Send + Sync {
    /// enqueue one event for delivery.
    fn notify(&self, event: StatusChangeEvent);
}

/// sink that drops all events. used when no callback url is configured.
#[derive(Debug, Default)]
pub struct NullCallbackSink;

impl CallbackSink for NullCallbackSink {
    fn notify(&self, event: StatusChangeEvent) {
        debug!(
            activation_id = %event.activation_id,
            status = ?event.activation_status,
            "status change (no callback sink configured)"
        );
    }
}

/// sink that POSTs events as JSON to a webhook url.
///
/// events flow through an unbounded channel into a single worker task; each
/// event gets `max_attempts` delivery tries with a fixed backoff. exhausted
/// events are logged and dropped - the retry budget bounds at-least-once, the
/// initiating request never observes delivery failures.
pub struct WebhookCallbackSink {
    sender: mpsc::UnboundedSender<StatusChangeEvent>,
}

impl WebhookCallbackSink {
    /// create the sink and spawn its delivery worker.
    pub fn new(url: String, max_attempts: u32, retry_backoff_ms: u64) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<StatusChangeEvent>();

        tokio::spawn(async move {
            let client = reqwest::Client::new();
            while let Some(event) = receiver.recv().await {
                let mut delivered = false;
                for attempt in 1..=max_attempts.max(1) {
                    match client.post(&url).json(&event).send().await {
                        Ok(response) if response.status().is_success() => {
                            debug!(
                                activation_id = %event.activation_id,
                                attempt,
                                "callback delivered"
                            );
                            delivered = true;
                            break;
                        }
                        Ok(response) => {
                            warn!(
                                activation_id = %event.activation_id,
                                attempt,
                                status = %response.status(),
                                "callback rejected"
                            );
                        }
                        Err(e) => {
                            warn!(
                                activation_id = %event.activation_id,
                                attempt,
                                error = %e,
                                "callback delivery failed"
                            );
                        }
                    }
                    if attempt < max_attempts {
                        tokio::time::sleep(std::time::Duration::from_millis(retry_backoff_ms))
                            .await;
                    }
                }
                if !delivered {
                    warn!(
                        activation_id = %event.activation_id,
                        "callback dropped after exhausting retry budget"
                    );
                }
            }
        });

        Self { sender }
    }
}

impl CallbackSink for WebhookCallbackSink {
    fn notify(&self, event: StatusChangeEvent) {
        // worker gone means shutdown; nothing useful left to do with the event
        let _ = self.sender.send(event);
    }
}

/// build the sink configured for this deployment.
pub fn sink_from_config(config: &signet_types::CallbackConfig) -> std::sync::Arc<dyn CallbackSink> {
    match &config.url {
        Some(url) => std::sync::Arc::new(WebhookCallbackSink::new(
            url.clone(),
            config.max_attempts,
            config.retry_backoff_ms,
        )),
        None => std::sync::Arc::new(NullCallbackSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    fn event() -> StatusChangeEvent {
        StatusChangeEvent {
            activation_id: "a-1".to_string(),
            application_id: 1,
            activation_status: ActivationStatus::Active,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn webhook_posts_event_as_json() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/"))
            .and(matchers::body_partial_json(serde_json::json!({
                "activationId": "a-1",
                "activationStatus": "ACTIVE",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookCallbackSink::new(server.uri(), 3, 10);
        sink.notify(event());

        // give the worker a moment to deliver before the mock asserts
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn webhook_retries_on_failure() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let sink = WebhookCallbackSink::new(server.uri(), 3, 10);
        sink.notify(event());

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    }

    #[tokio::test]
    async fn null_sink_accepts_events() {
        let sink = NullCallbackSink;
        sink.notify(event());
    }
}
