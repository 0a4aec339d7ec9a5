use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::NotifierConfig;

/// Outbound channel for transition messages. Delivery problems are reported
/// through the return value, never as an error.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, message: &str) -> bool;
}

pub fn from_config(config: Option<&NotifierConfig>) -> Box<dyn Notifier> {
    match config {
        Some(NotifierConfig::Webhook { url, timeout_ms }) => {
            info!("Notifications enabled via webhook");
            Box::new(WebhookNotifier::new(url.clone(), Duration::from_millis(*timeout_ms)))
        }
        None => {
            info!("Notifications disabled: no notifier configured");
            Box::new(NullNotifier)
        }
    }
}

/// Posts `{"username", "content"}` JSON to a chat-style webhook.
pub struct WebhookNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { url, http_client }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn deliver(&self, message: &str) -> bool {
        let payload = serde_json::json!({
            "username": "Internet Monitor",
            "content": message,
        });

        match self.http_client.post(&self.url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("Notification sent successfully");
                true
            }
            Ok(resp) => {
                warn!("Failed to send notification: HTTP {}", resp.status());
                false
            }
            Err(e) => {
                warn!("Error sending notification: {}", e);
                false
            }
        }
    }
}

/// Stand-in when no channel is configured: logs and reports failure.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn deliver(&self, message: &str) -> bool {
        warn!("No notifier configured, message not sent: {}", message);
        false
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Records every message and answers from a script, then from `fallback`.
    pub struct RecordingNotifier {
        script: Mutex<VecDeque<bool>>,
        fallback: bool,
        delivered: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        pub fn succeeding() -> Self {
            Self::with(VecDeque::new(), true)
        }

        pub fn failing() -> Self {
            Self::with(VecDeque::new(), false)
        }

        pub fn scripted(outcomes: impl IntoIterator<Item = bool>) -> Self {
            Self::with(outcomes.into_iter().collect(), false)
        }

        fn with(script: VecDeque<bool>, fallback: bool) -> Self {
            Self {
                script: Mutex::new(script),
                fallback,
                delivered: Mutex::new(Vec::new()),
            }
        }

        pub fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, message: &str) -> bool {
            self.delivered.lock().unwrap().push(message.to_string());
            self.script.lock().unwrap().pop_front().unwrap_or(self.fallback)
        }
    }
}
