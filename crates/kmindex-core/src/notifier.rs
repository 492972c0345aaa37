//! Review notifications for modules whose content changed materially.
//!
//! Notifications are fire-and-forget: they never block the caller and
//! never fail the operation that raised them.

use std::time::Duration;

use tracing::{debug, warn};

/// Receives "this module needs human review" signals.
pub trait ReviewNotifier: Send + Sync {
    /// Flag a module for review. Must return promptly.
    fn mark_for_review(&self, module_id: &str, reason: &str);
}

/// Notifier that only records the request in the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl ReviewNotifier for LogNotifier {
    fn mark_for_review(&self, module_id: &str, reason: &str) {
        warn!(module_id = %module_id, reason = %reason, "Module flagged for review");
    }
}

/// Posts review notifications to an HTTP endpoint.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        debug!(url = %url, "WebhookNotifier initialized");
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            url: url.to_string(),
        }
    }

    async fn send(client: reqwest::Client, url: String, payload: serde_json::Value) {
        let module_id = payload["data"]["module_id"].as_str().unwrap_or_default().to_string();
        match client.post(&url).json(&payload).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    debug!(module_id = %module_id, "Review notification sent");
                } else {
                    warn!(
                        module_id = %module_id,
                        status_code = %response.status(),
                        "Review notification failed with status"
                    );
                }
            }
            Err(e) => {
                debug!(
                    module_id = %module_id,
                    error = %e,
                    url = %url,
                    "Failed to send review notification (webhook may be unreachable)"
                );
            }
        }
    }
}

impl ReviewNotifier for WebhookNotifier {
    fn mark_for_review(&self, module_id: &str, reason: &str) {
        let payload = serde_json::json!({
            "type": "ModuleNeedsReview",
            "data": {
                "module_id": module_id,
                "reason": reason,
                "flagged_at": chrono::Utc::now().to_rfc3339(),
            }
        });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(Self::send(self.client.clone(), self.url.clone(), payload));
            }
            Err(_) => {
                warn!(
                    module_id = %module_id,
                    reason = %reason,
                    "No async runtime available; review notification only logged"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_without_runtime_does_not_panic() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/review");
        notifier.mark_for_review("m1", "body length changed by 20%");
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_silent() {
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/review");
        notifier.mark_for_review("m1", "step count changed");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
