// Scan notifications
//
// Posts a short summary of each HTTP-triggered scan to a Slack incoming
// webhook. Delivery runs on a detached task and never affects the scan.

use crate::gateway::{ExecutionStatus, ScanOutcome};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for a single webhook POST
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Summary of one finished scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanNotification {
    pub tool: String,
    pub target: String,
    pub status: ExecutionStatus,
    pub duration_ms: f64,
    pub output_truncated: bool,
    pub host: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ScanNotification {
    pub fn from_outcome(outcome: &ScanOutcome) -> Self {
        Self {
            tool: outcome.tool.clone(),
            target: outcome.target.clone(),
            status: outcome.result.status,
            duration_ms: outcome.result.duration_ms,
            output_truncated: outcome.result.output_truncated,
            host: local_hostname(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// One-line message text
    pub fn text(&self) -> String {
        let mut text = format!(
            "[recon-gateway] {} on {}: {} in {:.1}s (host {})",
            self.tool,
            self.target,
            self.status.as_str(),
            self.duration_ms / 1000.0,
            self.host
        );
        if self.output_truncated {
            text.push_str(", output truncated");
        }
        text
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Destination for scan notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &ScanNotification) -> Result<()>;
}

/// Slack incoming-webhook notifier
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }

    fn payload(notification: &ScanNotification) -> serde_json::Value {
        serde_json::json!({
            "text": notification.text(),
            "blocks": [
                {
                    "type": "section",
                    "fields": [
                        {
                            "type": "mrkdwn",
                            "text": format!("*Tool:*\n{}", notification.tool)
                        },
                        {
                            "type": "mrkdwn",
                            "text": format!("*Target:*\n{}", notification.target)
                        },
                        {
                            "type": "mrkdwn",
                            "text": format!("*Status:*\n{}", notification.status.as_str())
                        },
                        {
                            "type": "mrkdwn",
                            "text": format!("*Duration:*\n{:.1}s", notification.duration_ms / 1000.0)
                        }
                    ]
                },
                {
                    "type": "context",
                    "elements": [
                        {
                            "type": "mrkdwn",
                            "text": format!("{} at {}", notification.host, notification.timestamp.to_rfc3339())
                        }
                    ]
                }
            ]
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, notification: &ScanNotification) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .timeout(DELIVERY_TIMEOUT)
            .json(&Self::payload(notification))
            .send()
            .await
            .context("Failed to send Slack webhook")?;

        if !response.status().is_success() {
            anyhow::bail!("Slack webhook returned error status: {}", response.status());
        }

        debug!("Sent Slack notification for {} on {}", notification.tool, notification.target);
        Ok(())
    }
}

/// Deliver `notification` on a detached task. Failures are only logged.
pub fn spawn_notify(notifier: Arc<dyn Notifier>, notification: ScanNotification) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notification).await {
            warn!(
                "Failed to deliver notification for {} on {}: {:#}",
                notification.tool, notification.target, e
            );
        }
    });
}
