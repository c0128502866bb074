//! Notification sink for deploy progress

pub mod format;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use format::ProgressFormatter;

/// Error types for notification delivery
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Request error: {0}")]
    Request(String),

    #[error("Webhook rejected notification with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// One attachment of a notification
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pretext: Option<String>,

    pub color: String,

    pub title: String,

    pub text: String,

    /// Fields rendered as markdown
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mrkdwn_in: Vec<String>,
}

/// Structured message handed to a `Notifier`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
}

impl NotificationPayload {
    /// Attach channel/username/icon metadata
    pub fn with_metadata(
        mut self,
        channel: Option<String>,
        username: impl Into<String>,
        icon_emoji: impl Into<String>,
    ) -> Self {
        self.channel = channel;
        self.username = Some(username.into());
        self.icon_emoji = Some(icon_emoji.into());
        self
    }
}

/// Receipt of a delivered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationHandle {
    /// HTTP status (0 for sinks without one)
    pub status: u16,

    /// Response body returned by the sink
    pub body: String,
}

/// Trait for notification delivery - allows for different sinks
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> Result<NotificationHandle, NotifyError>;
}

/// Posts payloads as JSON to a Slack-compatible incoming webhook
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    http: reqwest::Client,
    endpoint: String,
}

impl SlackNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, payload: &NotificationPayload) -> Result<NotificationHandle, NotifyError> {
        debug!("Posting notification to webhook");

        let resp = self
            .http
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(NotificationHandle {
            status: status.as_u16(),
            body,
        })
    }
}

/// Writes payloads to the log instead of delivering them
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, payload: &NotificationPayload) -> Result<NotificationHandle, NotifyError> {
        let json = serde_json::to_string_pretty(payload)?;
        info!("[deploy] Notification:\n{}", json);
        Ok(NotificationHandle {
            status: 0,
            body: json,
        })
    }
}
