use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio::sync::Mutex;

use crate::config::WebhookConfig;
use crate::dispatcher::{DeliveryError, Notifier};
use crate::models::NotificationMessage;
use crate::utils::error::AppError;

/// Delivers messages by POSTing them to a webhook endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    username: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, config: &WebhookConfig) -> Result<Self, AppError> {
        Ok(Self {
            client: Client::builder().build()?,
            url: url.into(),
            username: config.username.clone(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        let payload = json!({
            "username": self.username,
            "content": format!("<@{}> {}", message.recipient, message.text),
            "channel": message.channel.map(|c| c.0),
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|err| DeliveryError::Transient(err.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN | StatusCode::GONE => Err(
                DeliveryError::RecipientGone(format!("webhook returned {}", response.status())),
            ),
            status => Err(DeliveryError::Transient(format!("webhook returned {status}"))),
        }
    }
}

/// Logs deliveries instead of sending them; the fallback backend when no
/// webhook is configured.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        tracing::info!(
            recipient = %message.recipient,
            channel = ?message.channel,
            "{}",
            message.text
        );
        Ok(())
    }
}

/// Captures every delivered message in memory, for tests and demo harnesses.
#[derive(Default)]
pub struct CollectingNotifier {
    messages: Mutex<Vec<NotificationMessage>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<NotificationMessage> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    fn name(&self) -> &str {
        "collecting"
    }

    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError> {
        self.messages.lock().await.push(message.clone());
        Ok(())
    }
}
