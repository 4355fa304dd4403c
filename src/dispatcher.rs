use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::DispatcherConfig;
use crate::models::NotificationMessage;

/// Classified delivery failure. Neither variant is retried: a gone recipient
/// never comes back, and a stale alert is not worth blocking the queue.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("recipient gone: {0}")]
    RecipientGone(String),

    #[error("transient delivery failure: {0}")]
    Transient(String),
}

/// Delivery backend the dispatcher hands finished messages to.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, message: &NotificationMessage) -> Result<(), DeliveryError>;
}

/// Cloneable producer side of the notification queue. Enqueueing never
/// blocks; a full queue drops the message with a warning so a slow delivery
/// backend cannot stall a poll tick or a purchase attempt.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::Sender<NotificationMessage>,
}

impl DispatchHandle {
    pub fn enqueue(&self, message: NotificationMessage) {
        match self.tx.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                metrics::counter!("notifications_dropped_total").increment(1);
                tracing::warn!(
                    recipient = %message.recipient,
                    "notification queue full, dropping message"
                );
            }
            Err(TrySendError::Closed(message)) => {
                tracing::warn!(
                    recipient = %message.recipient,
                    "dispatcher stopped, dropping message"
                );
            }
        }
    }
}

/// Single consumer draining the queue in order, with a global minimum gap
/// between deliveries. Runs until every producer handle is dropped, then
/// drains whatever is left and returns.
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
    rx: mpsc::Receiver<NotificationMessage>,
    min_send_gap: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        config: &DispatcherConfig,
    ) -> (DispatchHandle, Self) {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        (
            DispatchHandle { tx },
            Self {
                notifier,
                rx,
                min_send_gap: Duration::from_millis(config.min_send_gap_ms),
            },
        )
    }

    pub async fn run(mut self) {
        tracing::info!(notifier = self.notifier.name(), "notification dispatcher started");
        while let Some(message) = self.rx.recv().await {
            self.deliver(&message).await;
            tokio::time::sleep(self.min_send_gap).await;
        }
        tracing::info!("notification dispatcher drained");
    }

    async fn deliver(&self, message: &NotificationMessage) {
        match self.notifier.deliver(message).await {
            Ok(()) => {
                metrics::counter!("notifications_delivered_total").increment(1);
                tracing::debug!(recipient = %message.recipient, "notification delivered");
            }
            Err(DeliveryError::RecipientGone(reason)) => {
                metrics::counter!("notifications_dropped_total").increment(1);
                tracing::warn!(
                    recipient = %message.recipient,
                    %reason,
                    "recipient unreachable, dropping notification"
                );
            }
            Err(DeliveryError::Transient(reason)) => {
                metrics::counter!("notifications_dropped_total").increment(1);
                tracing::warn!(
                    recipient = %message.recipient,
                    %reason,
                    "delivery failed, dropping after one attempt"
                );
            }
        }
    }
}
