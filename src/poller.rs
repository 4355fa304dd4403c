use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::PollerConfig;
use crate::dispatcher::DispatchHandle;
use crate::models::{NotificationMessage, ProductKey, StockChangeEvent, StockState};
use crate::retailers::{RetailerRegistry, StockStatus};
use crate::subscriptions::SubscriptionRegistry;

/// Periodically re-checks every tracked product, diffs the result against the
/// last known state, and publishes a change event per real transition.
///
/// The poller exclusively owns the per-key `StockState`; everything else only
/// sees immutable clones inside events. Each tick fans out concurrently up to
/// `max_in_flight` checks and fully completes before the next tick starts, so
/// polls of the same key never overlap.
pub struct StockPoller {
    retailers: Arc<RetailerRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
    dispatcher: DispatchHandle,
    states: Mutex<HashMap<ProductKey, StockState>>,
    events: broadcast::Sender<StockChangeEvent>,
    config: PollerConfig,
}

impl StockPoller {
    pub fn new(
        retailers: Arc<RetailerRegistry>,
        subscriptions: Arc<SubscriptionRegistry>,
        dispatcher: DispatchHandle,
        config: PollerConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer);
        Self {
            retailers,
            subscriptions,
            dispatcher,
            states: Mutex::new(HashMap::new()),
            events,
            config,
        }
    }

    /// Event stream for the purchase orchestrator and the command layer.
    pub fn subscribe(&self) -> broadcast::Receiver<StockChangeEvent> {
        self.events.subscribe()
    }

    /// Poll loop. Observes cancellation between ticks; an in-progress tick
    /// always runs to completion.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            interval_secs = self.config.interval_secs,
            max_in_flight = self.config.max_in_flight,
            "stock poller started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => self.run_tick().await,
            }
        }
        tracing::info!("stock poller stopped");
    }

    /// One full polling pass over every key with at least one watcher.
    pub async fn run_tick(&self) {
        let keys = self.subscriptions.tracked_keys().await;
        if keys.is_empty() {
            return;
        }

        tracing::debug!(products = keys.len(), "polling tracked products");
        let changes = stream::iter(keys)
            .map(|key| self.check_key(key))
            .buffer_unordered(self.config.max_in_flight)
            .filter_map(|event| async move { event })
            .count()
            .await;

        metrics::counter!("poll_ticks_total").increment(1);
        if changes > 0 {
            tracing::info!(changes, "poll tick detected stock changes");
        }
    }

    /// Force an immediate re-check of one key, outside the schedule. Test and
    /// demo harnesses use this to drive a transition deterministically.
    pub async fn check_now(&self, key: &ProductKey) -> Option<StockChangeEvent> {
        self.check_key(key.clone()).await
    }

    async fn check_key(&self, key: ProductKey) -> Option<StockChangeEvent> {
        let Some(retailer) = self.retailers.get(&key.retailer) else {
            tracing::warn!(product = %key, "no adapter registered for retailer");
            return None;
        };

        let current = match retailer.check_stock(&key.product_id).await {
            StockStatus::InStock { price, url } => StockState::in_stock(price, url),
            StockStatus::OutOfStock { url } => StockState::out_of_stock(url),
            StockStatus::Unavailable => {
                // Keep the previous state; this key retries on the next tick.
                metrics::counter!("poll_failures_total").increment(1);
                tracing::warn!(product = %key, "stock check unavailable, keeping last known state");
                return None;
            }
        };

        let previous = {
            let mut states = self.states.lock().await;
            states.insert(key.clone(), current.clone())
        };

        let Some(previous) = previous else {
            tracing::debug!(product = %key, "baseline stock state recorded");
            return None;
        };

        if !current.differs_from(&previous) {
            return None;
        }

        let event = StockChangeEvent::new(key, previous, current);
        metrics::counter!("stock_changes_total").increment(1);
        tracing::info!(
            product = %event.product,
            in_stock = event.current.in_stock,
            price = ?event.current.price,
            "stock change detected"
        );

        self.notify_watchers(&event).await;
        // Nobody listening is fine; the dispatcher fan-out above already ran.
        let _ = self.events.send(event.clone());
        Some(event)
    }

    async fn notify_watchers(&self, event: &StockChangeEvent) {
        for user in self.subscriptions.watchers(&event.product).await {
            let channel = self.subscriptions.channel(user).await;
            self.dispatcher
                .enqueue(NotificationMessage::new(user, channel, alert_text(event)));
        }
    }
}

fn alert_text(event: &StockChangeEvent) -> String {
    let StockChangeEvent { product, current, .. } = event;
    if current.in_stock {
        match current.price {
            Some(price) => {
                format!("{product} is now in stock at ${price}: {}", current.url)
            }
            None => format!("{product} is now in stock: {}", current.url),
        }
    } else {
        format!("{product} is now out of stock")
    }
}
