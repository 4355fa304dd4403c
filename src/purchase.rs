use std::collections::HashSet;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::PurchaseConfig;
use crate::dispatcher::DispatchHandle;
use crate::models::{
    NotificationMessage, ProductKey, PurchaseOutcome, PurchaseStatus, StockChangeEvent, StockState,
    UserId,
};
use crate::retailers::{PaymentDetails, RetailerRegistry};
use crate::subscriptions::SubscriptionRegistry;

/// Does this state satisfy the user's buy threshold?
fn satisfies(state: &StockState, threshold: Decimal) -> bool {
    state.in_stock && state.price.is_some_and(|price| price <= threshold)
}

/// Reacts to stock change events by driving add-to-cart/checkout at most once
/// per `(user, product)` threshold crossing.
///
/// A pair becomes *engaged* when an attempt starts and stays engaged through
/// completion; only an event showing a non-qualifying state re-arms it. That
/// gives the at-most-once guarantee two ways: duplicate qualifying events
/// while an attempt is in flight are discarded, and re-confirmations of the
/// same in-stock-under-threshold state after completion never re-buy.
pub struct PurchaseOrchestrator {
    retailers: Arc<RetailerRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
    dispatcher: DispatchHandle,
    payment: PaymentDetails,
    outcomes: broadcast::Sender<PurchaseOutcome>,
}

impl PurchaseOrchestrator {
    pub fn new(
        retailers: Arc<RetailerRegistry>,
        subscriptions: Arc<SubscriptionRegistry>,
        dispatcher: DispatchHandle,
        config: &PurchaseConfig,
    ) -> Self {
        let (outcomes, _) = broadcast::channel(config.outcome_buffer);
        Self {
            retailers,
            subscriptions,
            dispatcher,
            payment: PaymentDetails {
                reference: config.payment_reference.clone(),
            },
            outcomes,
        }
    }

    /// Outcome stream for the command layer to render or log.
    pub fn subscribe(&self) -> broadcast::Receiver<PurchaseOutcome> {
        self.outcomes.subscribe()
    }

    /// Event loop. On shutdown, stops taking new events but joins every
    /// in-flight attempt so each one still records and reports its outcome.
    pub async fn run(
        self: Arc<Self>,
        mut events: broadcast::Receiver<StockChangeEvent>,
        shutdown: CancellationToken,
    ) {
        let mut engaged: HashSet<(UserId, ProductKey)> = HashSet::new();
        let mut attempts = JoinSet::new();
        tracing::info!("purchase orchestrator started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event, &mut engaged, &mut attempts).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "purchase orchestrator lagged behind event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(result) = attempts.join_next(), if !attempts.is_empty() => {
                    if let Err(err) = result {
                        tracing::error!(%err, "purchase attempt task panicked");
                    }
                }
            }
        }

        while let Some(result) = attempts.join_next().await {
            if let Err(err) = result {
                tracing::error!(%err, "purchase attempt task panicked");
            }
        }
        tracing::info!("purchase orchestrator stopped");
    }

    async fn handle_event(
        &self,
        event: StockChangeEvent,
        engaged: &mut HashSet<(UserId, ProductKey)>,
        attempts: &mut JoinSet<()>,
    ) {
        for user in self.subscriptions.watchers(&event.product).await {
            let Some(threshold) = self.subscriptions.buy_threshold(user, &event.product).await
            else {
                continue;
            };

            let pair = (user, event.product.clone());
            if !satisfies(&event.current, threshold) {
                // Left the qualifying state; the next crossing may buy again.
                engaged.remove(&pair);
                continue;
            }
            if satisfies(&event.previous, threshold) {
                // Already satisfied before this event; not a crossing.
                continue;
            }
            if !engaged.insert(pair) {
                continue;
            }

            let Some(price) = event.current.price else {
                continue;
            };
            tracing::info!(
                user = %user,
                product = %event.product,
                %price,
                %threshold,
                "buy threshold crossed, starting purchase attempt"
            );
            metrics::counter!("purchase_attempts_total").increment(1);

            let orchestrator = Arc::new(self.clone_refs());
            let product = event.product.clone();
            attempts.spawn(async move {
                orchestrator.attempt(user, product, price).await;
            });
        }
    }

    // Cheap handle clone for the spawned attempt task.
    fn clone_refs(&self) -> PurchaseOrchestrator {
        PurchaseOrchestrator {
            retailers: self.retailers.clone(),
            subscriptions: self.subscriptions.clone(),
            dispatcher: self.dispatcher.clone(),
            payment: self.payment.clone(),
            outcomes: self.outcomes.clone(),
        }
    }

    async fn attempt(&self, user: UserId, product: ProductKey, price: Decimal) {
        let status = self.try_purchase(&product).await;
        let outcome = PurchaseOutcome::new(user, product, price, status);

        if outcome.succeeded() {
            metrics::counter!("purchases_completed_total").increment(1);
        } else {
            metrics::counter!("purchases_failed_total").increment(1);
        }

        let channel = self.subscriptions.channel(user).await;
        self.dispatcher
            .enqueue(NotificationMessage::new(user, channel, outcome.summary()));
        let _ = self.outcomes.send(outcome);
    }

    /// One cart-then-checkout sequence. Both failure points are terminal for
    /// the attempt: a blind retry against a half-built cart could
    /// double-purchase.
    async fn try_purchase(&self, product: &ProductKey) -> PurchaseStatus {
        let Some(retailer) = self.retailers.get(&product.retailer) else {
            tracing::warn!(product = %product, "no adapter registered for retailer");
            return PurchaseStatus::CartFailed;
        };

        if let Err(err) = retailer.add_to_cart(&product.product_id).await {
            tracing::warn!(product = %product, %err, "add to cart failed");
            return PurchaseStatus::CartFailed;
        }

        match retailer.checkout(&self.payment).await {
            Ok(confirmation) => {
                tracing::info!(
                    product = %product,
                    order_id = %confirmation.order_id,
                    "purchase completed"
                );
                PurchaseStatus::Completed
            }
            Err(err) => {
                tracing::warn!(product = %product, %err, "checkout failed");
                PurchaseStatus::CheckoutFailed
            }
        }
    }
}
