// Shared fixtures for the integration suite: a full core wired against
// scripted retailers and an in-memory notifier, no network and no timers.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use restock_sentry::config::{DispatcherConfig, PollerConfig, PurchaseConfig};
use restock_sentry::dispatcher::NotificationDispatcher;
use restock_sentry::notifiers::CollectingNotifier;
use restock_sentry::poller::StockPoller;
use restock_sentry::purchase::PurchaseOrchestrator;
use restock_sentry::retailers::{RetailerRegistry, ScriptedRetailer};
use restock_sentry::subscriptions::SubscriptionRegistry;

pub mod fetch_tests;
pub mod pipeline_tests;

pub struct TestApp {
    pub subscriptions: Arc<SubscriptionRegistry>,
    pub poller: Arc<StockPoller>,
    pub orchestrator: Arc<PurchaseOrchestrator>,
    pub notifier: Arc<CollectingNotifier>,
    pub retailer: Arc<ScriptedRetailer>,
    shutdown: CancellationToken,
    orchestrator_task: tokio::task::JoinHandle<()>,
    dispatcher_task: tokio::task::JoinHandle<()>,
}

pub async fn create_test_app() -> TestApp {
    let retailer = Arc::new(ScriptedRetailer::new("sellera"));
    let mut registry = RetailerRegistry::new();
    registry.register(retailer.clone());
    let registry = Arc::new(registry);

    let subscriptions = Arc::new(SubscriptionRegistry::new());
    let notifier = Arc::new(CollectingNotifier::new());
    let (dispatch, dispatcher) = NotificationDispatcher::new(
        notifier.clone(),
        &DispatcherConfig {
            queue_capacity: 256,
            min_send_gap_ms: 0,
        },
    );
    let dispatcher_task = tokio::spawn(dispatcher.run());

    let poller = Arc::new(StockPoller::new(
        registry.clone(),
        subscriptions.clone(),
        dispatch.clone(),
        PollerConfig {
            interval_secs: 60,
            max_in_flight: 4,
            event_buffer: 64,
        },
    ));

    let orchestrator = Arc::new(PurchaseOrchestrator::new(
        registry,
        subscriptions.clone(),
        dispatch,
        &PurchaseConfig {
            enabled: true,
            payment_reference: "card-on-file".to_string(),
            outcome_buffer: 64,
        },
    ));

    let shutdown = CancellationToken::new();
    let orchestrator_task = tokio::spawn(
        orchestrator
            .clone()
            .run(poller.subscribe(), shutdown.clone()),
    );

    TestApp {
        subscriptions,
        poller,
        orchestrator,
        notifier,
        retailer,
        shutdown,
        orchestrator_task,
        dispatcher_task,
    }
}

impl TestApp {
    /// Wait until the collecting notifier holds at least `count` messages.
    pub async fn wait_for_messages(&self, count: usize) -> Vec<String> {
        for _ in 0..200 {
            let messages = self.notifier.messages().await;
            if messages.len() >= count {
                return messages.into_iter().map(|m| m.text).collect();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "timed out waiting for {count} notifications, have {:?}",
            self.notifier.messages().await
        );
    }

    /// Orderly shutdown: orchestrator joins in-flight attempts, then the
    /// dispatcher drains. Returns every delivered message text.
    pub async fn finish(self) -> Vec<String> {
        // Give queued events a chance to reach the orchestrator loop.
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.shutdown.cancel();
        self.orchestrator_task.await.expect("orchestrator task");
        drop(self.orchestrator);
        drop(self.poller);
        self.dispatcher_task.await.expect("dispatcher task");
        self.notifier
            .messages()
            .await
            .into_iter()
            .map(|m| m.text)
            .collect()
    }
}
