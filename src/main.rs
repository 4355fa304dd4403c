use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use restock_sentry::config::AppConfig;
use restock_sentry::dispatcher::{Notifier, NotificationDispatcher};
use restock_sentry::fetch::FetchExecutor;
use restock_sentry::notifiers::{LogNotifier, WebhookNotifier};
use restock_sentry::poller::StockPoller;
use restock_sentry::purchase::PurchaseOrchestrator;
use restock_sentry::retailers::{RestRetailer, RetailerRegistry};
use restock_sentry::subscriptions::SubscriptionRegistry;

#[derive(Parser)]
#[command(name = "restock-sentry", about = "Stock/price watcher with auto-purchase")]
struct Cli {
    /// Run a single poll tick and exit instead of looping.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("restock_sentry=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    info!("Starting Restock Sentry...");

    if config.metrics.enabled {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "metrics exporter listening");
    }

    let executor = FetchExecutor::new(config.fetch.clone())?;
    let mut retailers = RetailerRegistry::new();
    for endpoint in &config.retailers {
        retailers.register(Arc::new(RestRetailer::new(
            endpoint.name.clone(),
            endpoint.base_url.clone(),
            executor.clone(),
        )));
    }
    info!(retailers = ?retailers.names(), "retailer registry initialized");
    let retailers = Arc::new(retailers);

    let subscriptions = Arc::new(SubscriptionRegistry::new());

    let notifier: Arc<dyn Notifier> = match &config.notifications.webhook.url {
        Some(url) => Arc::new(WebhookNotifier::new(url, &config.notifications.webhook)?),
        None => {
            info!("no webhook configured, notifications go to the log");
            Arc::new(LogNotifier)
        }
    };
    let (dispatch, dispatcher) = NotificationDispatcher::new(notifier, &config.dispatcher);
    let dispatcher_task = tokio::spawn(dispatcher.run());

    let poller = Arc::new(StockPoller::new(
        retailers.clone(),
        subscriptions.clone(),
        dispatch.clone(),
        config.poller.clone(),
    ));

    let shutdown = CancellationToken::new();
    let poller_task = tokio::spawn(poller.clone().run(shutdown.clone()));

    let orchestrator_task = if config.purchase.enabled {
        let orchestrator = Arc::new(PurchaseOrchestrator::new(
            retailers.clone(),
            subscriptions.clone(),
            dispatch.clone(),
            &config.purchase,
        ));
        let events = poller.subscribe();
        Some(tokio::spawn(orchestrator.run(events, shutdown.clone())))
    } else {
        info!("auto-purchase disabled");
        None
    };

    if cli.once {
        poller.run_tick().await;
        shutdown.cancel();
    } else {
        tokio::signal::ctrl_c().await?;
        info!("Shutting down...");
        shutdown.cancel();
    }

    // Poller and orchestrator stop taking work; in-flight purchase attempts
    // finish and report before the queue is allowed to drain out.
    poller_task.await?;
    if let Some(task) = orchestrator_task {
        task.await?;
    }
    drop(poller);
    drop(dispatch);
    dispatcher_task.await?;

    info!("Shutdown complete");
    Ok(())
}
