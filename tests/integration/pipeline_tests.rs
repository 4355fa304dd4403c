use rust_decimal::Decimal;

use restock_sentry::models::{ProductKey, UserId};
use restock_sentry::retailers::StockStatus;
use restock_sentry::subscriptions::TrackOutcome;

use super::create_test_app;

fn price(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn in_stock(cents: i64) -> StockStatus {
    StockStatus::InStock {
        price: Some(price(cents)),
        url: "https://sellera.example.com/p/x1".to_string(),
    }
}

fn out_of_stock() -> StockStatus {
    StockStatus::OutOfStock {
        url: "https://sellera.example.com/p/x1".to_string(),
    }
}

#[tokio::test]
async fn test_restock_alert_reaches_tracking_user() {
    let app = create_test_app().await;
    let key = ProductKey::new("sellera", "x1");

    assert_eq!(
        app.subscriptions.track(UserId(1), key.clone()).await,
        TrackOutcome::Added
    );
    app.retailer
        .script_stock("x1", vec![out_of_stock(), in_stock(4999)])
        .await;

    app.poller.run_tick().await; // baseline (false, none)
    app.poller.run_tick().await; // transition to (true, 49.99)

    let messages = app.wait_for_messages(1).await;
    assert!(messages[0].contains("sellera:x1"));
    assert!(messages[0].contains("$49.99"));

    let all = app.finish().await;
    // No buy threshold was set: the alert stays the only message.
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_restock_under_threshold_alerts_and_purchases() {
    let app = create_test_app().await;
    let key = ProductKey::new("sellera", "x1");

    app.subscriptions.track(UserId(1), key.clone()).await;
    app.subscriptions
        .set_buy_threshold(UserId(1), key.clone(), price(5000))
        .await;
    app.retailer
        .script_stock("x1", vec![out_of_stock(), in_stock(4999)])
        .await;

    let mut outcomes = app.orchestrator.subscribe();

    app.poller.run_tick().await;
    app.poller.run_tick().await;

    let outcome = outcomes.recv().await.expect("purchase outcome");
    assert!(outcome.succeeded());
    assert_eq!(outcome.price, price(4999));

    let messages = app.wait_for_messages(2).await;
    assert!(messages.iter().any(|m| m.contains("in stock at $49.99")));
    assert!(messages.iter().any(|m| m.contains("Auto-purchase successful")));

    assert_eq!(app.retailer.cart_calls().await.len(), 1);
    assert_eq!(app.retailer.checkout_calls().await.len(), 1);
    app.finish().await;
}

#[tokio::test]
async fn test_steady_polls_never_repeat_alert_or_purchase() {
    let app = create_test_app().await;
    let key = ProductKey::new("sellera", "x1");

    app.subscriptions.track(UserId(1), key.clone()).await;
    app.subscriptions
        .set_buy_threshold(UserId(1), key.clone(), price(5000))
        .await;
    app.retailer
        .script_stock("x1", vec![out_of_stock(), in_stock(4999)])
        .await;

    app.poller.run_tick().await;
    app.poller.run_tick().await;
    // The script now repeats the same in-stock state on every poll.
    for _ in 0..5 {
        app.poller.run_tick().await;
    }

    let retailer = app.retailer.clone();
    let messages = app.finish().await;
    assert_eq!(
        messages.len(),
        2,
        "one alert and one purchase notification, got {messages:?}"
    );
    assert_eq!(retailer.cart_calls().await.len(), 1);
}

#[tokio::test]
async fn test_multiple_watchers_each_get_an_alert() {
    let app = create_test_app().await;
    let key = ProductKey::new("sellera", "x1");

    for user in 1..=3u64 {
        app.subscriptions.track(UserId(user), key.clone()).await;
    }
    app.retailer
        .script_stock("x1", vec![out_of_stock(), in_stock(4999)])
        .await;

    app.poller.run_tick().await;
    app.poller.run_tick().await;

    app.wait_for_messages(3).await;
    let all = app.finish().await;
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_out_of_stock_transition_alerts_without_purchase() {
    let app = create_test_app().await;
    let key = ProductKey::new("sellera", "x1");

    app.subscriptions.track(UserId(1), key.clone()).await;
    app.subscriptions
        .set_buy_threshold(UserId(1), key.clone(), price(5000))
        .await;
    app.retailer
        .script_stock("x1", vec![in_stock(5999), out_of_stock()])
        .await;

    app.poller.run_tick().await; // baseline, in stock above threshold
    app.poller.run_tick().await; // sold out

    let retailer = app.retailer.clone();
    let messages = app.finish().await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("out of stock"));
    assert!(retailer.cart_calls().await.is_empty());
}

#[tokio::test]
async fn test_unavailable_scrape_skips_only_that_key() {
    let app = create_test_app().await;
    let good = ProductKey::new("sellera", "good");
    let bad = ProductKey::new("sellera", "bad");

    app.subscriptions.track(UserId(1), good.clone()).await;
    app.subscriptions.track(UserId(1), bad.clone()).await;
    app.retailer
        .script_stock("good", vec![out_of_stock(), in_stock(2999)])
        .await;
    // "bad" has no script at all: every check is Unavailable.

    app.poller.run_tick().await;
    app.poller.run_tick().await;

    let messages = app.finish().await;
    assert_eq!(messages.len(), 1);
    assert!(messages[0].contains("sellera:good"));
}

#[tokio::test]
async fn test_check_now_drives_full_pipeline() {
    let app = create_test_app().await;
    let key = ProductKey::new("sellera", "x1");

    app.subscriptions.track(UserId(1), key.clone()).await;
    app.subscriptions
        .set_buy_threshold(UserId(1), key.clone(), price(5000))
        .await;
    app.retailer
        .script_stock("x1", vec![out_of_stock(), in_stock(4999)])
        .await;

    assert!(app.poller.check_now(&key).await.is_none());
    let event = app.poller.check_now(&key).await.expect("forced transition");
    assert!(event.current.in_stock);

    let messages = app.finish().await;
    assert!(messages.iter().any(|m| m.contains("Auto-purchase successful")));
}

#[tokio::test]
async fn test_untracked_user_gets_nothing() {
    let app = create_test_app().await;
    let key = ProductKey::new("sellera", "x1");

    app.subscriptions.track(UserId(1), key.clone()).await;
    app.subscriptions.untrack(UserId(1), &key).await;
    app.retailer
        .script_stock("x1", vec![out_of_stock(), in_stock(4999)])
        .await;

    app.poller.run_tick().await;
    app.poller.run_tick().await;

    assert!(app.finish().await.is_empty());
}
