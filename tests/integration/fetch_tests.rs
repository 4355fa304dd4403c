use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use restock_sentry::config::FetchConfig;
use restock_sentry::fetch::{FetchError, FetchExecutor};
use restock_sentry::retailers::{Retailer, RestRetailer, StockStatus};

fn fast_config(retry_attempts: u32) -> FetchConfig {
    FetchConfig {
        retry_attempts,
        base_delay_ms: 1,
        max_delay_ms: 20,
        politeness_delay_ms: 0,
        request_timeout_secs: 5,
        user_agent: "restock-sentry-test/1.0".to_string(),
    }
}

#[tokio::test]
async fn test_rate_limited_server_exhausts_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let executor = FetchExecutor::new(fast_config(3)).unwrap();
    let result = executor.get(&format!("{}/throttled", server.uri())).await;

    match result {
        Err(FetchError::ExhaustedRetries { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
}

#[tokio::test]
async fn test_explicit_budget_overrides_configured_one() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/throttled"))
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&server)
        .await;

    let executor = FetchExecutor::new(fast_config(3)).unwrap();
    let result = executor
        .fetch(
            reqwest::Method::GET,
            &format!("{}/throttled", server.uri()),
            None,
            5,
        )
        .await;

    match result {
        Err(FetchError::ExhaustedRetries { attempts, .. }) => assert_eq!(attempts, 5),
        other => panic!("expected ExhaustedRetries, got {other:?}"),
    }
}

#[tokio::test]
async fn test_not_found_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let executor = FetchExecutor::new(fast_config(3)).unwrap();
    let result = executor.get(&format!("{}/missing", server.uri())).await;

    assert!(matches!(result, Err(FetchError::NotFound { .. })));
}

#[tokio::test]
async fn test_unexpected_status_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let executor = FetchExecutor::new(fast_config(3)).unwrap();
    let result = executor.get(&format!("{}/forbidden", server.uri())).await;

    match result {
        Err(FetchError::Rejected { status, .. }) => assert_eq!(status, 403),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_then_success_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let executor = FetchExecutor::new(fast_config(3)).unwrap();
    let body = executor
        .get(&format!("{}/flaky", server.uri()))
        .await
        .expect("second attempt succeeds");
    assert_eq!(body, "recovered");
}

#[tokio::test]
async fn test_adapter_search_and_details() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"products": [
                {"id": "x1", "name": "Elite Trainer Box", "price": 49.99,
                 "url": "https://sellera.example.com/p/x1", "in_stock": true},
                {"id": "x2", "name": "Booster Bundle",
                 "url": "https://sellera.example.com/p/x2"}
            ]}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/products/x1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"id": "x1", "name": "Elite Trainer Box",
                "description": "Nine packs and accessories", "price": 49.99,
                "url": "https://sellera.example.com/p/x1", "in_stock": true}"#,
        ))
        .mount(&server)
        .await;

    let executor = FetchExecutor::new(fast_config(2)).unwrap();
    let retailer = RestRetailer::new("sellera", server.uri(), executor);

    let listings = retailer.search("elite trainer").await.unwrap();
    assert_eq!(listings.len(), 2);
    assert_eq!(listings[0].id, "x1");
    assert!(listings[0].in_stock);
    assert!(!listings[1].in_stock);
    assert_eq!(listings[1].price, None);

    let details = retailer.get_details("x1").await.unwrap();
    assert_eq!(details.name, "Elite Trainer Box");
    assert_eq!(details.description.as_deref(), Some("Nine packs and accessories"));
}

#[tokio::test]
async fn test_adapter_reports_unavailable_on_404_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/x1/stock"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let executor = FetchExecutor::new(fast_config(3)).unwrap();
    let retailer = RestRetailer::new("sellera", server.uri(), executor);

    assert_eq!(retailer.check_stock("x1").await, StockStatus::Unavailable);
}

#[tokio::test]
async fn test_adapter_classifies_stock_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/products/x1/stock"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"{"in_stock": true, "price": 49.99, "url": "https://sellera.example.com/p/x1"}"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/products/x2/stock"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"in_stock": false}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/products/x3/stock"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let executor = FetchExecutor::new(fast_config(2)).unwrap();
    let retailer = RestRetailer::new("sellera", server.uri(), executor);

    match retailer.check_stock("x1").await {
        StockStatus::InStock { price, url } => {
            assert_eq!(price, Some(rust_decimal::Decimal::new(4999, 2)));
            assert_eq!(url, "https://sellera.example.com/p/x1");
        }
        other => panic!("expected InStock, got {other:?}"),
    }

    assert!(matches!(
        retailer.check_stock("x2").await,
        StockStatus::OutOfStock { .. }
    ));

    // Malformed payloads degrade to Unavailable, never an error.
    assert_eq!(retailer.check_stock("x3").await, StockStatus::Unavailable);
}
