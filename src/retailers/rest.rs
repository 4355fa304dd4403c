use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use super::{OrderConfirmation, PaymentDetails, ProductDetails, ProductListing, Retailer, StockStatus};
use crate::fetch::FetchExecutor;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Deserialize)]
struct ListingPayload {
    id: String,
    name: String,
    price: Option<Decimal>,
    url: String,
    #[serde(default)]
    in_stock: bool,
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    products: Vec<ListingPayload>,
}

#[derive(Debug, Deserialize)]
struct DetailsPayload {
    id: String,
    name: String,
    description: Option<String>,
    price: Option<Decimal>,
    url: String,
    #[serde(default)]
    in_stock: bool,
}

#[derive(Debug, Deserialize)]
struct StockPayload {
    in_stock: bool,
    price: Option<Decimal>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CheckoutPayload {
    order_id: String,
}

/// Adapter for sellers exposing a JSON storefront API. All transport policy
/// (retries, backoff, pacing) lives in the shared fetch executor; this type
/// only maps endpoints and payloads.
pub struct RestRetailer {
    name: String,
    base_url: String,
    executor: FetchExecutor,
}

impl RestRetailer {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, executor: FetchExecutor) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            name: name.into(),
            base_url,
            executor,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn product_url(&self, product_id: &str) -> String {
        self.endpoint(&format!("/api/products/{product_id}"))
    }
}

#[async_trait]
impl Retailer for RestRetailer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Vec<ProductListing>> {
        let url = self.endpoint(&format!("/api/products?query={}", urlencode(query)));
        let body = self.executor.get(&url).await?;
        let payload: SearchPayload = serde_json::from_str(&body)?;
        Ok(payload
            .products
            .into_iter()
            .map(|p| ProductListing {
                id: p.id,
                name: p.name,
                price: p.price,
                url: p.url,
                in_stock: p.in_stock,
            })
            .collect())
    }

    async fn get_details(&self, product_id: &str) -> Result<ProductDetails> {
        let body = self.executor.get(&self.product_url(product_id)).await?;
        let payload: DetailsPayload = serde_json::from_str(&body)?;
        Ok(ProductDetails {
            id: payload.id,
            name: payload.name,
            description: payload.description,
            price: payload.price,
            url: payload.url,
            in_stock: payload.in_stock,
        })
    }

    async fn check_stock(&self, product_id: &str) -> StockStatus {
        let url = self.endpoint(&format!("/api/products/{product_id}/stock"));
        let body = match self.executor.get(&url).await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(retailer = %self.name, product_id, %err, "stock check failed");
                return StockStatus::Unavailable;
            }
        };

        let payload: StockPayload = match serde_json::from_str(&body) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(retailer = %self.name, product_id, %err, "stock payload malformed");
                return StockStatus::Unavailable;
            }
        };

        let url = payload.url.unwrap_or_else(|| self.product_url(product_id));
        if payload.in_stock {
            StockStatus::InStock {
                price: payload.price,
                url,
            }
        } else {
            StockStatus::OutOfStock { url }
        }
    }

    async fn add_to_cart(&self, product_id: &str) -> Result<()> {
        let url = self.endpoint("/api/cart");
        self.executor
            .post_json(&url, &json!({ "product_id": product_id }))
            .await
            .map_err(|err| AppError::Retailer {
                retailer: self.name.clone(),
                message: format!("add to cart failed: {err}"),
            })?;
        Ok(())
    }

    async fn checkout(&self, payment: &PaymentDetails) -> Result<OrderConfirmation> {
        let url = self.endpoint("/api/checkout");
        let body = self
            .executor
            .post_json(&url, &json!({ "payment_reference": payment.reference }))
            .await
            .map_err(|err| AppError::Retailer {
                retailer: self.name.clone(),
                message: format!("checkout failed: {err}"),
            })?;
        let payload: CheckoutPayload = serde_json::from_str(&body)?;
        Ok(OrderConfirmation {
            order_id: payload.order_id,
        })
    }
}

fn urlencode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
