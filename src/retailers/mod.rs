use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::error::Result;

pub mod registry;
pub mod rest;
pub mod scripted;

pub use registry::RetailerRegistry;
pub use rest::RestRetailer;
pub use scripted::ScriptedRetailer;

/// Classified availability outcome of a stock check. Adapters never leak raw
/// transport errors to the poller; anything that prevented a definitive
/// answer collapses into `Unavailable`.
#[derive(Debug, Clone, PartialEq)]
pub enum StockStatus {
    InStock { price: Option<Decimal>, url: String },
    OutOfStock { url: String },
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductListing {
    pub id: String,
    pub name: String,
    pub price: Option<Decimal>,
    pub url: String,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetails {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub url: String,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: String,
}

/// Capability set one seller exposes to the core.
///
/// `check_stock` must stay side-effect-free and idempotent; the poller calls
/// it on every tick. `add_to_cart` and `checkout` are effectful and are only
/// driven by the purchase orchestrator under its single-flight guarantee.
#[async_trait]
pub trait Retailer: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<ProductListing>>;

    async fn get_details(&self, product_id: &str) -> Result<ProductDetails>;

    async fn check_stock(&self, product_id: &str) -> StockStatus;

    async fn add_to_cart(&self, product_id: &str) -> Result<()>;

    async fn checkout(&self, payment: &PaymentDetails) -> Result<OrderConfirmation>;
}
