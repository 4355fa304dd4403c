use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::error::AppError;

/// Identity of a trackable product at one retailer. Immutable once created;
/// rendered as `retailer:product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    pub retailer: String,
    pub product_id: String,
}

impl ProductKey {
    pub fn new(retailer: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            retailer: retailer.into(),
            product_id: product_id.into(),
        }
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.retailer, self.product_id)
    }
}

impl FromStr for ProductKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((retailer, product_id)) if !retailer.is_empty() && !product_id.is_empty() => {
                Ok(Self::new(retailer, product_id))
            }
            _ => Err(AppError::Validation(format!(
                "product key must be 'retailer:product_id', got '{s}'"
            ))),
        }
    }
}

/// Last-known availability snapshot for a product. Owned by the poller and
/// replaced whole on every successful check; other components only ever see
/// clones inside events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockState {
    pub in_stock: bool,
    pub price: Option<Decimal>,
    pub url: String,
    pub checked_at: DateTime<Utc>,
}

impl StockState {
    pub fn in_stock(price: Option<Decimal>, url: impl Into<String>) -> Self {
        Self {
            in_stock: true,
            price,
            url: url.into(),
            checked_at: Utc::now(),
        }
    }

    pub fn out_of_stock(url: impl Into<String>) -> Self {
        Self {
            in_stock: false,
            price: None,
            url: url.into(),
            checked_at: Utc::now(),
        }
    }

    /// Change predicate for event emission: availability flipped, or the
    /// price moved while in stock. `url` and `checked_at` alone never count
    /// as a change.
    pub fn differs_from(&self, previous: &StockState) -> bool {
        if self.in_stock != previous.in_stock {
            return true;
        }
        self.in_stock && self.price != previous.price
    }
}

/// One detected transition between two stock states. Produced once per
/// transition, consumed by the dispatcher fan-out and the purchase
/// orchestrator; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockChangeEvent {
    pub id: Uuid,
    pub product: ProductKey,
    pub previous: StockState,
    pub current: StockState,
    pub at: DateTime<Utc>,
}

impl StockChangeEvent {
    pub fn new(product: ProductKey, previous: StockState, current: StockState) -> Self {
        Self {
            id: Uuid::new_v4(),
            product,
            previous,
            current,
            at: Utc::now(),
        }
    }
}
