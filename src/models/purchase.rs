use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::notification::UserId;
use super::product::ProductKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Completed,
    CartFailed,
    CheckoutFailed,
}

/// Terminal record of one purchase attempt. Exactly one exists per qualifying
/// crossing of a user's buy threshold; it is never recreated for the same
/// crossing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOutcome {
    pub id: Uuid,
    pub user: UserId,
    pub product: ProductKey,
    pub price: Decimal,
    pub status: PurchaseStatus,
    pub at: DateTime<Utc>,
}

impl PurchaseOutcome {
    pub fn new(user: UserId, product: ProductKey, price: Decimal, status: PurchaseStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            user,
            product,
            price,
            status,
            at: Utc::now(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == PurchaseStatus::Completed
    }

    /// Message body for the outcome notification.
    pub fn summary(&self) -> String {
        match self.status {
            PurchaseStatus::Completed => format!(
                "Auto-purchase successful: {} for ${}",
                self.product, self.price
            ),
            PurchaseStatus::CartFailed => format!(
                "Auto-purchase failed: could not add {} to cart",
                self.product
            ),
            PurchaseStatus::CheckoutFailed => format!(
                "Auto-purchase failed: checkout for {} did not complete",
                self.product
            ),
        }
    }
}
