use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{OrderConfirmation, PaymentDetails, ProductDetails, ProductListing, Retailer, StockStatus};
use crate::utils::error::{AppError, Result};

/// Deterministic stand-in for a real seller, driven by an explicit script of
/// canned responses. Each stock check consumes the next scripted status for
/// that product; the final entry repeats so steady-state polls stay stable.
/// Used by tests and demo harnesses in place of any randomized storefront.
pub struct ScriptedRetailer {
    name: String,
    scripts: Mutex<HashMap<String, VecDeque<StockStatus>>>,
    cart_calls: Mutex<Vec<String>>,
    checkout_calls: Mutex<Vec<String>>,
    fail_add_to_cart: AtomicBool,
    fail_checkout: AtomicBool,
}

impl ScriptedRetailer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scripts: Mutex::new(HashMap::new()),
            cart_calls: Mutex::new(Vec::new()),
            checkout_calls: Mutex::new(Vec::new()),
            fail_add_to_cart: AtomicBool::new(false),
            fail_checkout: AtomicBool::new(false),
        }
    }

    /// Replace the script for one product.
    pub async fn script_stock(&self, product_id: &str, statuses: Vec<StockStatus>) {
        let mut scripts = self.scripts.lock().await;
        scripts.insert(product_id.to_string(), statuses.into());
    }

    /// Append a status to a product's script, e.g. to stage the next
    /// transition mid-test.
    pub async fn push_stock(&self, product_id: &str, status: StockStatus) {
        let mut scripts = self.scripts.lock().await;
        scripts.entry(product_id.to_string()).or_default().push_back(status);
    }

    pub fn fail_next_add_to_cart(&self, fail: bool) {
        self.fail_add_to_cart.store(fail, Ordering::SeqCst);
    }

    pub fn fail_next_checkout(&self, fail: bool) {
        self.fail_checkout.store(fail, Ordering::SeqCst);
    }

    pub async fn cart_calls(&self) -> Vec<String> {
        self.cart_calls.lock().await.clone()
    }

    pub async fn checkout_calls(&self) -> Vec<String> {
        self.checkout_calls.lock().await.clone()
    }
}

#[async_trait]
impl Retailer for ScriptedRetailer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, query: &str) -> Result<Vec<ProductListing>> {
        let scripts = self.scripts.lock().await;
        let listings = scripts
            .iter()
            .filter(|(id, _)| id.contains(query))
            .map(|(id, script)| {
                let (price, url, in_stock) = match script.front() {
                    Some(StockStatus::InStock { price, url }) => (*price, url.clone(), true),
                    Some(StockStatus::OutOfStock { url }) => (None, url.clone(), false),
                    _ => (None, String::new(), false),
                };
                ProductListing {
                    id: id.clone(),
                    name: id.clone(),
                    price,
                    url,
                    in_stock,
                }
            })
            .collect();
        Ok(listings)
    }

    async fn get_details(&self, product_id: &str) -> Result<ProductDetails> {
        let scripts = self.scripts.lock().await;
        let script = scripts.get(product_id).ok_or_else(|| AppError::NotFound {
            resource: format!("product {product_id}"),
        })?;
        let (price, url, in_stock) = match script.front() {
            Some(StockStatus::InStock { price, url }) => (*price, url.clone(), true),
            Some(StockStatus::OutOfStock { url }) => (None, url.clone(), false),
            _ => (None, String::new(), false),
        };
        Ok(ProductDetails {
            id: product_id.to_string(),
            name: product_id.to_string(),
            description: None,
            price,
            url,
            in_stock,
        })
    }

    async fn check_stock(&self, product_id: &str) -> StockStatus {
        let mut scripts = self.scripts.lock().await;
        match scripts.get_mut(product_id) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(StockStatus::Unavailable),
            Some(script) => script.front().cloned().unwrap_or(StockStatus::Unavailable),
            None => StockStatus::Unavailable,
        }
    }

    async fn add_to_cart(&self, product_id: &str) -> Result<()> {
        self.cart_calls.lock().await.push(product_id.to_string());
        if self.fail_add_to_cart.load(Ordering::SeqCst) {
            return Err(AppError::Retailer {
                retailer: self.name.clone(),
                message: "scripted add-to-cart failure".to_string(),
            });
        }
        Ok(())
    }

    async fn checkout(&self, payment: &PaymentDetails) -> Result<OrderConfirmation> {
        self.checkout_calls.lock().await.push(payment.reference.clone());
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(AppError::Retailer {
                retailer: self.name.clone(),
                message: "scripted checkout failure".to_string(),
            });
        }
        Ok(OrderConfirmation {
            order_id: format!("order-{}", self.checkout_calls.lock().await.len()),
        })
    }
}
