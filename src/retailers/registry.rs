use std::collections::HashMap;
use std::sync::Arc;

use super::Retailer;

/// Fixed mapping from seller name to adapter, built once at startup. Lookups
/// are case-insensitive, matching how users type retailer names.
#[derive(Default)]
pub struct RetailerRegistry {
    retailers: HashMap<String, Arc<dyn Retailer>>,
}

impl RetailerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, retailer: Arc<dyn Retailer>) {
        let name = retailer.name().to_lowercase();
        if self.retailers.insert(name, retailer).is_some() {
            tracing::warn!("duplicate retailer registration replaced previous adapter");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Retailer>> {
        self.retailers.get(&name.to_lowercase()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.retailers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.retailers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retailers.is_empty()
    }
}
