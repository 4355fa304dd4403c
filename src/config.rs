use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub fetch: FetchConfig,
    pub poller: PollerConfig,
    pub dispatcher: DispatcherConfig,
    pub purchase: PurchaseConfig,
    pub notifications: NotificationsConfig,
    pub metrics: MetricsConfig,
    pub retailers: Vec<RetailerEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub retry_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub politeness_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            politeness_delay_ms: 500,
            request_timeout_secs: 15,
            user_agent: "RestockSentry/0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    pub interval_secs: u64,
    pub max_in_flight: usize,
    pub event_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub min_send_gap_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseConfig {
    pub enabled: bool,
    pub payment_reference: String,
    pub outcome_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

/// One seller endpoint to build an adapter for at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailerEndpoint {
    pub name: String,
    pub base_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Add environment-specific config
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables with prefix "RESTOCK_"
            .add_source(Environment::with_prefix("RESTOCK").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.retry_attempts == 0 {
            return Err(ConfigError::Message(
                "fetch.retry_attempts must be greater than 0".into(),
            ));
        }

        if self.fetch.max_delay_ms < self.fetch.base_delay_ms {
            return Err(ConfigError::Message(
                "fetch.max_delay_ms cannot be below fetch.base_delay_ms".into(),
            ));
        }

        if self.poller.interval_secs == 0 {
            return Err(ConfigError::Message(
                "poller.interval_secs must be greater than 0".into(),
            ));
        }

        if self.poller.max_in_flight == 0 {
            return Err(ConfigError::Message(
                "poller.max_in_flight must be greater than 0".into(),
            ));
        }

        if self.poller.event_buffer == 0 {
            return Err(ConfigError::Message(
                "poller.event_buffer must be greater than 0".into(),
            ));
        }

        if self.dispatcher.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "dispatcher.queue_capacity must be greater than 0".into(),
            ));
        }

        if self.purchase.enabled && self.purchase.payment_reference.is_empty() {
            return Err(ConfigError::Message(
                "purchase.payment_reference is required when purchasing is enabled".into(),
            ));
        }

        if self.purchase.outcome_buffer == 0 {
            return Err(ConfigError::Message(
                "purchase.outcome_buffer must be greater than 0".into(),
            ));
        }

        if let Some(url) = &self.notifications.webhook.url {
            if Url::parse(url).is_err() {
                return Err(ConfigError::Message(
                    "Invalid notifications.webhook.url format".into(),
                ));
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message(
                "metrics.port must be greater than 0".into(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for retailer in &self.retailers {
            if retailer.name.trim().is_empty() {
                return Err(ConfigError::Message("retailer name must not be empty".into()));
            }
            if !seen.insert(retailer.name.to_lowercase()) {
                return Err(ConfigError::Message(format!(
                    "duplicate retailer name: {}",
                    retailer.name
                )));
            }
            if Url::parse(&retailer.base_url).is_err() {
                return Err(ConfigError::Message(format!(
                    "Invalid base URL for retailer {}: {}",
                    retailer.name, retailer.base_url
                )));
            }
        }

        Ok(())
    }
}
