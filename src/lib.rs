pub mod config;
pub mod dispatcher;
pub mod fetch;
pub mod models;
pub mod notifiers;
pub mod poller;
pub mod purchase;
pub mod retailers;
pub mod subscriptions;
pub mod utils;

// Re-export commonly used types
pub use config::AppConfig;
pub use utils::error::{AppError, Result};
