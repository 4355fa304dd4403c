use std::time::Duration;

use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use thiserror::Error;

use crate::config::FetchConfig;
use crate::utils::error::AppError;

/// Terminal outcomes of a fetch. Retryable failures (429, 5xx, network,
/// timeout) only surface here once the retry budget is spent.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("resource not found: {url}")]
    NotFound { url: String },

    #[error("request rejected with status {status}: {url}")]
    Rejected { status: u16, url: String },

    #[error("retry budget exhausted after {attempts} attempts: {url}")]
    ExhaustedRetries { url: String, attempts: u32 },
}

enum Attempt {
    Success(String),
    Fatal(FetchError),
    Retryable(String),
}

/// Generic HTTP-with-policy primitive shared by every retailer adapter. It
/// knows nothing about products; it classifies outcomes, retries what is
/// retryable with exponential backoff and jitter, and paces itself with a
/// politeness delay after every attempt.
#[derive(Clone)]
pub struct FetchExecutor {
    client: Client,
    config: FetchConfig,
}

impl FetchExecutor {
    pub fn new(config: FetchConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub async fn get(&self, url: &str) -> Result<String, FetchError> {
        self.fetch(Method::GET, url, None, self.config.retry_attempts)
            .await
    }

    pub async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<String, FetchError> {
        self.fetch(Method::POST, url, Some(body), self.config.retry_attempts)
            .await
    }

    /// Issue one logical request with an explicit retry budget (total
    /// attempts, including the first).
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        retry_budget: u32,
    ) -> Result<String, FetchError> {
        let budget = retry_budget.max(1);

        for attempt in 0..budget {
            let outcome = self.attempt_once(method.clone(), url, body).await;

            // Politeness pacing applies after every attempt, success included.
            tokio::time::sleep(Duration::from_millis(self.config.politeness_delay_ms)).await;

            match outcome {
                Attempt::Success(text) => return Ok(text),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Retryable(reason) => {
                    if attempt + 1 < budget {
                        let delay = self.backoff_delay(attempt);
                        tracing::warn!(
                            %url,
                            attempt = attempt + 1,
                            budget,
                            delay_ms = delay.as_millis() as u64,
                            %reason,
                            "request failed, backing off"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        tracing::error!(%url, budget, %reason, "all attempts failed");
                    }
                }
            }
        }

        Err(FetchError::ExhaustedRetries {
            url: url.to_string(),
            attempts: budget,
        })
    }

    async fn attempt_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
    ) -> Attempt {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return Attempt::Retryable(format!("transport error: {err}")),
        };

        let status = response.status();
        if status.is_success() {
            return match response.text().await {
                Ok(text) => Attempt::Success(text),
                Err(err) => Attempt::Retryable(format!("body read failed: {err}")),
            };
        }

        if status == StatusCode::NOT_FOUND {
            return Attempt::Fatal(FetchError::NotFound {
                url: url.to_string(),
            });
        }

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Attempt::Retryable(format!("status {status}"));
        }

        Attempt::Fatal(FetchError::Rejected {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }

    /// Delay before retry `attempt + 1`: `base * 2^attempt` plus uniform
    /// jitter of up to half the base, capped at `max_delay_ms`. The jitter
    /// span is below the exponential step, so successive delays never
    /// shrink until the cap.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms.max(1);
        let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let exp_ms = base.saturating_mul(multiplier).min(self.config.max_delay_ms);

        let jitter_span = base / 2;
        if jitter_span == 0 {
            return Duration::from_millis(exp_ms);
        }
        let jitter_ms = rand::thread_rng().gen_range(0..jitter_span);
        Duration::from_millis(exp_ms.saturating_add(jitter_ms).min(self.config.max_delay_ms))
    }
}
