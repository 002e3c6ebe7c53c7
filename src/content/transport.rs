//! Resilient HTTP GET transport shared by every content call.
//!
//! Each request carries a fixed timeout. Transport errors (connect, timeout,
//! body read) and the configured transient statuses are retried with
//! exponential backoff; any other status is handed back to the caller
//! untouched on the first attempt.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, error, warn};

use crate::config::ContentConfig;

/// When and how often to retry a GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each subsequent one.
    pub backoff: Duration,
    pub retry_statuses: Vec<u16>,
}

impl RetryPolicy {
    pub fn from_config(config: &ContentConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.backoff,
            retry_statuses: config.retry_statuses.clone(),
        }
    }

    pub fn is_transient(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

/// A response the transport did not consider transient.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: String,
    /// Retries spent before this reply arrived.
    pub retries: u32,
}

/// Every attempt failed transiently.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason} (after {retries} retries)")]
pub struct TransportFailure {
    pub reason: String,
    pub retries: u32,
}

/// reqwest client plus retry policy. Cheap to clone: `Client` is an `Arc`
/// internally.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    policy: RetryPolicy,
}

impl HttpTransport {
    pub fn new(timeout: Duration, policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, policy })
    }

    /// GET `url`, retrying transient failures per the policy.
    pub async fn get(&self, url: &str) -> Result<HttpReply, TransportFailure> {
        let mut retries = 0u32;
        loop {
            debug!(%url, attempt = retries + 1, "content request");
            let reason = match self.attempt(url).await {
                Ok((status, body)) if !self.policy.is_transient(status) => {
                    return Ok(HttpReply { status, body, retries });
                }
                Ok((status, _)) => format!("HTTP {status}"),
                Err(e) if e.is_timeout() => format!("timed out: {e}"),
                Err(e) => format!("transport error: {e}"),
            };

            if retries >= self.policy.max_retries {
                error!(%url, retries, %reason, "content request failed, retries exhausted");
                return Err(TransportFailure { reason, retries });
            }
            retries += 1;
            let delay = self.policy.delay_for(retries);
            warn!(%url, retry = retries, delay_ms = delay.as_millis() as u64, %reason, "retrying content request");
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, url: &str) -> Result<(StatusCode, String), reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}
