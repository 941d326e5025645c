//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Bounding in-flight requests with a shared semaphore
//! - Retrying transient failures with exponential backoff
//! - Error classification

use crate::config::CrawlerConfig;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

/// Upper bound for a single backoff wait
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Errors returned by the fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("server error: HTTP {status}")]
    ServerError { status: u16 },

    #[error("rate limited: HTTP 429")]
    RateLimited { retry_after: Option<Duration> },

    #[error("client error: HTTP {status}")]
    ClientError { status: u16 },

    #[error("request failed: {0}")]
    Request(String),

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Returns true for failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect(_) | Self::ServerError { .. } | Self::RateLimited { .. }
        )
    }
}

/// Retry behavior of the fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl FetchPolicy {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_delay(),
            max_delay: MAX_BACKOFF,
        }
    }

    /// Wait before retry number `attempt + 1`: `base * 2^attempt`, capped
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Builds an HTTP client with proper configuration
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout())
        .connect_timeout(config.timeout().min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Concurrency-bounded fetcher with retry
///
/// Clones share the client and the concurrency limit.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: FetchPolicy,
    permits: Arc<Semaphore>,
}

impl Fetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config)?;
        Ok(Self::with_client(
            client,
            FetchPolicy::from_config(config),
            config.concurrency as usize,
        ))
    }

    pub fn with_client(client: Client, policy: FetchPolicy, concurrency: usize) -> Self {
        Self {
            client,
            policy,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Fetches a URL and returns its body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 2xx | Return body |
    /// | Timeout, connection failure | Retry with backoff |
    /// | HTTP 5xx | Retry with backoff |
    /// | HTTP 429 | Retry; `Retry-After` raises the wait |
    /// | Other 4xx | Return immediately |
    ///
    /// The concurrency permit is held for the request only, not while backing off.
    pub async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let mut attempt: u32 = 0;
        let mut previous_delay = Duration::ZERO;

        loop {
            let result = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|_| FetchError::Request("fetcher is closed".to_string()))?;
                self.fetch_once(url).await
            };

            let err = match result {
                Ok(body) => return Ok(body),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            if attempt >= self.policy.max_retries {
                return Err(FetchError::Exhausted {
                    url: url.to_string(),
                    attempts: attempt + 1,
                    last: Box::new(err),
                });
            }

            let mut delay = self.policy.backoff_delay(attempt).max(previous_delay);
            if let FetchError::RateLimited {
                retry_after: Some(wait),
            } = &err
            {
                delay = delay.max((*wait).min(self.policy.max_delay));
            }
            previous_delay = delay;

            debug!(
                "Retrying {} in {:?} (attempt {}/{}): {}",
                url,
                delay,
                attempt + 1,
                self.policy.max_retries,
                err
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn fetch_once(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return response.text().await.map_err(classify_reqwest_error);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers());
            warn!("Rate limited by {} (retry-after: {:?})", url, retry_after);
            return Err(FetchError::RateLimited { retry_after });
        }

        if status.is_server_error() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
            });
        }

        Err(FetchError::ClientError {
            status: status.as_u16(),
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() || e.is_request() || e.is_body() {
        FetchError::Connect(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}

/// Reads a `Retry-After` value given in seconds
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
