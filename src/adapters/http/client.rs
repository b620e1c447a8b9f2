//! Exchange REST Client - Rate-limited HTTP Client
//!
//! Wraps reqwest with a per-exchange request quota, bounded concurrency,
//! per-request timeouts and retries for all exchange REST polling.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for an exchange REST client.
#[derive(Debug, Clone)]
pub struct RestClientConfig {
  /// Base URL every request path is appended to.
  pub base_url: String,
  /// Request timeout. Bounds how long a fetch can delay shutdown.
  pub timeout: Duration,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
  /// Outbound request quota.
  pub requests_per_second: u32,
}

impl Default for RestClientConfig {
  fn default() -> Self {
    Self {
      base_url: String::new(),
      timeout: Duration::from_secs(30),
      max_concurrent: 4,
      max_retries: 3,
      retry_base_delay: Duration::from_millis(200),
      requests_per_second: 5,
    }
  }
}

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate-limited HTTP client for one exchange's REST API.
pub struct RestClient {
  /// Underlying HTTP client.
  http: Client,
  /// Client configuration.
  config: RestClientConfig,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Request quota.
  limiter: DirectLimiter,
}

impl RestClient {
  /// Create a new REST client.
  pub fn new(config: RestClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
    let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
    let limiter = RateLimiter::direct(Quota::per_second(per_second));

    Ok(Self {
      http,
      config,
      semaphore,
      limiter,
    })
  }

  /// Base URL of this client.
  pub fn base_url(&self) -> &str {
    &self.config.base_url
  }

  /// Full URL for a path.
  pub fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  /// GET `path` and decode the JSON body.
  pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
    let response = self.get(path).await?;
    response
      .json::<T>()
      .await
      .with_context(|| format!("Failed to decode response of {path}"))
  }

  /// Execute a GET request with rate limiting and retries.
  pub async fn get(&self, path: &str) -> Result<Response> {
    let url = self.url(path);

    let _permit = self
      .semaphore
      .acquire()
      .await
      .context("Semaphore closed")?;

    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis(), url = %url, "Retrying request");
        sleep(delay).await;
      }

      self.limiter.until_ready().await;

      match self.http.get(&url).send().await {
        Ok(response) => match response.status() {
          StatusCode::OK => return Ok(response),
          StatusCode::TOO_MANY_REQUESTS => {
            warn!(url = %url, "Rate limited by exchange, backing off");
            sleep(Duration::from_secs(2)).await;
            last_error = Some(anyhow::anyhow!("Rate limited"));
          }
          status if status.is_server_error() => {
            warn!(status = %status, url = %url, "Server error, retrying");
            last_error = Some(anyhow::anyhow!("Server error: {status}"));
          }
          status => {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("API error {status} for {url}: {body}"));
          }
        },
        Err(e) => {
          warn!(error = %e, attempt, url = %url, "Request failed");
          last_error = Some(e.into());
        }
      }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Max retries exceeded")))
  }
}
