//! HTTP client with retry and rate limiting
//!
//! Provides the HTTP collaborator the fetch pipeline delegates to:
//! - Automatic retries with configurable backoff
//! - Rate limiting to prevent API throttling
//! - JSON response parsing
//! - Error classification for retry decisions

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::request::RequestSpec;
use crate::error::{Error, Result};
use crate::types::BackoffType;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: format!("apinode/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// A decoded response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers (used by link-header pagination)
    pub headers: HeaderMap,
    /// Parsed JSON body; an empty body is `Null`
    pub body: Value,
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Send a request and decode its JSON body
    pub async fn send(&self, spec: &RequestSpec) -> Result<HttpResponse> {
        let response = self.execute(spec).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let text = response
            .text()
            .await
            .map_err(|e| Error::fetch(&spec.url, format!("Failed to read response body: {e}")))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| Error::fetch(&spec.url, format!("Response is not JSON: {e}")))?
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Send a request, retrying transient failures.
    ///
    /// 429 responses wait for `Retry-After`; other retryable failures back
    /// off per the configured strategy. The last failure is returned once
    /// retries run out.
    pub async fn execute(&self, spec: &RequestSpec) -> Result<Response> {
        let method: reqwest::Method = spec.method.into();
        let mut retries = 0;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let failure = match self.request(method.clone(), spec).send().await {
                Ok(response) => match reject_error_status(response).await {
                    Ok(response) => {
                        debug!("{} {} -> {}", method, spec.url, response.status());
                        return Ok(response);
                    }
                    Err(e) => e,
                },
                Err(e) if e.is_timeout() => Error::Timeout {
                    timeout_ms: self.config.timeout.as_millis() as u64,
                },
                Err(e) if e.is_connect() => Error::Http(e),
                Err(e) => return Err(Error::Http(e)),
            };

            if retries >= self.config.max_retries || !failure.is_retryable() {
                return Err(failure);
            }

            let delay = match failure {
                Error::RateLimited {
                    retry_after_seconds,
                } => Duration::from_secs(retry_after_seconds),
                _ => self.calculate_backoff(retries),
            };
            retries += 1;
            warn!(
                "{} {}: {failure}; retry {retries}/{} in {delay:?}",
                method, spec.url, self.config.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn request(&self, method: reqwest::Method, spec: &RequestSpec) -> reqwest::RequestBuilder {
        let headers = self.config.default_headers.iter().chain(&spec.headers);
        let mut req = headers.fold(self.client.request(method, &spec.url), |req, (k, v)| {
            req.header(k.as_str(), v.as_str())
        });
        if !spec.query.is_empty() {
            req = req.query(&spec.query);
        }
        match spec.body {
            Some(ref body) => req.json(body),
            None => req,
        }
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff * factor
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Turn 4xx/5xx responses into errors, keeping the body for diagnostics
async fn reject_error_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_seconds = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(60);
        return Err(Error::RateLimited {
            retry_after_seconds,
        });
    }
    if status.is_client_error() || status.is_server_error() {
        let body = response.text().await.unwrap_or_default();
        return Err(Error::http_status(status.as_u16(), body));
    }
    Ok(response)
}
