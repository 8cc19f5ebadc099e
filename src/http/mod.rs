//! HTTP client module
//!
//! The HTTP collaborator of the fetch pipeline. Retry, backoff and timeouts
//! live here; the fetcher and paginator never retry on their own.
//!
//! # Features
//!
//! - **Request descriptions**: `RequestSpec` with a stable cache signature
//! - **Automatic Retries**: Configurable retry logic with backoff
//! - **Rate Limiting**: Token bucket rate limiter using governor

mod client;
mod rate_limit;
mod request;

pub use client::{HttpClient, HttpClientConfig, HttpClientConfigBuilder, HttpResponse};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use request::RequestSpec;
