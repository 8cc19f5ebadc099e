//! Cache types and traits

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Default time-to-live for cached documents (one day)
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 60 * 60 * 24;

/// A cached document with its expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request signature the document was stored under
    pub key: String,
    /// The cached document
    pub value: Value,
    /// When this entry stops being served
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry that expires `ttl` after `now`
    pub fn new(key: impl Into<String>, value: Value, now: DateTime<Utc>, ttl: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            key: key.into(),
            value,
            expires_at,
        }
    }

    /// Check whether this entry is expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Whether and for how long a fetch result is cached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Read from and write to the cache
    pub enabled: bool,
    /// Lifetime of stored entries
    pub ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
        }
    }
}

impl CachePolicy {
    /// Caching disabled
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Caching enabled with the given TTL in seconds
    pub fn enabled(ttl_seconds: u64) -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(ttl_seconds),
        }
    }
}

/// Time-boxed document store keyed by request signature
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a live entry; expired entries are reported as `None`
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store a document for `ttl`
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;
}

/// Source of the current time for expiry checks
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at the given instant
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at the current wall-clock time
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
