//! Fetcher implementation

use crate::cache::{CachePolicy, CacheStore};
use crate::error::Result;
use crate::http::{HttpClient, RequestSpec};
use crate::pagination::{PaginationPlan, Paginator};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-source fetch settings
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Source name, used in logs and as the local save file stem
    pub name: String,
    /// Cache behaviour
    pub cache: CachePolicy,
    /// Directory the raw document is saved into, if any
    pub local_save: Option<PathBuf>,
    /// Pagination behaviour
    pub pagination: PaginationPlan,
}

impl FetchOptions {
    /// Options for a single uncached request
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the cache policy
    #[must_use]
    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.cache = policy;
        self
    }

    /// Save the raw document under `dir`
    #[must_use]
    pub fn local_save(mut self, dir: impl Into<PathBuf>) -> Self {
        self.local_save = Some(dir.into());
        self
    }

    /// Set the pagination plan
    #[must_use]
    pub fn pagination(mut self, plan: PaginationPlan) -> Self {
        self.pagination = plan;
        self
    }

    /// Cache key for the document these options build from `request`.
    ///
    /// Sources hitting the same URL share an entry only when they also
    /// paginate and unwrap pages the same way.
    pub fn cache_key(&self, request: &RequestSpec) -> String {
        let identity = json!({
            "request": request.signature(),
            "pagination": self.pagination.fingerprint(),
        });
        hex::encode(Sha256::digest(identity.to_string().as_bytes()))
    }

    /// Path the raw document is written to when local save is on
    pub fn local_save_path(&self) -> Option<PathBuf> {
        self.local_save
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", self.name)))
    }
}

/// Retrieves documents through the cache and the paginator
#[derive(Clone)]
pub struct Fetcher {
    client: Arc<HttpClient>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl Fetcher {
    /// Create a fetcher without a cache store
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            cache: None,
        }
    }

    /// Attach a cache store
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The HTTP client requests go through
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Fetch the document for `request`.
    ///
    /// Network failures propagate; cache and local save failures are logged
    /// and never fail the fetch.
    pub async fn fetch(&self, request: &RequestSpec, options: &FetchOptions) -> Result<Value> {
        let cache = self.cache.as_ref().filter(|_| options.cache.enabled);
        let key = options.cache_key(request);

        if let Some(cache) = cache {
            match cache.get(&key).await {
                Ok(Some(entry)) => {
                    info!("Using cached data for '{}'", options.name);
                    return Ok(entry.value);
                }
                Ok(None) => debug!("Cache miss for '{}'", options.name),
                Err(e) => warn!("Cache lookup for '{}' failed: {}", options.name, e),
            }
        }

        info!("Fetching '{}' from {}", options.name, request.url);
        let document = Paginator::new(&self.client)
            .paginate(request.clone(), &options.pagination)
            .await?;

        if let Some(path) = options.local_save_path() {
            match save_document(&path, &document).await {
                Ok(()) => info!("Saved '{}' to {}", options.name, path.display()),
                Err(e) => warn!(
                    "Failed to save '{}' to {}: {}",
                    options.name,
                    path.display(),
                    e
                ),
            }
        }

        if let Some(cache) = cache {
            if let Err(e) = cache.set(&key, document.clone(), options.cache.ttl).await {
                warn!("Failed to cache '{}': {}", options.name, e);
            }
        }

        Ok(document)
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("client", &self.client)
            .field("has_cache", &self.cache.is_some())
            .finish()
    }
}

/// Write a document as pretty JSON, creating parent directories
async fn save_document(path: &Path, document: &Value) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = serde_json::to_string_pretty(document)?;
    tokio::fs::write(path, contents).await?;
    Ok(())
}
