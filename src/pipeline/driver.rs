//! Pipeline driver
//!
//! Runs every configured source in order: resolve and render its config,
//! fetch the document, then normalize it into nodes. Sources never share
//! state except the cache.

use super::types::{Capabilities, RunStats, SourceHooks};
use crate::auth::{AuthToken, Authenticator};
use crate::cache::{CachePolicy, CacheStore, FileCache, MemoryCache};
use crate::config::{PipelineConfig, SourceConfig};
use crate::error::Result;
use crate::fetch::{FetchOptions, Fetcher};
use crate::http::{HttpClient, RequestSpec};
use crate::normalize::{DerivedField, NormalizeConfig, Normalized, Normalizer};
use crate::pagination::{MergeStrategy, NextRequest, PaginationPlan};
use crate::template::TemplateContext;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Fetch-and-normalize driver over a pipeline configuration
pub struct Pipeline {
    config: PipelineConfig,
    caps: Capabilities,
    cache: Arc<dyn CacheStore>,
    template_ctx: TemplateContext,
    hooks: HashMap<String, SourceHooks>,
}

impl Pipeline {
    /// Create a pipeline. Config placeholders render against the process
    /// environment.
    pub fn new(config: PipelineConfig, caps: Capabilities) -> Self {
        let cache: Arc<dyn CacheStore> = match (&caps.cache, &config.cache_dir) {
            (Some(cache), _) => cache.clone(),
            (None, Some(dir)) => Arc::new(FileCache::new(dir)),
            (None, None) => Arc::new(MemoryCache::new()),
        };

        Self {
            config,
            caps,
            cache,
            template_ctx: TemplateContext::from_env(),
            hooks: HashMap::new(),
        }
    }

    /// Render config placeholders against `ctx` instead of the process
    /// environment
    #[must_use]
    pub fn with_template_context(mut self, ctx: TemplateContext) -> Self {
        self.template_ctx = ctx;
        self
    }

    /// Paginate the source producing `node_type` (type prefix plus entity
    /// name) with `next`, folding pages with `merge`. Takes precedence over a
    /// configured strategy.
    #[must_use]
    pub fn with_next_request(
        mut self,
        node_type: impl Into<String>,
        next: impl NextRequest + 'static,
        merge: MergeStrategy,
    ) -> Self {
        let next: Arc<dyn NextRequest> = Arc::new(next);
        self.hooks
            .entry(node_type.into())
            .or_default()
            .next_request = Some((next, merge));
        self
    }

    /// Compute `field` for every node of type `node_type`, after the
    /// source's configured derived fields
    #[must_use]
    pub fn with_derived_field(mut self, node_type: impl Into<String>, field: DerivedField) -> Self {
        self.hooks
            .entry(node_type.into())
            .or_default()
            .derived_fields
            .push(field);
        self
    }

    /// The configuration this pipeline runs
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every source once.
    ///
    /// A failed source is logged and counted; with `fail_fast` its error
    /// aborts the run instead.
    pub async fn run(&self) -> Result<RunStats> {
        let client = Arc::new(HttpClient::with_config(
            self.config.http.to_client_config(),
        )?);
        let token = self.authenticate(&client).await;
        let fetcher = Fetcher::new(client).with_cache(self.cache.clone());

        let mut stats = RunStats::default();
        for source in self.config.sources() {
            let name = source.type_name();
            match self.run_source(&fetcher, &source, token.as_ref()).await {
                Ok(Some(normalized)) => {
                    info!(
                        "Source '{}': {} node(s), {} field(s)",
                        name,
                        normalized.nodes.len(),
                        normalized.fields_created
                    );
                    stats.sources_processed += 1;
                    stats.nodes_created += normalized.nodes.len();
                    stats.fields_created += normalized.fields_created;
                }
                Ok(None) => {
                    info!("Source '{name}': fetched, node creation skipped");
                    stats.sources_processed += 1;
                    stats.sources_skipped += 1;
                }
                Err(e) => {
                    let stage = if e.is_fetch_error() {
                        "fetch"
                    } else if e.is_extraction_error() {
                        "extraction"
                    } else {
                        "normalization"
                    };
                    error!("Source '{name}' failed during {stage}: {e}");
                    if self.config.fail_fast {
                        return Err(e);
                    }
                    stats.sources_failed += 1;
                }
            }
        }

        info!(
            "Pipeline finished: {} processed, {} failed, {} node(s)",
            stats.sources_processed, stats.sources_failed, stats.nodes_created
        );
        Ok(stats)
    }

    /// Acquire the auth token, if configured. Never fails the run.
    async fn authenticate(&self, client: &HttpClient) -> Option<AuthToken> {
        let auth = match self.config.rendered_auth(&self.template_ctx) {
            Ok(Some(auth)) => auth,
            Ok(None) => return None,
            Err(e) => {
                error!("Failed to prepare auth request: {e}");
                return None;
            }
        };

        match Authenticator::new(auth).authenticate(client).await {
            Ok(token) => Some(token),
            Err(e) => {
                warn!("{e}; continuing without a token");
                None
            }
        }
    }

    /// Fetch and normalize one source; `None` when node creation is skipped
    async fn run_source(
        &self,
        fetcher: &Fetcher,
        source: &SourceConfig,
        token: Option<&AuthToken>,
    ) -> Result<Option<Normalized>> {
        let source = source.prepare(&self.template_ctx)?;
        let hooks = self.hooks.get(&source.type_name());

        let mut request = build_request(&source);
        if let Some(token) = token {
            request = token.apply(request);
        }

        let document = fetcher
            .fetch(&request, &fetch_options(&source, hooks))
            .await?;

        if source.skip_node_creation {
            return Ok(None);
        }

        let normalizer = Normalizer::new(
            self.caps.ids.clone(),
            self.caps.nodes.clone(),
            self.caps.fields.clone(),
        )
        .with_refresh_endpoint(self.caps.env.refresh_endpoint);

        let mut config = NormalizeConfig::new(source.type_name());
        config.selector_path = source.selector_path.clone();
        config.schema_hint = source.schema_hint.clone();
        config.refresh_enabled = source.dev_refresh_enabled && self.caps.env.development;
        config.refresh_key_field = source.refresh_key_field.clone();
        config.verbose = source.verbose;
        config.derived_fields = source
            .derived_fields
            .iter()
            .cloned()
            .map(DerivedField::from)
            .collect();
        if let Some(hooks) = hooks {
            config.derived_fields.extend(hooks.derived_fields.iter().cloned());
        }

        normalizer.normalize(&document, &config).map(Some)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("sources", &self.config.sources().len())
            .field("caps", &self.caps)
            .finish_non_exhaustive()
    }
}

/// The source's first request
fn build_request(source: &SourceConfig) -> RequestSpec {
    let mut request = RequestSpec::new(&source.url).method(source.method);
    for (key, value) in &source.headers {
        request = request.header(key, value);
    }
    for (key, value) in &source.request_params {
        request = request.query(key, value);
    }
    if let Some(ref body) = source.body {
        request = request.json(body.clone());
    }
    request
}

fn fetch_options(source: &SourceConfig, hooks: Option<&SourceHooks>) -> FetchOptions {
    let configured = source.pagination.as_ref();
    let mut plan = match hooks.and_then(|h| h.next_request.clone()) {
        Some((next, merge)) => PaginationPlan::with_next(next)
            .merge(merge)
            .strategy_id(format!("next_request:{}", source.type_name())),
        None => match configured {
            Some(pagination) => PaginationPlan::with_next(pagination.build())
                .merge(pagination.merge)
                .strategy_id(serde_json::to_string(&pagination.strategy).unwrap_or_default()),
            None => PaginationPlan::single(),
        },
    };
    plan = plan
        .query_params(source.request_params.clone())
        .max_pages(configured.and_then(|p| p.max_pages))
        .payload_key(source.payload_key.clone())
        .records_path(source.selector_path.clone());

    let cache = if source.cache_enabled {
        CachePolicy::enabled(source.cache_ttl_seconds)
    } else {
        CachePolicy::disabled()
    };

    let mut options = FetchOptions::new(&source.entity_type_name)
        .cache(cache)
        .pagination(plan);
    if source.local_save {
        options = options.local_save(source.storage_dir());
    }
    options
}
