//! Pipeline types

use crate::cache::CacheStore;
use crate::config::Environment;
use crate::normalize::{DerivedField, FieldSink, IdGenerator, NodeCollector, NodeSink, UuidIdGenerator};
use crate::pagination::{MergeStrategy, NextRequest};
use serde::Serialize;
use std::sync::Arc;

/// Host services a pipeline run consumes
#[derive(Clone)]
pub struct Capabilities {
    /// Node id source
    pub ids: Arc<dyn IdGenerator>,
    /// Node registration
    pub nodes: Arc<dyn NodeSink>,
    /// Derived field registration
    pub fields: Arc<dyn FieldSink>,
    /// Shared cache; the pipeline picks one from its config when unset
    pub cache: Option<Arc<dyn CacheStore>>,
    /// Development mode and refresh endpoint flags
    pub env: Environment,
}

impl Capabilities {
    /// Capabilities emitting through the given services
    pub fn new(
        ids: Arc<dyn IdGenerator>,
        nodes: Arc<dyn NodeSink>,
        fields: Arc<dyn FieldSink>,
    ) -> Self {
        Self {
            ids,
            nodes,
            fields,
            cache: None,
            env: Environment::default(),
        }
    }

    /// Random ids, everything collected into `collector`
    pub fn collecting(collector: Arc<NodeCollector>) -> Self {
        Self::new(Arc::new(UuidIdGenerator), collector.clone(), collector)
    }

    /// Use `cache` for every source
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Set the environment flags
    #[must_use]
    pub fn with_env(mut self, env: Environment) -> Self {
        self.env = env;
        self
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("cache", &self.cache.is_some())
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

/// Programmatic additions to one configured source
#[derive(Clone, Default)]
pub(crate) struct SourceHooks {
    pub next_request: Option<(Arc<dyn NextRequest>, MergeStrategy)>,
    pub derived_fields: Vec<DerivedField>,
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Sources fetched successfully, fetch-only ones included
    pub sources_processed: usize,
    /// Sources fetched without creating nodes
    pub sources_skipped: usize,
    /// Sources aborted by an error
    pub sources_failed: usize,
    /// Nodes created, dummy nodes included
    pub nodes_created: usize,
    /// Derived fields registered
    pub fields_created: usize,
}
