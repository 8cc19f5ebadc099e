//! Configuration types for pipeline definitions
//!
//! A pipeline is described in one YAML document: shared source defaults at the
//! top level, per-entity overrides under `entities`, plus the optional token
//! request and HTTP client settings.

use crate::auth::AuthConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::normalize::DerivedFieldConfig;
use crate::pagination::{PaginationConfig, StrategyConfig};
use crate::template::{has_templates, render, render_value, TemplateContext};
use crate::types::{BackoffType, JsonObject, JsonValue, Method, OptionStringExt, StringMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that switches on development mode
pub const DEV_MODE_VAR: &str = "APINODE_ENV";

/// Environment variable that enables the refresh endpoint
pub const REFRESH_ENDPOINT_VAR: &str = "ENABLE_REFRESH_ENDPOINT";

// ============================================================================
// Top-Level Pipeline Config
// ============================================================================

/// Complete pipeline configuration loaded from YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Shared defaults every entity override is merged onto
    #[serde(flatten)]
    pub defaults: SourceConfig,

    /// Per-entity overrides; empty means one source built from the defaults
    #[serde(default)]
    pub entities: Vec<EntityOverride>,

    /// Token request issued before any source is fetched
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpSettings,

    /// Directory for the file-backed cache; in-memory when unset
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Abort the run on the first failed source instead of skipping it
    #[serde(default)]
    pub fail_fast: bool,
}

impl PipelineConfig {
    /// Effective configuration of every source, in configured order
    pub fn sources(&self) -> Vec<SourceConfig> {
        if self.entities.is_empty() {
            return vec![self.defaults.clone()];
        }
        self.entities
            .iter()
            .map(|entity| resolve(&self.defaults, entity))
            .collect()
    }

    /// The auth request with `{{ env.* }}` placeholders rendered
    pub fn rendered_auth(&self, ctx: &TemplateContext) -> Result<Option<AuthConfig>> {
        let Some(ref auth) = self.auth else {
            return Ok(None);
        };

        let mut auth = auth.clone();
        auth.url = render(&auth.url, ctx)?;
        auth.headers = render_map(&auth.headers, ctx)?;
        auth.body = auth.body.as_ref().map(|b| render_value(b, ctx)).transpose()?;
        Ok(Some(auth))
    }
}

// ============================================================================
// Source Config
// ============================================================================

/// Effective configuration of one source (one entity type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Prepended to the entity type name to form the node type
    #[serde(default)]
    pub type_prefix: String,

    /// Endpoint URL
    #[serde(default)]
    pub url: String,

    /// HTTP method
    #[serde(default)]
    pub method: Method,

    /// Request headers
    #[serde(default)]
    pub headers: StringMap,

    /// JSON request body
    #[serde(default)]
    pub body: Option<JsonValue>,

    /// Query parameters added to every request
    #[serde(default, alias = "params")]
    pub request_params: StringMap,

    /// Key each response body is unwrapped at
    #[serde(default)]
    pub payload_key: Option<String>,

    /// Write the raw document to disk
    #[serde(default)]
    pub local_save: bool,

    /// Directory for locally saved documents
    #[serde(default)]
    pub storage_path: Option<PathBuf>,

    /// Fetch only, create no nodes
    #[serde(default)]
    pub skip_node_creation: bool,

    /// Where the entity collection sits in the document
    #[serde(default, alias = "entity_level_path")]
    pub selector_path: Option<String>,

    /// Entity type, required
    #[serde(default)]
    pub entity_type_name: String,

    /// Fields of the dummy node
    #[serde(default)]
    pub schema_hint: Option<JsonObject>,

    /// Declarative derived fields
    #[serde(default)]
    pub derived_fields: Vec<DerivedFieldConfig>,

    /// Next-request strategy; single request when unset
    #[serde(default)]
    pub pagination: Option<PaginationConfig>,

    /// Serve repeated requests from the cache
    #[serde(default)]
    pub cache_enabled: bool,

    /// Cache entry lifetime
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Use the refresh key field as node id in development mode
    #[serde(default)]
    pub dev_refresh_enabled: bool,

    /// Field whose value becomes the node id in refresh mode
    #[serde(default = "default_refresh_key_field")]
    pub refresh_key_field: String,

    /// Log every key rename
    #[serde(default)]
    pub verbose: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            type_prefix: String::new(),
            url: String::new(),
            method: Method::GET,
            headers: StringMap::new(),
            body: None,
            request_params: StringMap::new(),
            payload_key: None,
            local_save: false,
            storage_path: None,
            skip_node_creation: false,
            selector_path: None,
            entity_type_name: String::new(),
            schema_hint: None,
            derived_fields: Vec::new(),
            pagination: None,
            cache_enabled: false,
            cache_ttl_seconds: default_cache_ttl(),
            dev_refresh_enabled: false,
            refresh_key_field: default_refresh_key_field(),
            verbose: false,
        }
    }
}

fn default_cache_ttl() -> u64 {
    86_400
}

fn default_refresh_key_field() -> String {
    "id".to_string()
}

impl SourceConfig {
    /// Node type, `type_prefix + entity_type_name`
    pub fn type_name(&self) -> String {
        format!("{}{}", self.type_prefix, self.entity_type_name)
    }

    /// Directory locally saved documents go to
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Render `{{ env.* }}` placeholders in url, headers, params and body,
    /// then validate the result
    pub fn prepare(&self, ctx: &TemplateContext) -> Result<Self> {
        let mut source = self.clone();
        source.url = render(&self.url, ctx)?;
        source.headers = render_map(&self.headers, ctx)?;
        source.request_params = render_map(&self.request_params, ctx)?;
        source.body = self.body.as_ref().map(|b| render_value(b, ctx)).transpose()?;

        source.validate()?;
        Ok(source)
    }

    /// Check required fields and the URL
    pub fn validate(&self) -> Result<()> {
        if self.entity_type_name.is_empty() {
            return Err(Error::missing_field("entity_type_name"));
        }
        if self.url.is_empty() {
            return Err(Error::missing_field(format!(
                "url (entity '{}')",
                self.entity_type_name
            )));
        }
        url::Url::parse(&self.url)?;

        if let Some(PaginationConfig {
            strategy: StrategyConfig::Offset { limit: 0, .. },
            ..
        }) = self.pagination
        {
            return Err(Error::invalid_value(
                "pagination.limit",
                "offset pagination needs a limit above zero",
            ));
        }

        for field in &self.derived_fields {
            if field.value.contains("{{") && !has_templates(&field.value) {
                return Err(Error::template(format!(
                    "Derived field '{}' has a malformed placeholder: {}",
                    field.name, field.value
                )));
            }
        }
        Ok(())
    }
}

fn render_map(map: &StringMap, ctx: &TemplateContext) -> Result<StringMap> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), render(v, ctx)?)))
        .collect()
}

// ============================================================================
// Entity Overrides
// ============================================================================

/// Per-entity settings, named as in [`SourceConfig`]; each one replaces the
/// shared default when truthy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityOverride {
    pub type_prefix: Option<String>,
    pub url: Option<String>,
    pub method: Option<Method>,
    pub headers: Option<StringMap>,
    pub body: Option<JsonValue>,
    #[serde(alias = "params")]
    pub request_params: Option<StringMap>,
    pub payload_key: Option<String>,
    pub local_save: Option<bool>,
    pub storage_path: Option<PathBuf>,
    pub skip_node_creation: Option<bool>,
    #[serde(alias = "entity_level_path")]
    pub selector_path: Option<String>,
    pub entity_type_name: Option<String>,
    pub schema_hint: Option<JsonObject>,
    pub derived_fields: Option<Vec<DerivedFieldConfig>>,
    pub pagination: Option<PaginationConfig>,
    pub cache_enabled: Option<bool>,
    pub cache_ttl_seconds: Option<u64>,
    pub dev_refresh_enabled: Option<bool>,
    pub refresh_key_field: Option<String>,
    pub verbose: Option<bool>,
}

/// Merge `entity` over `defaults` into a fresh effective config.
///
/// An override wins only when its value is truthy: a non-empty string, `true`,
/// a non-zero number, any present map or list, or a JSON body that is not
/// `null`, `false`, `0` or `""`. Neither input is modified.
pub fn resolve(defaults: &SourceConfig, entity: &EntityOverride) -> SourceConfig {
    SourceConfig {
        type_prefix: pick_string(&defaults.type_prefix, &entity.type_prefix),
        url: pick_string(&defaults.url, &entity.url),
        method: entity.method.unwrap_or(defaults.method),
        headers: pick(&defaults.headers, &entity.headers),
        body: match entity.body {
            Some(ref body) if is_truthy(body) => Some(body.clone()),
            _ => defaults.body.clone(),
        },
        request_params: pick(&defaults.request_params, &entity.request_params),
        payload_key: pick_opt_string(&defaults.payload_key, &entity.payload_key),
        local_save: pick_flag(defaults.local_save, entity.local_save),
        storage_path: entity
            .storage_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| defaults.storage_path.clone()),
        skip_node_creation: pick_flag(defaults.skip_node_creation, entity.skip_node_creation),
        selector_path: pick_opt_string(&defaults.selector_path, &entity.selector_path),
        entity_type_name: pick_string(&defaults.entity_type_name, &entity.entity_type_name),
        schema_hint: entity
            .schema_hint
            .clone()
            .or_else(|| defaults.schema_hint.clone()),
        derived_fields: pick(&defaults.derived_fields, &entity.derived_fields),
        pagination: entity
            .pagination
            .clone()
            .or_else(|| defaults.pagination.clone()),
        cache_enabled: pick_flag(defaults.cache_enabled, entity.cache_enabled),
        cache_ttl_seconds: entity
            .cache_ttl_seconds
            .filter(|ttl| *ttl != 0)
            .unwrap_or(defaults.cache_ttl_seconds),
        dev_refresh_enabled: pick_flag(defaults.dev_refresh_enabled, entity.dev_refresh_enabled),
        refresh_key_field: pick_string(&defaults.refresh_key_field, &entity.refresh_key_field),
        verbose: pick_flag(defaults.verbose, entity.verbose),
    }
}

fn pick<T: Clone>(base: &T, over: &Option<T>) -> T {
    over.clone().unwrap_or_else(|| base.clone())
}

fn pick_string(base: &str, over: &Option<String>) -> String {
    over.clone()
        .none_if_empty()
        .unwrap_or_else(|| base.to_string())
}

fn pick_opt_string(base: &Option<String>, over: &Option<String>) -> Option<String> {
    over.clone().none_if_empty().or_else(|| base.clone())
}

fn pick_flag(base: bool, over: Option<bool>) -> bool {
    over == Some(true) || base
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// HTTP client settings shared by every source and the auth request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Maximum number of retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff configuration
    #[serde(default)]
    pub retry_backoff: BackoffConfig,

    /// Token bucket rate limit; unlimited when unset
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff: BackoffConfig::default(),
            rate_limit: None,
            user_agent: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl HttpSettings {
    /// Client configuration for these settings
    pub fn to_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .timeout(Duration::from_secs(self.timeout_seconds))
            .max_retries(self.max_retries)
            .backoff(
                self.retry_backoff.backoff_type,
                Duration::from_millis(self.retry_backoff.initial_ms),
                Duration::from_millis(self.retry_backoff.max_ms),
            );
        if let Some(ref limit) = self.rate_limit {
            builder = builder.rate_limit(limit.clone());
        }
        if let Some(ref agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        builder.build()
    }
}

/// Backoff configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_ms")]
    pub initial_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::Exponential,
            initial_ms: default_initial_ms(),
            max_ms: default_max_ms(),
        }
    }
}

fn default_initial_ms() -> u64 {
    100
}

fn default_max_ms() -> u64 {
    60000
}

// ============================================================================
// Environment Signals
// ============================================================================

/// Host environment flags consulted by the normalizer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Environment {
    /// Development mode; refresh ids only apply here
    pub development: bool,
    /// The refresh endpoint is enabled
    pub refresh_endpoint: bool,
}

impl Environment {
    /// Read the flags from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the flags through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            development: lookup(DEV_MODE_VAR)
                .is_some_and(|v| v.eq_ignore_ascii_case("development")),
            refresh_endpoint: lookup(REFRESH_ENDPOINT_VAR).is_some_and(|v| is_enabled(&v)),
        }
    }
}

fn is_enabled(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

// ============================================================================
// Loading
// ============================================================================

/// Load a pipeline definition from a YAML file
pub fn load_pipeline(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read pipeline file '{}': {}",
            path.display(),
            e
        ))
    })?;
    load_pipeline_from_str(&content)
}

/// Load a pipeline definition from a YAML string
pub fn load_pipeline_from_str(yaml: &str) -> Result<PipelineConfig> {
    let config: PipelineConfig = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse pipeline YAML: {e}")))?;

    validate_pipeline(&config)?;
    Ok(config)
}

/// Validate every resolved source.
///
/// URLs holding `{{ }}` placeholders are only checked for presence here;
/// [`SourceConfig::prepare`] validates them once rendered.
fn validate_pipeline(config: &PipelineConfig) -> Result<()> {
    for source in config.sources() {
        if source.entity_type_name.is_empty() {
            return Err(Error::missing_field("entity_type_name"));
        }
        if !has_templates(&source.url) {
            source.validate()?;
        }
    }

    if let Some(ref auth) = config.auth {
        if auth.url.is_empty() {
            return Err(Error::missing_field("auth.url"));
        }
    }

    Ok(())
}
