//! Pagination types and traits
//!
//! Defines the core pagination abstractions used by all strategies.

use crate::auth::extract_jsonpath;
use crate::http::RequestSpec;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq)]
pub enum NextPage {
    /// Issue this request next
    Continue(RequestSpec),
    /// No more pages
    Done,
}

impl NextPage {
    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Check if this is a continue result
    pub fn is_continue(&self) -> bool {
        matches!(self, Self::Continue(_))
    }
}

/// One fetched page, as seen by a next-request strategy
#[derive(Debug, Clone)]
pub struct Page {
    /// The request that produced this page
    pub request: RequestSpec,
    /// Response status
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw response body, before any payload unwrapping
    pub body: Value,
    /// Zero-based position of this page
    pub index: u32,
    /// Records found on this page
    pub records: usize,
    /// Records found on all pages so far, this one included
    pub fetched: u64,
}

/// Computes the request following a page.
///
/// Implementations must eventually return `NextPage::Done`; the paginator
/// only stops early when a page limit is configured.
pub trait NextRequest: Send + Sync {
    /// Adjust the first request (e.g. add initial offset parameters)
    fn initial_request(&self, request: RequestSpec) -> RequestSpec {
        request
    }

    /// Decide what to fetch after `page`
    fn next_request(&self, page: &Page, accumulated: &Value) -> NextPage;
}

impl<F> NextRequest for F
where
    F: Fn(&Page, &Value) -> NextPage + Send + Sync,
{
    fn next_request(&self, page: &Page, accumulated: &Value) -> NextPage {
        self(page, accumulated)
    }
}

/// How each page is folded into the accumulated document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Concatenate arrays; a non-array page counts as a one-element array
    #[default]
    Append,
    /// Merge objects recursively, concatenating arrays found at the same key
    DeepMerge,
    /// Keep only the latest page
    Replace,
}

impl MergeStrategy {
    /// Fold `page` into `accumulated`
    pub fn merge(self, accumulated: Value, page: Value) -> Value {
        match self {
            Self::Append => {
                let mut items = into_items(accumulated);
                items.extend(into_items(page));
                Value::Array(items)
            }
            Self::DeepMerge => deep_merge(accumulated, page),
            Self::Replace => page,
        }
    }
}

fn into_items(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (Value::Array(mut base), Value::Array(overlay)) => {
            base.extend(overlay);
            Value::Array(base)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Pagination section of a source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Which strategy computes the next request
    #[serde(flatten)]
    pub strategy: StrategyConfig,

    /// How pages are accumulated
    #[serde(default)]
    pub merge: MergeStrategy,

    /// Safety net against runaway pagination
    #[serde(default)]
    pub max_pages: Option<u32>,
}

impl PaginationConfig {
    /// Wrap a strategy with default merge and no page limit
    pub fn new(strategy: StrategyConfig) -> Self {
        Self {
            strategy,
            merge: MergeStrategy::default(),
            max_pages: None,
        }
    }

    /// Instantiate the configured strategy
    pub fn build(&self) -> Arc<dyn NextRequest> {
        self.strategy.build()
    }
}

/// Built-in next-request strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Cursor-based pagination (e.g., Stripe)
    Cursor {
        /// Query parameter name for cursor (e.g., "starting_after")
        cursor_param: String,
        /// JSONPath to extract cursor from response
        cursor_path: String,
        /// Stop condition
        #[serde(default)]
        stop_condition: StopCondition,
    },

    /// Offset-based pagination
    Offset {
        /// Query parameter name for offset
        #[serde(default = "default_offset_param")]
        offset_param: String,
        /// Query parameter name for limit
        #[serde(default = "default_limit_param")]
        limit_param: String,
        /// Number of records per page
        limit: u32,
        /// Stop condition
        #[serde(default)]
        stop_condition: StopCondition,
    },

    /// Page number pagination
    PageNumber {
        /// Query parameter name for page number
        #[serde(default = "default_page_param")]
        page_param: String,
        /// First page number (usually 0 or 1)
        #[serde(default = "default_start_page")]
        start_page: u32,
        /// Optional page size parameter name
        #[serde(default)]
        page_size_param: Option<String>,
        /// Page size value
        #[serde(default)]
        page_size: Option<u32>,
        /// Stop condition
        #[serde(default)]
        stop_condition: StopCondition,
    },

    /// Link header pagination (RFC 5988)
    LinkHeader {
        /// Rel value to follow
        #[serde(default = "default_rel")]
        rel: String,
    },

    /// Next URL in response body
    NextUrl {
        /// JSONPath to extract next URL from response
        path: String,
    },
}

fn default_offset_param() -> String {
    "offset".to_string()
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_start_page() -> u32 {
    1
}

fn default_rel() -> String {
    "next".to_string()
}

/// Stop conditions for pagination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopCondition {
    /// Stop when page is empty (no records)
    #[default]
    EmptyPage,

    /// Stop when a field has a specific value
    Field {
        /// JSONPath to the field
        path: String,
        /// Expected value to stop
        value: Value,
    },

    /// Stop when the records fetched reach a total count
    TotalCount {
        /// JSONPath to total count field
        path: String,
    },

    /// Stop when page number reaches total pages
    TotalPages {
        /// JSONPath to total pages field
        path: String,
    },
}

impl StopCondition {
    /// Create a field-based stop condition
    pub fn field(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Create a total count stop condition
    pub fn total_count(path: impl Into<String>) -> Self {
        Self::TotalCount { path: path.into() }
    }

    /// Create a total pages stop condition
    pub fn total_pages(path: impl Into<String>) -> Self {
        Self::TotalPages { path: path.into() }
    }

    /// Check the condition against a page.
    ///
    /// `page_number` is the strategy's own notion of the current page.
    pub fn should_stop(&self, page: &Page, page_number: u32) -> bool {
        match self {
            Self::EmptyPage => page.records == 0,
            Self::Field { path, value } => {
                extract_jsonpath_value(&page.body, path).is_some_and(|found| found == value)
            }
            Self::TotalCount { path } => extract_jsonpath(&page.body, path)
                .and_then(|s| s.parse::<u64>().ok())
                .is_some_and(|total| page.fetched >= total),
            Self::TotalPages { path } => extract_jsonpath(&page.body, path)
                .and_then(|s| s.parse::<u32>().ok())
                .is_some_and(|total| page_number >= total),
        }
    }
}

/// Extract a JSON value from a path (returns Value instead of String)
fn extract_jsonpath_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);

    let mut current = value;
    for part in path.split('.') {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            _ => return None,
        }
    }

    Some(current)
}

/// Unwrap a response body at `payload_key`; a missing key leaves it unchanged
pub fn unwrap_payload(body: Value, payload_key: Option<&str>) -> Value {
    let Some(key) = payload_key else {
        return body;
    };

    match body {
        Value::Object(mut map) if map.contains_key(key) => map.remove(key).unwrap_or(Value::Null),
        other => {
            debug!("Payload key '{}' not found, keeping full body", key);
            other
        }
    }
}
