//! Page loop
//!
//! Issues the initial request, then keeps asking the next-request strategy
//! what to fetch until it reports completion, folding every page into one
//! document.

use super::types::{unwrap_payload, MergeStrategy, NextPage, NextRequest, Page};
use crate::error::Result;
use crate::extract::resolve_path;
use crate::http::{HttpClient, RequestSpec};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// Everything that shapes one pagination run
#[derive(Clone, Default)]
pub struct PaginationPlan {
    /// Strategy computing the next request; `None` means a single request
    pub next: Option<Arc<dyn NextRequest>>,
    /// How pages are accumulated
    pub merge: MergeStrategy,
    /// Stop after this many pages
    pub max_pages: Option<u32>,
    /// Unwrap each response body at this key before accumulating
    pub payload_key: Option<String>,
    /// Where records sit inside a page, for record counting
    pub records_path: Option<String>,
    /// Names the strategy in cache keys; closures have no identity of their own
    pub strategy_id: Option<String>,
    /// Query parameters every page carries, even when the strategy follows
    /// a link that dropped them
    pub query_params: BTreeMap<String, String>,
}

impl PaginationPlan {
    /// A plan that issues exactly one request
    pub fn single() -> Self {
        Self::default()
    }

    /// A plan driven by `next`
    pub fn with_next(next: Arc<dyn NextRequest>) -> Self {
        Self {
            next: Some(next),
            ..Default::default()
        }
    }

    /// Set the merge rule
    #[must_use]
    pub fn merge(mut self, merge: MergeStrategy) -> Self {
        self.merge = merge;
        self
    }

    /// Set the page limit
    #[must_use]
    pub fn max_pages(mut self, max_pages: Option<u32>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set the payload key
    #[must_use]
    pub fn payload_key(mut self, key: Option<String>) -> Self {
        self.payload_key = key;
        self
    }

    /// Set the records path
    #[must_use]
    pub fn records_path(mut self, path: Option<String>) -> Self {
        self.records_path = path;
        self
    }

    /// Name the strategy for cache keys
    #[must_use]
    pub fn strategy_id(mut self, id: impl Into<String>) -> Self {
        self.strategy_id = Some(id.into());
        self
    }

    /// Carry `params` on every page request
    #[must_use]
    pub fn query_params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query_params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Everything besides the first request that changes the resulting
    /// document
    pub fn fingerprint(&self) -> Value {
        let strategy = match (&self.next, &self.strategy_id) {
            (None, _) => Value::Null,
            (Some(_), Some(id)) => json!(id),
            (Some(_), None) => json!("custom"),
        };
        json!({
            "strategy": strategy,
            "merge": self.merge,
            "max_pages": self.max_pages,
            "payload_key": self.payload_key,
            "records_path": self.records_path,
            "query_params": self.query_params,
        })
    }

    /// Re-add carried params the link URL and the request both lack
    fn carry_params(&self, mut request: RequestSpec) -> RequestSpec {
        if self.query_params.is_empty() {
            return request;
        }
        let in_url: HashSet<String> = Url::parse(&request.url)
            .map(|url| url.query_pairs().map(|(k, _)| k.into_owned()).collect())
            .unwrap_or_default();
        for (key, value) in &self.query_params {
            if !in_url.contains(key) {
                request
                    .query
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }
        request
    }
}

impl std::fmt::Debug for PaginationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaginationPlan")
            .field("paginated", &self.next.is_some())
            .field("merge", &self.merge)
            .field("max_pages", &self.max_pages)
            .field("payload_key", &self.payload_key)
            .field("records_path", &self.records_path)
            .field("strategy_id", &self.strategy_id)
            .field("query_params", &self.query_params)
            .finish()
    }
}

/// Drives a pagination run over an HTTP client
#[derive(Debug, Clone, Copy)]
pub struct Paginator<'a> {
    client: &'a HttpClient,
}

impl<'a> Paginator<'a> {
    /// Create a paginator sending through `client`
    pub fn new(client: &'a HttpClient) -> Self {
        Self { client }
    }

    /// Fetch every page and return the accumulated document.
    ///
    /// Any failed request fails the whole run; no partial document is
    /// returned.
    pub async fn paginate(&self, request: RequestSpec, plan: &PaginationPlan) -> Result<Value> {
        let mut request = match plan.next {
            Some(ref next) => next.initial_request(request),
            None => request,
        };

        let mut document = Value::Null;
        let mut fetched: u64 = 0;
        let mut index: u32 = 0;

        loop {
            debug!("Fetching page {} from {}", index + 1, request.url);
            let response = self.client.send(&request).await?;

            let payload = unwrap_payload(response.body.clone(), plan.payload_key.as_deref());
            let records = count_records(&payload, plan.records_path.as_deref());
            fetched += records as u64;

            document = if index == 0 {
                payload
            } else {
                plan.merge.merge(std::mem::take(&mut document), payload)
            };

            let Some(ref next) = plan.next else {
                break;
            };

            let page = Page {
                request,
                status: response.status,
                headers: response.headers,
                body: response.body,
                index,
                records,
                fetched,
            };

            match next.next_request(&page, &document) {
                NextPage::Done => {
                    debug!("Pagination complete after {} page(s)", index + 1);
                    break;
                }
                NextPage::Continue(next_request) => {
                    index += 1;
                    if plan.max_pages.is_some_and(|max| index >= max) {
                        warn!(
                            "Stopping pagination at the configured limit of {} page(s)",
                            index
                        );
                        break;
                    }
                    request = plan.carry_params(next_request);
                }
            }
        }

        Ok(document)
    }
}

/// Count the records a page contributes
fn count_records(payload: &Value, records_path: Option<&str>) -> usize {
    let target = match records_path {
        Some(path) => match resolve_path(payload, path) {
            Ok(value) => value,
            Err(_) => return 0,
        },
        None => payload,
    };

    match target {
        Value::Array(items) => items.len(),
        Value::Null => 0,
        _ => 1,
    }
}
