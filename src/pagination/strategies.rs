//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern. Strategies hold no
//! iteration state: the position is read back from the request that produced
//! the page, so one instance can drive any number of sources.

use super::types::{NextPage, NextRequest, Page, StopCondition, StrategyConfig};
use crate::auth::extract_jsonpath;
use crate::http::RequestSpec;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

impl StrategyConfig {
    /// Instantiate the strategy
    pub fn build(&self) -> Arc<dyn NextRequest> {
        match self.clone() {
            Self::Cursor {
                cursor_param,
                cursor_path,
                stop_condition,
            } => Arc::new(CursorPaginator::new(cursor_param, cursor_path, stop_condition)),
            Self::Offset {
                offset_param,
                limit_param,
                limit,
                stop_condition,
            } => Arc::new(OffsetPaginator::new(
                offset_param,
                limit_param,
                limit,
                stop_condition,
            )),
            Self::PageNumber {
                page_param,
                start_page,
                page_size_param,
                page_size,
                stop_condition,
            } => {
                let mut paginator =
                    PageNumberPaginator::new(page_param, start_page).with_stop_condition(stop_condition);
                if let (Some(param), Some(size)) = (page_size_param, page_size) {
                    paginator = paginator.with_page_size(param, size);
                }
                Arc::new(paginator)
            }
            Self::LinkHeader { rel } => Arc::new(LinkHeaderPaginator::new(rel)),
            Self::NextUrl { path } => Arc::new(NextUrlPaginator::new(path)),
        }
    }
}

fn query_number(request: &RequestSpec, param: &str) -> Option<u32> {
    request.query.get(param).and_then(|v| v.parse().ok())
}

/// Resolve a possibly relative next-page link against the current URL
fn resolve_link(current: &str, link: &str) -> String {
    Url::parse(current)
        .and_then(|base| base.join(link))
        .map_or_else(|_| link.to_string(), String::from)
}

// ============================================================================
// Cursor Pagination
// ============================================================================

/// Follows an opaque token read from each page body, sending it back as
/// `?{cursor_param}=<token>`. Ends when the token is missing or null.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Query parameter carrying the token
    pub cursor_param: String,
    /// Where the token sits in the page body
    pub cursor_path: String,
    pub stop_condition: StopCondition,
}

impl CursorPaginator {
    pub fn new(
        cursor_param: impl Into<String>,
        cursor_path: impl Into<String>,
        stop_condition: StopCondition,
    ) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
            stop_condition,
        }
    }
}

impl NextRequest for CursorPaginator {
    fn next_request(&self, page: &Page, _accumulated: &Value) -> NextPage {
        if self.stop_condition.should_stop(page, page.index + 1) {
            return NextPage::Done;
        }

        match extract_jsonpath(&page.body, &self.cursor_path) {
            Some(cursor) => NextPage::Continue(
                page.request
                    .with_query([(self.cursor_param.clone(), cursor)]),
            ),
            None => NextPage::Done,
        }
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// `?offset=N&limit=M` windows. The offset advances by `limit_value`
/// until a page comes back with fewer records than that.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    pub offset_param: String,
    pub limit_param: String,
    /// Records requested per page
    pub limit_value: u32,
    pub stop_condition: StopCondition,
}

impl OffsetPaginator {
    pub fn new(
        offset_param: impl Into<String>,
        limit_param: impl Into<String>,
        limit_value: u32,
        stop_condition: StopCondition,
    ) -> Self {
        Self {
            offset_param: offset_param.into(),
            limit_param: limit_param.into(),
            limit_value,
            stop_condition,
        }
    }

    fn params(&self, offset: u32) -> [(String, String); 2] {
        [
            (self.offset_param.clone(), offset.to_string()),
            (self.limit_param.clone(), self.limit_value.to_string()),
        ]
    }
}

impl NextRequest for OffsetPaginator {
    fn initial_request(&self, request: RequestSpec) -> RequestSpec {
        let offset = query_number(&request, &self.offset_param).unwrap_or(0);
        request.with_query(self.params(offset))
    }

    fn next_request(&self, page: &Page, _accumulated: &Value) -> NextPage {
        if self.stop_condition.should_stop(page, page.index + 1) {
            return NextPage::Done;
        }

        // A short page is the last one
        if page.records < self.limit_value as usize {
            return NextPage::Done;
        }

        let offset = query_number(&page.request, &self.offset_param).unwrap_or(0);
        NextPage::Continue(
            page.request
                .with_query(self.params(offset.saturating_add(self.limit_value))),
        )
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// `?page=N`, optionally with a fixed page size parameter. The current
/// page number is read back from the request that produced the page.
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    pub page_param: String,
    /// Page number sent with the first request
    pub start_page: u32,
    pub page_size_param: Option<String>,
    /// A page shorter than this ends pagination
    pub page_size: Option<u32>,
    pub stop_condition: StopCondition,
}

impl PageNumberPaginator {
    /// Stops on the first empty page unless told otherwise
    pub fn new(page_param: impl Into<String>, start_page: u32) -> Self {
        Self {
            page_param: page_param.into(),
            start_page,
            page_size_param: None,
            page_size: None,
            stop_condition: StopCondition::EmptyPage,
        }
    }

    /// Send `param=size` with every request
    #[must_use]
    pub fn with_page_size(mut self, param: impl Into<String>, size: u32) -> Self {
        self.page_size_param = Some(param.into());
        self.page_size = Some(size);
        self
    }

    #[must_use]
    pub fn with_stop_condition(mut self, condition: StopCondition) -> Self {
        self.stop_condition = condition;
        self
    }

    fn params(&self, page: u32) -> Vec<(String, String)> {
        let mut params = vec![(self.page_param.clone(), page.to_string())];
        if let (Some(param), Some(size)) = (&self.page_size_param, self.page_size) {
            params.push((param.clone(), size.to_string()));
        }
        params
    }
}

impl NextRequest for PageNumberPaginator {
    fn initial_request(&self, request: RequestSpec) -> RequestSpec {
        let page = query_number(&request, &self.page_param).unwrap_or(self.start_page);
        request.with_query(self.params(page))
    }

    fn next_request(&self, page: &Page, _accumulated: &Value) -> NextPage {
        let current = query_number(&page.request, &self.page_param).unwrap_or(self.start_page);

        if self.stop_condition.should_stop(page, current) {
            return NextPage::Done;
        }

        if self
            .page_size
            .is_some_and(|size| page.records < size as usize)
        {
            return NextPage::Done;
        }

        NextPage::Continue(page.request.with_query(self.params(current.saturating_add(1))))
    }
}

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Follows the RFC 8288 `Link` response header entry whose `rel` matches,
/// e.g. `<https://host/items?page=2>; rel="next"`.
#[derive(Debug, Clone)]
pub struct LinkHeaderPaginator {
    pub rel: String,
}

impl Default for LinkHeaderPaginator {
    fn default() -> Self {
        Self {
            rel: "next".to_string(),
        }
    }
}

impl LinkHeaderPaginator {
    pub fn new(rel: impl Into<String>) -> Self {
        Self { rel: rel.into() }
    }
}

impl NextRequest for LinkHeaderPaginator {
    fn next_request(&self, page: &Page, _accumulated: &Value) -> NextPage {
        page.headers
            .get("link")
            .and_then(|v| v.to_str().ok())
            .and_then(|header| parse_link_header(header, &self.rel))
            .map_or(NextPage::Done, |link| {
                NextPage::Continue(page.request.with_url(resolve_link(&page.request.url, &link)))
            })
    }
}

/// The target of the first `Link` entry listing `target_rel` among its rels
pub fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut params = entry.split(';').map(str::trim);
        let target = params.next()?.strip_prefix('<')?.strip_suffix('>')?;
        let matches = params
            .filter_map(|param| param.strip_prefix("rel="))
            .flat_map(|rels| rels.trim_matches(['"', '\'']).split_whitespace())
            .any(|rel| rel == target_rel);
        matches.then(|| target.to_string())
    })
}

// ============================================================================
// Next URL Pagination
// ============================================================================

/// Follows a next-page link carried in the body, such as
/// `{"links": {"next": "/items?page=2"}}`. Relative links resolve against
/// the current request URL.
#[derive(Debug, Clone)]
pub struct NextUrlPaginator {
    pub path: String,
}

impl NextUrlPaginator {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl NextRequest for NextUrlPaginator {
    fn next_request(&self, page: &Page, _accumulated: &Value) -> NextPage {
        match extract_jsonpath(&page.body, &self.path) {
            Some(link) => {
                NextPage::Continue(page.request.with_url(resolve_link(&page.request.url, &link)))
            }
            None => NextPage::Done,
        }
    }
}
