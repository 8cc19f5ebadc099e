//! Request descriptions
//!
//! A `RequestSpec` is a fully rendered, transport-independent description of
//! one HTTP call. Paginators produce them, the client sends them and the
//! fetcher derives its cache key from them.

use crate::types::Method;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Headers that never take part in a request's cache identity
const VOLATILE_HEADERS: [&str; 1] = ["authorization"];

/// One HTTP call
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RequestSpec {
    /// Absolute URL, possibly carrying its own query string
    pub url: String,
    /// HTTP method
    pub method: Method,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Query parameters appended to the URL
    pub query: BTreeMap<String, String>,
    /// JSON request body
    pub body: Option<Value>,
}

impl RequestSpec {
    /// Create a GET request for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set the method
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Same request against a different URL, query parameters cleared
    #[must_use]
    pub fn with_url(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: BTreeMap::new(),
            ..self.clone()
        }
    }

    /// Same request with extra query parameters replacing existing ones
    #[must_use]
    pub fn with_query(&self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut next = self.clone();
        next.query.extend(params);
        next
    }

    /// Stable identity of this request, used as the cache key.
    ///
    /// Covers method, URL, query, body and headers; the `Authorization`
    /// header is left out so a rotated token still hits the same entry.
    pub fn signature(&self) -> String {
        #[derive(Serialize)]
        struct Signature<'a> {
            method: &'a str,
            url: &'a str,
            query: &'a BTreeMap<String, String>,
            headers: BTreeMap<String, &'a str>,
            body: Option<&'a Value>,
        }

        let headers = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.as_str()))
            .filter(|(k, _)| !VOLATILE_HEADERS.contains(&k.as_str()))
            .collect();

        let signature = Signature {
            method: self.method.as_str(),
            url: &self.url,
            query: &self.query,
            headers,
            body: self.body.as_ref(),
        };

        let canonical = serde_json::to_string(&signature).unwrap_or_default();
        hex::encode(Sha256::digest(canonical.as_bytes()))
    }
}
