//! Auth configuration types
//!
//! The token request is described declaratively so it can be loaded from the
//! pipeline YAML alongside the sources it authorizes.

use crate::http::RequestSpec;
use crate::types::{JsonValue, Method, StringMap};
use serde::{Deserialize, Serialize};

/// Token request issued once before any source is fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Token endpoint URL
    pub url: String,

    /// HTTP method for the token request
    #[serde(default = "default_method")]
    pub method: Method,

    /// Headers sent with the token request
    #[serde(default)]
    pub headers: StringMap,

    /// JSON body of the token request
    #[serde(default)]
    pub body: Option<JsonValue>,

    /// Path to the token inside the response body
    #[serde(default = "default_token_path")]
    pub token_path: String,

    /// Prefix for the header value
    #[serde(default = "default_token_prefix")]
    pub token_prefix: String,

    /// Header the token is injected into
    #[serde(default = "default_header_name")]
    pub header_name: String,
}

fn default_method() -> Method {
    Method::POST
}

fn default_token_path() -> String {
    "id_token".to_string()
}

fn default_token_prefix() -> String {
    "Bearer ".to_string()
}

fn default_header_name() -> String {
    "Authorization".to_string()
}

impl AuthConfig {
    /// Create a config for `url` with the default token location
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
            headers: StringMap::new(),
            body: None,
            token_path: default_token_path(),
            token_prefix: default_token_prefix(),
            header_name: default_header_name(),
        }
    }

    /// The token request as a sendable request
    pub fn request(&self) -> RequestSpec {
        let mut spec = RequestSpec::new(&self.url).method(self.method);
        for (key, value) in &self.headers {
            spec = spec.header(key, value);
        }
        if let Some(ref body) = self.body {
            spec = spec.json(body.clone());
        }
        spec
    }
}

/// An acquired credential, ready to be attached to requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    /// Header name
    pub header: String,
    /// Full header value, prefix included
    pub value: String,
}

impl AuthToken {
    /// Attach the credential to a request, replacing any existing value
    #[must_use]
    pub fn apply(&self, spec: RequestSpec) -> RequestSpec {
        spec.header(&self.header, &self.value)
    }
}
