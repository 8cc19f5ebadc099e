//! Token acquisition
//!
//! Issues the configured token request, pulls the token out of the response
//! and turns it into a header for every subsequent source request.

use super::types::{AuthConfig, AuthToken};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

/// Runs the authentication pre-step
#[derive(Debug, Clone)]
pub struct Authenticator {
    config: AuthConfig,
}

impl Authenticator {
    /// Create a new authenticator
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Get the auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Request a token.
    ///
    /// Every failure (transport, status, missing token) is reported as
    /// `Error::Auth` so the caller can decide to continue unauthenticated.
    pub async fn authenticate(&self, client: &HttpClient) -> Result<AuthToken> {
        let started = Instant::now();
        let result = self.fetch_token(client).await;
        info!("Authenticate user: {}ms", started.elapsed().as_millis());
        result
    }

    async fn fetch_token(&self, client: &HttpClient) -> Result<AuthToken> {
        let request = self.config.request();
        debug!("Requesting token from {}", request.url);

        let response = client
            .send(&request)
            .await
            .map_err(|e| Error::auth(format!("Token request failed: {e}")))?;

        let token = extract_jsonpath(&response.body, &self.config.token_path).ok_or_else(|| {
            Error::auth(format!(
                "Could not extract token from path: {}",
                self.config.token_path
            ))
        })?;

        Ok(AuthToken {
            header: self.config.header_name.clone(),
            value: format!("{}{}", self.config.token_prefix, token),
        })
    }
}

/// Extract a value from JSON using a simple JSONPath expression
/// Supports basic paths like "$.data.token" or "data.token"
pub fn extract_jsonpath(value: &Value, path: &str) -> Option<String> {
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

    match current {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
