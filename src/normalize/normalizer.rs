//! Document to node conversion
//!
//! Walks a fetched document, extracts the entity collection, sanitizes every
//! key, assigns ids and hands one node per entity (plus the dummy node) to the
//! host, followed by its derived fields.

use super::host::{FieldSink, IdGenerator, NodeSink};
use super::types::{
    Node, NodeInternal, NormalizeConfig, NormalizeWarning, Normalized, DUMMY_ID, MEDIA_TYPE,
};
use crate::error::Result;
use crate::extract::extract_entities;
use crate::sanitize::{standardize_key, KeySanitizer};
use crate::template::TemplateContext;
use crate::types::{JsonObject, JsonValue};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, warn};

/// Turns documents into nodes through the host services
#[derive(Clone)]
pub struct Normalizer {
    ids: Arc<dyn IdGenerator>,
    nodes: Arc<dyn NodeSink>,
    fields: Arc<dyn FieldSink>,
    refresh_endpoint: bool,
}

impl Normalizer {
    /// Create a normalizer emitting through the given services
    pub fn new(
        ids: Arc<dyn IdGenerator>,
        nodes: Arc<dyn NodeSink>,
        fields: Arc<dyn FieldSink>,
    ) -> Self {
        Self {
            ids,
            nodes,
            fields,
            refresh_endpoint: false,
        }
    }

    /// Set the refresh endpoint flag that makes refresh ids take effect
    #[must_use]
    pub fn with_refresh_endpoint(mut self, enabled: bool) -> Self {
        self.refresh_endpoint = enabled;
        self
    }

    /// Normalize `document` into nodes.
    ///
    /// Produces exactly one node per extracted entity followed by the dummy
    /// node. Any extraction, sink or derived field failure fails the whole
    /// document; no entity is dropped silently.
    pub fn normalize(&self, document: &Value, config: &NormalizeConfig) -> Result<Normalized> {
        let sanitizer = if config.verbose {
            KeySanitizer::verbose()
        } else {
            KeySanitizer::new()
        };

        let mut entities: Vec<JsonObject> = extract_entities(document, config.selector_path.as_deref())?
            .into_iter()
            .map(|entity| sanitizer.sanitize_object(entity))
            .collect();
        let real_count = entities.len();

        let schema_hint = config
            .schema_hint
            .clone()
            .map(|hint| sanitizer.sanitize_object(hint))
            .unwrap_or_default();
        entities.push(schema_hint);

        let mut outcome = Normalized::default();
        if config.refresh_enabled && !self.refresh_endpoint {
            let warning = NormalizeWarning::RefreshEndpointDisabled {
                type_name: config.type_name.clone(),
            };
            warn!("{warning}");
            outcome.warnings.push(warning);
        }

        let refresh_key = (config.refresh_enabled && self.refresh_endpoint)
            .then(|| standardize_key(&config.refresh_key_field));

        let mut ctx = TemplateContext::new();
        if !config.derived_fields.is_empty() {
            ctx.set_document(document.clone());
        }
        let needs_node_json = config.derived_fields.iter().any(|f| f.uses_template());

        for (index, fields) in entities.into_iter().enumerate() {
            let is_dummy = index == real_count;

            let id = if is_dummy {
                DUMMY_ID.to_string()
            } else {
                refresh_key
                    .as_deref()
                    .and_then(|key| refresh_id(&fields, key))
                    .unwrap_or_else(|| self.ids.generate())
            };

            let node = Node {
                id,
                parent: None,
                children: Vec::new(),
                internal: NodeInternal {
                    node_type: config.type_name.clone(),
                    media_type: MEDIA_TYPE.to_string(),
                    content_digest: content_digest(&fields),
                },
                fields,
            };

            self.nodes.create_node(&node)?;

            if needs_node_json {
                ctx.set_node(node.to_value());
            }
            for field in &config.derived_fields {
                let value = field.compute(&node, &ctx)?;
                self.fields.create_field(&node, &field.name, value)?;
                outcome.fields_created += 1;
            }

            outcome.nodes.push(node);
        }

        debug!(
            "Created {} node(s) of type {}",
            outcome.nodes.len(),
            config.type_name
        );
        Ok(outcome)
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("refresh_endpoint", &self.refresh_endpoint)
            .finish_non_exhaustive()
    }
}

/// Id taken from the refresh field: a non-empty string or a non-zero number
fn refresh_id(fields: &JsonObject, key: &str) -> Option<String> {
    match fields.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64().is_some_and(|f| f != 0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// SHA-256 over the canonical JSON form of the fields (keys sorted at
/// every level), so key order never changes the digest
pub fn content_digest(fields: &JsonObject) -> String {
    let mut canonical = String::new();
    write_canonical_object(fields, &mut canonical);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

fn write_canonical_object(map: &JsonObject, out: &mut String) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_canonical_string(key, out);
        out.push(':');
        write_canonical(&map[key.as_str()], out);
    }
    out.push('}');
}

fn write_canonical(value: &JsonValue, out: &mut String) {
    match value {
        Value::Object(map) => write_canonical_object(map, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::String(s) => write_canonical_string(s, out),
        scalar => {
            let _ = write!(out, "{scalar}");
        }
    }
}

fn write_canonical_string(s: &str, out: &mut String) {
    let _ = write!(out, "{}", Value::String(s.to_string()));
}
