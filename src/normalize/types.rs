//! Node model and derived fields

use crate::error::{Error, Result};
use crate::template::{render_json_lenient, TemplateContext};
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Media type stamped on every node
pub const MEDIA_TYPE: &str = "application/json";

/// Id of the synthetic shape-declaring node
pub const DUMMY_ID: &str = "dummy";

/// Bookkeeping block of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInternal {
    /// Node type, `typePrefix + entityTypeName`
    #[serde(rename = "type")]
    pub node_type: String,
    /// Always `application/json`
    pub media_type: String,
    /// Hash of the entity fields
    pub content_digest: String,
}

/// Canonical output record, one per entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within a run
    pub id: String,
    /// Always `null`
    pub parent: Option<String>,
    /// Always empty
    pub children: Vec<String>,
    /// Type, media type and digest
    pub internal: NodeInternal,
    /// Sanitized entity fields
    #[serde(flatten)]
    pub fields: JsonObject,
}

impl Node {
    /// Whether this is the synthetic node appended to every batch
    pub fn is_dummy(&self) -> bool {
        self.id == DUMMY_ID
    }

    /// Node type
    pub fn node_type(&self) -> &str {
        &self.internal.node_type
    }

    /// Look up an entity field
    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }

    /// The node as a JSON object, fields flattened next to `id` and `internal`
    pub fn to_value(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// A field value registered for a node through the field sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeField {
    /// Node the field belongs to
    pub node_id: String,
    /// Field name
    pub name: String,
    /// Computed value
    pub value: JsonValue,
}

/// Closure computing a derived field from the node and the fetched document
pub type DeriveFn = dyn Fn(&Node, &JsonValue) -> anyhow::Result<JsonValue> + Send + Sync;

#[derive(Clone)]
enum DerivedValue {
    Computed(Arc<DeriveFn>),
    Template(String),
}

/// A side field computed after a node is created; not part of node identity
#[derive(Clone)]
pub struct DerivedField {
    /// Field name
    pub name: String,
    value: DerivedValue,
}

impl DerivedField {
    /// A field computed by a closure
    pub fn computed<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Node, &JsonValue) -> anyhow::Result<JsonValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            value: DerivedValue::Computed(Arc::new(f)),
        }
    }

    /// A field rendered from a template over `node.*` and `document.*`.
    ///
    /// Paths missing from a node (the dummy node in particular) render as
    /// `null` or an empty string instead of failing.
    pub fn template(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: DerivedValue::Template(template.into()),
        }
    }

    /// Whether evaluating this field needs `node` in the template context
    pub fn uses_template(&self) -> bool {
        matches!(self.value, DerivedValue::Template(_))
    }

    /// Compute the value. `ctx.document` must hold the fetched document, and
    /// `ctx.node` the node itself when [`uses_template`](Self::uses_template).
    pub fn compute(&self, node: &Node, ctx: &TemplateContext) -> Result<JsonValue> {
        match self.value {
            DerivedValue::Computed(ref f) => {
                f(node, &ctx.document).map_err(|e| Error::derived_field(&self.name, e.to_string()))
            }
            DerivedValue::Template(ref template) => Ok(render_json_lenient(template, ctx)),
        }
    }
}

impl std::fmt::Debug for DerivedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("DerivedField");
        s.field("name", &self.name);
        match self.value {
            DerivedValue::Computed(_) => s.field("value", &"<fn>"),
            DerivedValue::Template(ref t) => s.field("value", t),
        };
        s.finish()
    }
}

/// Declarative derived field as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedFieldConfig {
    /// Field name
    pub name: String,
    /// Template over `node.*` and `document.*`
    pub value: String,
}

impl From<DerivedFieldConfig> for DerivedField {
    fn from(config: DerivedFieldConfig) -> Self {
        Self::template(config.name, config.value)
    }
}

/// Per-source normalization settings
#[derive(Debug, Clone, Default)]
pub struct NormalizeConfig {
    /// Full node type, `typePrefix + entityTypeName`
    pub type_name: String,
    /// Where the entity collection sits in the document
    pub selector_path: Option<String>,
    /// Fields of the dummy node
    pub schema_hint: Option<JsonObject>,
    /// Side fields computed per node
    pub derived_fields: Vec<DerivedField>,
    /// Refresh ids requested (development mode and source opt-in)
    pub refresh_enabled: bool,
    /// Field whose value becomes the id in refresh mode
    pub refresh_key_field: String,
    /// Log every key rename
    pub verbose: bool,
}

impl NormalizeConfig {
    /// Settings for `type_name` with everything else defaulted
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            refresh_key_field: "id".to_string(),
            ..Default::default()
        }
    }
}

/// Non-fatal condition noticed while normalizing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeWarning {
    /// Refresh ids were requested but the refresh endpoint flag is off
    RefreshEndpointDisabled {
        /// Node type of the affected source
        type_name: String,
    },
}

impl std::fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RefreshEndpointDisabled { type_name } => write!(
                f,
                "refresh ids for '{type_name}' only work with the refresh endpoint enabled"
            ),
        }
    }
}

/// Result of normalizing one document
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Emitted nodes in emission order, dummy last
    pub nodes: Vec<Node>,
    /// Derived fields registered
    pub fields_created: usize,
    /// Non-fatal conditions, already logged
    pub warnings: Vec<NormalizeWarning>,
}
