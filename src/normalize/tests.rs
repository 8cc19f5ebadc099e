//! Tests for the normalizer

use super::*;
use crate::error::{Error, Result};
use crate::types::JsonObject;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

struct Harness {
    collector: Arc<NodeCollector>,
    normalizer: Normalizer,
}

fn harness(refresh_endpoint: bool) -> Harness {
    let collector = Arc::new(NodeCollector::new());
    let normalizer = Normalizer::new(
        Arc::new(SequentialIdGenerator::new("node")),
        collector.clone(),
        collector.clone(),
    )
    .with_refresh_endpoint(refresh_endpoint);
    Harness {
        collector,
        normalizer,
    }
}

fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn refresh_config(key: &str) -> NormalizeConfig {
    let mut config = NormalizeConfig::new("Post");
    config.refresh_enabled = true;
    config.refresh_key_field = key.to_string();
    config
}

// ============================================================================
// Node Count / Type Tests
// ============================================================================

#[test]
fn test_one_node_per_entity_plus_dummy() {
    let h = harness(false);
    let document = json!([{"title": "a"}, {"title": "b"}, {"title": "c"}]);

    let outcome = h
        .normalizer
        .normalize(&document, &NormalizeConfig::new("blog_Post"))
        .unwrap();

    assert_eq!(outcome.nodes.len(), 4);
    assert!(outcome.nodes.iter().all(|n| n.node_type() == "blog_Post"));
    assert!(outcome.nodes.iter().all(|n| n.internal.media_type == MEDIA_TYPE));
    assert!(outcome.nodes[3].is_dummy());
    assert_eq!(
        outcome.nodes.iter().map(|n| n.id.as_str()).collect::<Vec<_>>(),
        vec!["node-1", "node-2", "node-3", "dummy"]
    );
    assert_eq!(h.collector.nodes(), outcome.nodes);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_selector_path_and_single_object() {
    let h = harness(false);
    let mut config = NormalizeConfig::new("Site");
    config.selector_path = Some("data.site".to_string());

    let outcome = h
        .normalizer
        .normalize(&json!({"data": {"site": {"name": "docs"}}}), &config)
        .unwrap();

    assert_eq!(outcome.nodes.len(), 2);
    assert_eq!(outcome.nodes[0].field("name"), Some(&json!("docs")));
}

#[test]
fn test_extraction_failure_emits_nothing() {
    let h = harness(false);
    let mut config = NormalizeConfig::new("Post");
    config.selector_path = Some("data.missing".to_string());

    let err = h
        .normalizer
        .normalize(&json!({"data": {}}), &config)
        .unwrap_err();
    assert!(matches!(err, Error::PathResolution { .. }));
    assert!(h.collector.nodes().is_empty());

    let err = h
        .normalizer
        .normalize(&json!("just a string"), &NormalizeConfig::new("Post"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidShape { .. }));
}

#[test]
fn test_keys_are_sanitized_deeply() {
    let h = harness(false);
    let document = json!([{
        "user-name": "ada",
        "ID": 7,
        "meta": {"2fast": true, "tags": [{"a.b": 1}]}
    }]);

    let outcome = h
        .normalizer
        .normalize(&document, &NormalizeConfig::new("User"))
        .unwrap();

    let expected = object(json!({
        "user_name": "ada",
        "alternative_id": 7,
        "meta": {"alternative_2fast": true, "tags": [{"a_b": 1}]}
    }));
    assert_eq!(outcome.nodes[0].fields, expected);
}

// ============================================================================
// Dummy Node Tests
// ============================================================================

#[test]
fn test_dummy_node_from_schema_hint() {
    let h = harness(false);
    let mut config = NormalizeConfig::new("Article");
    config.schema_hint = Some(object(json!({"title": ""})));

    let outcome = h.normalizer.normalize(&json!([]), &config).unwrap();

    assert_eq!(outcome.nodes.len(), 1);
    let dummy = &outcome.nodes[0];
    assert_eq!(dummy.id, DUMMY_ID);
    assert_eq!(dummy.node_type(), "Article");
    assert_eq!(dummy.fields, object(json!({"title": ""})));
    assert_eq!(dummy.parent, None);
    assert!(dummy.children.is_empty());
}

#[test]
fn test_schema_hint_keys_are_sanitized() {
    let h = harness(false);
    let mut config = NormalizeConfig::new("Article");
    config.schema_hint = Some(object(json!({"id": "", "sub-title": ""})));

    let outcome = h.normalizer.normalize(&json!([]), &config).unwrap();

    assert_eq!(
        outcome.nodes[0].fields,
        object(json!({"alternative_id": "", "sub_title": ""}))
    );
}

#[test]
fn test_dummy_is_excluded_from_refresh_ids() {
    let h = harness(true);
    let mut config = refresh_config("slug");
    config.schema_hint = Some(object(json!({"slug": "from-hint"})));

    let outcome = h.normalizer.normalize(&json!([]), &config).unwrap();
    assert_eq!(outcome.nodes[0].id, DUMMY_ID);
}

// ============================================================================
// Refresh Id Tests
// ============================================================================

#[test]
fn test_refresh_id_from_key_field() {
    let h = harness(true);
    let outcome = h
        .normalizer
        .normalize(&json!([{"slug": "abc", "title": "x"}]), &refresh_config("slug"))
        .unwrap();

    assert_eq!(outcome.nodes[0].id, "abc");
    assert!(outcome.warnings.is_empty());
}

#[test]
fn test_refresh_without_endpoint_warns_and_generates() {
    let h = harness(false);
    let outcome = h
        .normalizer
        .normalize(&json!([{"slug": "abc", "title": "x"}]), &refresh_config("slug"))
        .unwrap();

    assert_eq!(outcome.nodes[0].id, "node-1");
    assert_eq!(
        outcome.warnings,
        vec![NormalizeWarning::RefreshEndpointDisabled {
            type_name: "Post".to_string()
        }]
    );
}

#[test]
fn test_refresh_key_reserved_name_is_sanitized() {
    let h = harness(true);
    let outcome = h
        .normalizer
        .normalize(&json!([{"id": 42}, {"id": 0}, {"id": ""}]), &refresh_config("id"))
        .unwrap();

    assert_eq!(outcome.nodes[0].id, "42");
    assert_eq!(outcome.nodes[1].id, "node-1");
    assert_eq!(outcome.nodes[2].id, "node-2");
}

#[test]
fn test_refresh_not_requested_ignores_endpoint() {
    let h = harness(true);
    let mut config = NormalizeConfig::new("Post");
    config.refresh_key_field = "slug".to_string();

    let outcome = h
        .normalizer
        .normalize(&json!([{"slug": "abc"}]), &config)
        .unwrap();
    assert_eq!(outcome.nodes[0].id, "node-1");
}

// ============================================================================
// Digest Tests
// ============================================================================

#[test]
fn test_digest_ignores_key_order() {
    let a = object(json!({"a": 1, "b": {"x": [1, 2], "y": "z"}}));
    let mut b = JsonObject::new();
    b.insert("b".to_string(), json!({"y": "z", "x": [1, 2]}));
    b.insert("a".to_string(), json!(1));

    assert_eq!(content_digest(&a), content_digest(&b));
    assert_eq!(content_digest(&a).len(), 64);

    let c = object(json!({"a": 1, "b": {"x": [2, 1], "y": "z"}}));
    assert_ne!(content_digest(&a), content_digest(&c));
}

#[test]
fn test_identical_entities_share_digest_not_id() {
    let h = harness(false);
    let outcome = h
        .normalizer
        .normalize(
            &json!([{"t": 1, "u": 2}, {"u": 2, "t": 1}, {"t": 2}]),
            &NormalizeConfig::new("T"),
        )
        .unwrap();

    let nodes = &outcome.nodes;
    assert_eq!(nodes[0].internal.content_digest, nodes[1].internal.content_digest);
    assert_ne!(nodes[0].internal.content_digest, nodes[2].internal.content_digest);
    assert_ne!(nodes[0].id, nodes[1].id);
}

// ============================================================================
// Derived Field Tests
// ============================================================================

#[test]
fn test_computed_and_template_fields() {
    let h = harness(false);
    let mut config = NormalizeConfig::new("Post");
    config.selector_path = Some("posts".to_string());
    config.derived_fields = vec![
        DerivedField::computed("slug_upper", |node: &Node, _doc: &Value| {
            let slug = node.field("slug").and_then(Value::as_str).unwrap_or_default();
            Ok(json!(slug.to_uppercase()))
        }),
        DerivedField::computed("site", |_node: &Node, doc: &Value| Ok(doc["site"].clone())),
        DerivedFieldConfig {
            name: "path".to_string(),
            value: "/{{ document.site }}/{{ node.slug }}".to_string(),
        }
        .into(),
        DerivedField::template("raw_tags", "{{ node.tags }}"),
    ];

    let document = json!({"site": "blog", "posts": [{"slug": "hello", "tags": ["a"]}]});
    let outcome = h.normalizer.normalize(&document, &config).unwrap();

    // Two nodes (post + dummy), four fields each
    assert_eq!(outcome.fields_created, 8);

    let dummy_fields: Vec<_> = h
        .collector
        .fields()
        .into_iter()
        .filter(|f| f.node_id == DUMMY_ID)
        .map(|f| f.value)
        .collect();
    assert_eq!(dummy_fields, vec![json!(""), json!("blog"), json!("/blog/"), Value::Null]);

    let fields: Vec<_> = h
        .collector
        .fields()
        .into_iter()
        .filter(|f| f.node_id == "node-1")
        .map(|f| (f.name, f.value))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("slug_upper".to_string(), json!("HELLO")),
            ("site".to_string(), json!("blog")),
            ("path".to_string(), json!("/blog/hello")),
            ("raw_tags".to_string(), json!(["a"])),
        ]
    );
}

#[test]
fn test_failing_derived_field_fails_document() {
    let h = harness(false);
    let mut config = NormalizeConfig::new("Post");
    config.derived_fields = vec![DerivedField::computed("boom", |_: &Node, _: &Value| {
        Err(anyhow::anyhow!("no value"))
    })];

    let err = h.normalizer.normalize(&json!([{"a": 1}]), &config).unwrap_err();
    match err {
        Error::DerivedField { name, message } => {
            assert_eq!(name, "boom");
            assert!(message.contains("no value"));
        }
        other => panic!("expected DerivedField, got {other:?}"),
    }
}

struct RejectingSink;

impl NodeSink for RejectingSink {
    fn create_node(&self, node: &Node) -> Result<()> {
        Err(Error::NodeSink {
            id: node.id.clone(),
            message: "store is read-only".to_string(),
        })
    }
}

#[test]
fn test_sink_failure_propagates() {
    let normalizer = Normalizer::new(
        Arc::new(UuidIdGenerator),
        Arc::new(RejectingSink),
        Arc::new(NodeCollector::new()),
    );

    let err = normalizer
        .normalize(&json!([{"a": 1}]), &NormalizeConfig::new("Post"))
        .unwrap_err();
    assert!(matches!(err, Error::NodeSink { .. }));
}

// ============================================================================
// Node Model Tests
// ============================================================================

#[test]
fn test_node_serialization_shape() {
    let h = harness(false);
    let outcome = h
        .normalizer
        .normalize(&json!([{"title": "x"}]), &NormalizeConfig::new("Post"))
        .unwrap();

    let value = outcome.nodes[0].to_value();
    assert_eq!(value["id"], json!("node-1"));
    assert_eq!(value["parent"], Value::Null);
    assert_eq!(value["children"], json!([]));
    assert_eq!(value["title"], json!("x"));
    assert_eq!(value["internal"]["type"], json!("Post"));
    assert_eq!(value["internal"]["mediaType"], json!("application/json"));
    assert_eq!(
        value["internal"]["contentDigest"],
        json!(outcome.nodes[0].internal.content_digest)
    );

    let back: Node = serde_json::from_value(value).unwrap();
    assert_eq!(back, outcome.nodes[0]);
}

#[test]
fn test_uuid_generator_produces_unique_ids() {
    let ids = UuidIdGenerator;
    let a = ids.generate();
    let b = ids.generate();
    assert_ne!(a, b);
    assert!(uuid::Uuid::parse_str(&a).is_ok());
}

#[test]
fn test_collector_take_drains() {
    let h = harness(false);
    h.normalizer
        .normalize(&json!([{"a": 1}]), &NormalizeConfig::new("A"))
        .unwrap();

    let (nodes, fields) = h.collector.take();
    assert_eq!(nodes.len(), 2);
    assert!(fields.is_empty());
    assert!(h.collector.nodes().is_empty());
}
