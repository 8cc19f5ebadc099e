//! Template interpolation
//!
//! Handles `{{ variable }}` interpolation in pipeline configurations and
//! declarative derived fields. Supports nested access like `{{ env.API_KEY }}`,
//! `{{ node.author.name }}` and array indices such as `{{ document.items.0 }}`.

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z0-9_]+)*)\s*\}\}").unwrap()
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Process environment variables
    pub env: Value,
    /// The node a derived field is computed for
    pub node: Value,
    /// The whole fetched document
    pub document: Value,
    /// Additional context variables
    pub vars: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context holding the current process environment
    pub fn from_env() -> Self {
        let env: Map<String, Value> = std::env::vars()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        Self {
            env: Value::Object(env),
            ..Default::default()
        }
    }

    /// Set environment values
    pub fn set_env(&mut self, env: Value) -> &mut Self {
        self.env = env;
        self
    }

    /// Set node values
    pub fn set_node(&mut self, node: Value) -> &mut Self {
        self.node = node;
        self
    }

    /// Set document values
    pub fn set_document(&mut self, document: Value) -> &mut Self {
        self.document = document;
        self
    }

    /// Set additional variables
    pub fn set_vars(&mut self, vars: Value) -> &mut Self {
        self.vars = vars;
        self
    }

    /// Get a value by path (e.g., "env.API_KEY")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();

        // First part determines the root object
        let root = match parts[0] {
            "env" => &self.env,
            "node" => &self.node,
            "document" => &self.document,
            "vars" => &self.vars,
            // Bare names resolve against vars
            _ => return get_nested_value(&self.vars, &parts),
        };

        get_nested_value(root, &parts[1..])
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        current = match current {
            Value::Object(map) => map.get(*part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut result = template.to_string();
    let mut errors = Vec::new();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let var_path = &cap[1];

        match ctx.get(var_path) {
            Some(value) => {
                result = result.replace(&cap[0], &value_to_string(value));
            }
            None => {
                errors.push(var_path.to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(Error::undefined_var(errors.join(", ")))
    }
}

/// Render a template to a JSON value.
///
/// A template made of exactly one placeholder yields the referenced value
/// itself (numbers, objects and arrays keep their type); anything else is
/// rendered to a string.
pub fn render_json(template: &str, ctx: &TemplateContext) -> Result<Value> {
    if let Some(cap) = TEMPLATE_REGEX.captures(template.trim()) {
        if cap[0].len() == template.trim().len() {
            return ctx
                .get(&cap[1])
                .cloned()
                .ok_or_else(|| Error::undefined_var(&cap[1]));
        }
    }
    render(template, ctx).map(Value::String)
}

/// Like [`render_json`], but undefined variables never fail: a lone
/// placeholder yields `Null` and embedded ones render as empty strings
pub fn render_json_lenient(template: &str, ctx: &TemplateContext) -> Value {
    if let Some(cap) = TEMPLATE_REGEX.captures(template.trim()) {
        if cap[0].len() == template.trim().len() {
            return ctx.get(&cap[1]).cloned().unwrap_or(Value::Null);
        }
    }

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        ctx.get(&cap[1]).map(value_to_string).unwrap_or_default()
    });
    Value::String(rendered.into_owned())
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        // For complex types, use JSON serialization
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

/// Render all string values in a JSON object/value
pub fn render_value(value: &Value, ctx: &TemplateContext) -> Result<Value> {
    match value {
        Value::String(s) if has_templates(s) => Ok(Value::String(render(s, ctx)?)),
        Value::Object(map) => {
            let mut new_map = Map::new();
            for (k, v) in map {
                new_map.insert(k.clone(), render_value(v, ctx)?);
            }
            Ok(Value::Object(new_map))
        }
        Value::Array(arr) => {
            let new_arr: Result<Vec<Value>> = arr.iter().map(|v| render_value(v, ctx)).collect();
            Ok(Value::Array(new_arr?))
        }
        _ => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env_ctx(env: Value) -> TemplateContext {
        let mut ctx = TemplateContext::new();
        ctx.set_env(env);
        ctx
    }

    #[test]
    fn test_simple_substitution() {
        let ctx = env_ctx(json!({"API_TOKEN": "sk_test_123"}));

        let result = render("Bearer {{ env.API_TOKEN }}", &ctx).unwrap();
        assert_eq!(result, "Bearer sk_test_123");
    }

    #[test]
    fn test_multiple_substitutions() {
        let ctx = env_ctx(json!({"HOST": "api.example.com", "VERSION": "v1"}));

        let result = render("https://{{ env.HOST }}/{{ env.VERSION }}/users", &ctx).unwrap();
        assert_eq!(result, "https://api.example.com/v1/users");
    }

    #[test]
    fn test_node_and_document_roots() {
        let mut ctx = TemplateContext::new();
        ctx.set_node(json!({"author": {"name": "Ada"}, "tags": ["a", "b"]}));
        ctx.set_document(json!({"meta": {"site": "blog"}}));

        let result = render(
            "{{ node.author.name }}@{{ document.meta.site }}/{{ node.tags.1 }}",
            &ctx,
        )
        .unwrap();
        assert_eq!(result, "Ada@blog/b");
    }

    #[test]
    fn test_from_env_reads_process_environment() {
        let ctx = TemplateContext::from_env();
        let path = std::env::var("PATH").unwrap_or_default();
        if !path.is_empty() {
            assert_eq!(render("{{ env.PATH }}", &ctx).unwrap(), path);
        }
    }

    #[test]
    fn test_undefined_variable() {
        let ctx = TemplateContext::new();
        let result = render("{{ env.MISSING }}", &ctx);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("env.MISSING"));
    }

    #[test]
    fn test_no_templates() {
        let ctx = TemplateContext::new();
        let result = render("plain string without templates", &ctx).unwrap();
        assert_eq!(result, "plain string without templates");
    }

    #[test]
    fn test_has_templates() {
        assert!(has_templates("{{ env.KEY }}"));
        assert!(has_templates("prefix {{ var }} suffix"));
        assert!(!has_templates("no templates here"));
        assert!(!has_templates("{ not a template }"));
    }

    #[test]
    fn test_render_json_single_placeholder_keeps_type() {
        let mut ctx = TemplateContext::new();
        ctx.set_node(json!({"count": 3, "tags": ["x"], "title": "Hi"}));

        assert_eq!(render_json("{{ node.count }}", &ctx).unwrap(), json!(3));
        assert_eq!(render_json(" {{ node.tags }} ", &ctx).unwrap(), json!(["x"]));
        assert_eq!(
            render_json("{{ node.title }}!", &ctx).unwrap(),
            json!("Hi!")
        );
        assert_eq!(
            render_json("{{ node.title }}/{{ node.count }}", &ctx).unwrap(),
            json!("Hi/3")
        );
        assert!(render_json("{{ node.missing }}", &ctx).is_err());
    }

    #[test]
    fn test_render_json_lenient() {
        let mut ctx = TemplateContext::new();
        ctx.set_node(json!({"slug": "hello", "n": 2}));

        assert_eq!(render_json_lenient("{{ node.n }}", &ctx), json!(2));
        assert_eq!(render_json_lenient("{{ node.missing }}", &ctx), Value::Null);
        assert_eq!(
            render_json_lenient("/{{ node.slug }}/{{ node.missing }}", &ctx),
            json!("/hello/")
        );
    }

    #[test]
    fn test_render_value_object() {
        let ctx = env_ctx(json!({"KEY": "value123"}));

        let input = json!({
            "header": "X-API-Key",
            "value": "{{ env.KEY }}",
            "nested": [{"v": "{{ env.KEY }}"}, 5]
        });

        let result = render_value(&input, &ctx).unwrap();
        assert_eq!(
            result,
            json!({
                "header": "X-API-Key",
                "value": "value123",
                "nested": [{"v": "value123"}, 5]
            })
        );
    }

    #[test]
    fn test_number_substitution() {
        let mut ctx = TemplateContext::new();
        ctx.set_vars(json!({"limit": 100, "enabled": true}));

        let result = render("limit={{ limit }}&enabled={{ vars.enabled }}", &ctx).unwrap();
        assert_eq!(result, "limit=100&enabled=true");
    }

    #[test]
    fn test_whitespace_in_template() {
        let ctx = env_ctx(json!({"KEY": "value"}));

        assert_eq!(render("{{env.KEY}}", &ctx).unwrap(), "value");
        assert_eq!(render("{{ env.KEY }}", &ctx).unwrap(), "value");
        assert_eq!(render("{{  env.KEY  }}", &ctx).unwrap(), "value");
    }
}
