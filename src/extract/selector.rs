//! Selector path parsing and entity extraction

use crate::error::{Error, Result};
use crate::types::{describe_kind, JsonObject};
use serde_json::Value;
use std::fmt;

/// One entity as extracted from a response document
pub type EntityRecord = JsonObject;

/// A single accessor in a selector path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object property access
    Key(String),
    /// Array index access; negative values count from the end
    Index(i64),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// Parsed dotted/indexed route into a JSON document
///
/// Accepts `data.items`, `$.data.items`, `results[0].rows` and `matrix[1][-1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPath {
    raw: String,
    segments: Vec<Segment>,
}

impl SelectorPath {
    /// Parse a selector path
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim();
        let body = trimmed
            .strip_prefix("$.")
            .or_else(|| trimmed.strip_prefix('$'))
            .unwrap_or(trimmed);

        let mut segments = Vec::new();
        if !body.is_empty() {
            for part in body.split('.') {
                parse_part(trimmed, part, &mut segments)?;
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed accessors, in order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Resolve this path against a document
    pub fn resolve<'a>(&self, document: &'a Value) -> Result<&'a Value> {
        let mut current = document;
        for segment in &self.segments {
            let next = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(index), Value::Array(items)) => {
                    let len = items.len() as i64;
                    let idx = if *index < 0 { len + index } else { *index };
                    if idx < 0 {
                        None
                    } else {
                        items.get(idx as usize)
                    }
                }
                _ => None,
            };
            current = next.ok_or_else(|| Error::path_resolution(&self.raw, segment.to_string()))?;
        }
        Ok(current)
    }
}

impl fmt::Display for SelectorPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse one dot-separated part (`name`, `name[0]`, `[1][2]`) into segments
fn parse_part(path: &str, part: &str, segments: &mut Vec<Segment>) -> Result<()> {
    let invalid = |message: &str| Error::invalid_value("selector_path", format!("'{path}': {message}"));

    let (name, mut rest) = match part.find('[') {
        Some(pos) => (&part[..pos], &part[pos..]),
        None => (part, ""),
    };

    if name.is_empty() && rest.is_empty() {
        return Err(invalid("empty segment"));
    }
    if !name.is_empty() {
        segments.push(Segment::Key(name.to_string()));
    }

    while !rest.is_empty() {
        let close = rest
            .find(']')
            .ok_or_else(|| invalid("unclosed '['"))?;
        if !rest.starts_with('[') {
            return Err(invalid("unexpected characters after ']'"));
        }
        let index_str = rest[1..close].trim();
        let index = index_str
            .parse::<i64>()
            .map_err(|_| invalid(&format!("'{index_str}' is not an array index")))?;
        segments.push(Segment::Index(index));
        rest = &rest[close + 1..];
    }

    Ok(())
}

/// Resolve a selector path string against a document
pub fn resolve_path<'a>(document: &'a Value, path: &str) -> Result<&'a Value> {
    SelectorPath::parse(path)?.resolve(document)
}

/// Locate the entity collection in `document`.
///
/// Without a selector the document itself is the candidate. A lone object is
/// wrapped into a one-element collection; any other leaf value, or an array
/// element that is not an object, is an `InvalidShape` error.
pub fn extract_entities(document: &Value, selector: Option<&str>) -> Result<Vec<EntityRecord>> {
    let label = selector.unwrap_or("$");

    let candidate = match selector {
        Some(path) if path.contains('*') => extract_with_jsonpath(document, path)?,
        Some(path) => SelectorPath::parse(path)?.resolve(document)?.clone(),
        None => document.clone(),
    };

    match candidate {
        Value::Object(map) => Ok(vec![map]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::Object(map) => Ok(map),
                other => Err(Error::invalid_shape(
                    format!("{label}[{i}]"),
                    describe_kind(&other),
                )),
            })
            .collect(),
        other => Err(Error::invalid_shape(label, describe_kind(&other))),
    }
}

/// Evaluate a wildcard selector with jsonpath-rust
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Value> {
    use jsonpath_rust::JsonPath;

    let query = if path.starts_with('$') {
        path.to_string()
    } else {
        format!("$.{path}")
    };

    let jp = JsonPath::try_from(query.as_str())
        .map_err(|e| Error::json_path(format!("Invalid JSONPath '{path}': {e}")))?;

    match jp.find(value) {
        Value::Null => Err(Error::path_resolution(path, "*")),
        found => Ok(found),
    }
}
