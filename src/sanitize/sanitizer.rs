//! Key sanitizer implementation

use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::warn;

/// Prefix applied to keys that start with a non-letter or clash with a reserved name
pub const CONFLICT_PREFIX: &str = "alternative_";

/// Field names owned by the node record itself
pub const RESERVED_FIELDS: [&str; 5] = ["id", "children", "parent", "fields", "internal"];

/// Identifier grammar every sanitized key satisfies
static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_a-zA-Z][_a-zA-Z0-9]*$").unwrap());

/// Separators collapsed to a single underscore
static SEPARATOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-|__|:|\$|\.|\s").unwrap());

/// Anything still outside the identifier alphabet after separator replacement
static INVALID_CHAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^_a-zA-Z0-9]").unwrap());

/// Check whether a key already satisfies the identifier grammar
pub fn is_valid_identifier(key: &str) -> bool {
    NAME_REGEX.is_match(key)
}

fn replace_invalid(key: &str) -> String {
    let replaced = SEPARATOR_REGEX.replace_all(key, "_");
    INVALID_CHAR_REGEX.replace_all(&replaced, "_").into_owned()
}

fn starts_with_identifier_char(key: &str) -> bool {
    key.chars()
        .next()
        .is_some_and(|c| c == '_' || c.is_ascii_alphabetic())
}

/// Map an arbitrary key onto the identifier grammar.
///
/// Pure and idempotent; never returns one of [`RESERVED_FIELDS`].
pub fn sanitize_key(key: &str) -> String {
    let mut nkey = key.to_string();

    if !is_valid_identifier(&nkey) {
        nkey = replace_invalid(&nkey);
    }

    if !starts_with_identifier_char(&nkey) {
        nkey = format!("{CONFLICT_PREFIX}{nkey}");
    }

    if RESERVED_FIELDS.contains(&nkey.as_str()) {
        nkey = replace_invalid(&format!("{CONFLICT_PREFIX}{nkey}"));
    }

    nkey
}

/// Sanitize a key found inside an entity, treating the legacy `ID` spelling as `id`.
pub fn standardize_key(key: &str) -> String {
    if key == "ID" {
        sanitize_key("id")
    } else {
        sanitize_key(key)
    }
}

/// Deep key remapper for entity documents
#[derive(Debug, Clone, Copy, Default)]
pub struct KeySanitizer {
    verbose: bool,
}

impl KeySanitizer {
    /// Create a sanitizer without rename diagnostics
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sanitizer that logs every rename and dropped key
    pub fn verbose() -> Self {
        Self { verbose: true }
    }

    /// Whether rename diagnostics are enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Sanitize a single entity key
    pub fn sanitize(&self, key: &str) -> String {
        let nkey = standardize_key(key);
        if self.verbose && nkey != key {
            warn!(
                key = %key,
                renamed = %nkey,
                "Key breaks identifier naming convention, renamed"
            );
        }
        nkey
    }

    /// Rewrite every object key in `value`, recursively.
    ///
    /// Array order and scalar values are preserved. When two keys of the same
    /// object sanitize to the same identifier, a key that was already valid
    /// keeps its value; otherwise the first key in map order wins.
    pub fn sanitize_value(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.sanitize_object(map)),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.sanitize_value(item))
                    .collect(),
            ),
            scalar => scalar,
        }
    }

    /// Rewrite every key of an object, recursively
    pub fn sanitize_object(&self, map: Map<String, Value>) -> Map<String, Value> {
        let mut result = Map::new();
        let mut kept_verbatim: HashSet<String> = HashSet::new();

        for (key, value) in map {
            let nkey = self.sanitize(&key);
            let verbatim = nkey == key;
            let value = self.sanitize_value(value);

            if result.contains_key(&nkey) {
                if verbatim && !kept_verbatim.contains(&nkey) {
                    self.report_collision(&nkey, "renamed key");
                    result.insert(nkey.clone(), value);
                    kept_verbatim.insert(nkey);
                } else {
                    self.report_collision(&nkey, &key);
                }
                continue;
            }

            if verbatim {
                kept_verbatim.insert(nkey.clone());
            }
            result.insert(nkey, value);
        }

        result
    }

    fn report_collision(&self, key: &str, dropped: &str) {
        if self.verbose {
            warn!(
                key = %key,
                dropped = %dropped,
                "Sanitized keys collide, keeping a single value"
            );
        }
    }
}
