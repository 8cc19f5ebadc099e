//! Entity extraction module
//!
//! Locates the entity collection inside an arbitrarily nested response
//! document.
//!
//! # Overview
//!
//! - `SelectorPath` - parsed dotted/indexed route such as `data.items[0].rows`
//! - `extract_entities` - resolve a selector and coerce the result into a
//!   collection of entity records
//!
//! Selectors containing a wildcard (`*`) are evaluated with `jsonpath-rust`.

mod selector;

pub use selector::{extract_entities, resolve_path, EntityRecord, Segment, SelectorPath};
