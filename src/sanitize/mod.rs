//! Key sanitizer module
//!
//! Maps arbitrary JSON object keys onto the identifier grammar
//! `^[_a-zA-Z][_a-zA-Z0-9]*$`, escaping names reserved by node records.
//!
//! # Overview
//!
//! - `sanitize_key` - pure single-key mapping
//! - `KeySanitizer` - deep key remapping over a whole JSON value, with
//!   optional diagnostics for every rename

mod sanitizer;

pub use sanitizer::{
    is_valid_identifier, sanitize_key, standardize_key, KeySanitizer, CONFLICT_PREFIX,
    RESERVED_FIELDS,
};
