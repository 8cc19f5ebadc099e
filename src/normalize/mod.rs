//! Normalization module
//!
//! Converts fetched documents into canonical node records.
//!
//! # Overview
//!
//! - `Normalizer` - extraction, key sanitization, id assignment, digests,
//!   node emission and derived fields
//! - `IdGenerator`, `NodeSink`, `FieldSink` - host services, passed in
//!   explicitly
//! - `Node` - the emitted record

mod host;
mod normalizer;
mod types;

pub use host::{
    FieldSink, IdGenerator, NodeCollector, NodeSink, SequentialIdGenerator, UuidIdGenerator,
};
pub use normalizer::{content_digest, Normalizer};
pub use types::{
    DeriveFn, DerivedField, DerivedFieldConfig, Node, NodeField, NodeInternal, NormalizeConfig,
    NormalizeWarning, Normalized, DUMMY_ID, MEDIA_TYPE,
};

#[cfg(test)]
mod tests;
