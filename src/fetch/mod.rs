//! Fetch module
//!
//! Turns a request into a locally materialized document: cache lookup,
//! pagination, optional raw save, cache fill.

mod fetcher;

pub use fetcher::{FetchOptions, Fetcher};

#[cfg(test)]
mod tests;
