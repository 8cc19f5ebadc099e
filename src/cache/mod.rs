//! Cache module
//!
//! Time-boxed key/value storage for fetched documents, keyed by request
//! signature.
//!
//! # Overview
//!
//! - `CacheStore` - the interface the fetcher consumes (`get` / `set` with TTL)
//! - `MemoryCache` - process-wide in-memory store
//! - `FileCache` - one JSON file per key, survives across runs
//! - `Clock` - time source, swappable in tests with `ManualClock`
//!
//! Every store treats an entry read after its `expires_at` as a miss.

mod file;
mod memory;
mod types;

pub use file::FileCache;
pub use memory::MemoryCache;
pub use types::{CacheEntry, CachePolicy, CacheStore, Clock, ManualClock, SystemClock};

#[cfg(test)]
mod tests;
