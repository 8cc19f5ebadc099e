// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # apinode
//!
//! Turns an arbitrary HTTP API into a graph of typed, uniquely-identified
//! node records.
//!
//! ## Features
//!
//! - **Cached, paginated fetching**: one document per source, served from a
//!   time-boxed cache keyed by request signature
//! - **Pagination**: cursor, offset, page number, link header, next URL, or
//!   any closure computing the next request
//! - **Normalization**: entity extraction by selector path, key sanitization,
//!   content digests, refresh ids and derived fields
//! - **Explicit host services**: id generation, node and field registration
//!   and the cache are passed in, never global
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use apinode::{load_pipeline, Capabilities, NodeCollector, Pipeline, Result};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = load_pipeline("pipeline.yaml")?;
//!
//!     let collector = Arc::new(NodeCollector::new());
//!     let caps = Capabilities::collecting(collector.clone());
//!
//!     let stats = Pipeline::new(config, caps).run().await?;
//!     println!("{} nodes", stats.nodes_created);
//!
//!     for node in collector.nodes() {
//!         println!("{} {}", node.internal.node_type, node.id);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Pipeline                                │
//! │   resolve(defaults, entity) → auth → fetch → normalize          │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │   Auth   │   HTTP    │   Paginate    │   Cache   │  Normalize  │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Token    │ GET/POST  │ Cursor        │ Memory    │ Extract     │
//! │ request  │ Retry     │ Offset        │ File      │ Sanitize    │
//! │          │ Rate Limit│ Page Number   │ TTL       │ Ids/Digest  │
//! │          │ Backoff   │ Link Header   │           │ Derived     │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Key sanitization
pub mod sanitize;

/// Entity extraction by selector path
pub mod extract;

/// Time-boxed document cache
pub mod cache;

/// HTTP client with retry and rate limiting
pub mod http;

/// Authentication pre-step
pub mod auth;

/// Pagination strategies
pub mod pagination;

/// Cache-aware document fetching
pub mod fetch;

/// Template interpolation
pub mod template;

/// Node normalization
pub mod normalize;

/// Pipeline configuration
pub mod config;

/// Pipeline driver
pub mod pipeline;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{load_pipeline, load_pipeline_from_str, resolve, PipelineConfig, SourceConfig};
pub use normalize::{Node, NodeCollector, Normalizer};
pub use pipeline::{Capabilities, Pipeline, RunStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
