//! Pipeline module
//!
//! Drives configured sources through fetch and normalization.
//!
//! # Overview
//!
//! - `Pipeline` - resolves each source, runs the auth pre-step once, then
//!   fetches and normalizes the sources one after another
//! - `Capabilities` - the host services nodes and fields are emitted through
//! - `RunStats` - what a run did

mod driver;
mod types;

pub use driver::Pipeline;
pub use types::{Capabilities, RunStats};
