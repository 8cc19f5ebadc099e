//! Authentication module
//!
//! A single token request runs before any source is fetched. The resulting
//! header is attached to every source request; failure is never fatal.

mod authenticator;
mod types;

pub use authenticator::{extract_jsonpath, Authenticator};
pub use types::{AuthConfig, AuthToken};
