//! Forwarded-message memory
//!
//! Per-user context buffers with entry caps, inactivity expiry and
//! budgeted rendering for the commentary backend.

pub mod context_store;
pub mod store;

pub use context_store::{ContextConfig, ContextStore, CHARS_PER_TOKEN};
pub use store::{Entry, RenderedContext, UserContext, ENTRY_SEPARATOR};
