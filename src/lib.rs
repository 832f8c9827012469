//! Forward Relay Bot
//!
//! A message-relay assistant that:
//! - Accumulates messages a user forwards to it, per user
//! - Expires idle contexts and caps their size
//! - Rate-limits analyze requests with a sliding window
//! - Produces sarcastic commentary via DeepSeek, with a local template fallback
//!
//! FLOW:
//! FORWARD → APPEND → ANALYZE → ADMIT → RENDER → GENERATE (→ FALLBACK)

pub mod api;
pub mod clock;
pub mod commentary;
pub mod config;
pub mod error;
pub mod generation;
pub mod memory;
pub mod models;
pub mod rate_limit;
pub mod sweeper;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use commentary::CommentaryService;
pub use memory::ContextStore;
pub use rate_limit::RateLimiter;
