//! Shared identifiers and reply models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque chat-platform user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which generator produced a comment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommentSource {
    Backend,
    Fallback,
}

/// Result of forwarding a message into a user's context
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestOutcome {
    Added { count: usize, max: usize },
    TooShort,
}

/// Result of an analyze request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzeOutcome {
    RateLimited { wait_seconds: u64 },
    NoContext,
    Comment {
        text: String,
        message_count: usize,
        source: CommentSource,
    },
}
