//! Comment generation collaborators
//!
//! The remote backend produces the commentary; the template commenter is the
//! local fallback used when the backend is missing or fails.

use crate::Result;
use async_trait::async_trait;

pub mod deepseek;
pub mod fallback;

pub use deepseek::DeepSeekClient;
pub use fallback::TemplateCommenter;

/// Length of the comment to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// One-liner for a single forwarded message
    Short,
    /// Several sentences over an accumulated context
    Detailed,
}

impl CommentStyle {
    /// Inputs shorter than this are not worth sending to the backend
    pub fn min_input_chars(self) -> usize {
        match self {
            CommentStyle::Short => 10,
            CommentStyle::Detailed => 20,
        }
    }
}

/// Remote text generator for comments
#[async_trait]
pub trait CommentBackend: Send + Sync {
    async fn generate(&self, text: &str, style: CommentStyle) -> Result<String>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}
