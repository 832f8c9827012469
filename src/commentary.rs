//! Commentary service
//!
//! Ties the rate limiter and the context store to the comment generators.
//! Every core call returns before any generation request is awaited, so no
//! session lock is ever held across network I/O.

use crate::config::Settings;
use crate::generation::{CommentBackend, CommentStyle, DeepSeekClient, TemplateCommenter};
use crate::memory::ContextStore;
use crate::models::{AnalyzeOutcome, CommentSource, IngestOutcome, UserId};
use crate::rate_limit::RateLimiter;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct CommentaryService {
    rate_limiter: Arc<RateLimiter>,
    contexts: Arc<ContextStore>,
    backend: Option<Arc<dyn CommentBackend>>,
}

impl CommentaryService {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        contexts: Arc<ContextStore>,
        backend: Option<Arc<dyn CommentBackend>>,
    ) -> Self {
        Self {
            rate_limiter,
            contexts,
            backend,
        }
    }

    /// Build the service from settings. Without an API key only the
    /// template fallback is used.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let rate_limiter = Arc::new(RateLimiter::new(settings.rate_limit.clone())?);
        let contexts = Arc::new(ContextStore::new(settings.context.clone())?);

        let backend: Option<Arc<dyn CommentBackend>> = if settings.deepseek.has_api_key() {
            info!("DeepSeek API key found, comments will be generated remotely");
            let client = DeepSeekClient::new(settings.deepseek.clone())?;
            Some(Arc::new(client) as Arc<dyn CommentBackend>)
        } else {
            warn!("DEEPSEEK_API_KEY not set, using local template comments only");
            None
        };

        Ok(Self::new(rate_limiter, contexts, backend))
    }

    /// Store a forwarded message
    pub fn on_incoming_text(&self, user: UserId, text: &str, external_id: Option<i64>) -> IngestOutcome {
        if !self.contexts.append(user, text, external_id) {
            debug!(%user, "Forwarded message too short, skipped");
            return IngestOutcome::TooShort;
        }

        let count = self.contexts.message_count(user);
        info!(%user, count, "Forwarded message added to context");

        IngestOutcome::Added {
            count,
            max: self.contexts.config().max_entries,
        }
    }

    /// Produce a detailed comment over the user's accumulated context
    pub async fn on_analyze_request(&self, user: UserId) -> AnalyzeOutcome {
        if let Some(limited) = self.check_rate_limit(user) {
            return limited;
        }

        if !self.contexts.has_context(user) {
            info!(%user, "Analyze requested without context");
            return AnalyzeOutcome::NoContext;
        }

        let Some(context_text) = self.contexts.render(user) else {
            return AnalyzeOutcome::NoContext;
        };
        let message_count = self.contexts.message_count(user);

        info!(%user, message_count, "Generating detailed comment");
        let (text, source) = self
            .generate_with_fallback(&context_text, CommentStyle::Detailed)
            .await;

        AnalyzeOutcome::Comment {
            text,
            message_count,
            source,
        }
    }

    /// One-off short comment on a single text; nothing is stored
    pub async fn on_comment_request(&self, user: UserId, text: &str) -> AnalyzeOutcome {
        if let Some(limited) = self.check_rate_limit(user) {
            return limited;
        }

        let (text, source) = self.generate_with_fallback(text, CommentStyle::Short).await;
        AnalyzeOutcome::Comment {
            text,
            message_count: 0,
            source,
        }
    }

    pub fn on_clear_request(&self, user: UserId) -> bool {
        let existed = self.contexts.clear(user);
        info!(%user, existed, "Context cleared");
        existed
    }

    /// Periodic maintenance: evict idle contexts and empty rate-limit logs
    pub fn sweep(&self) -> usize {
        let evicted = self.contexts.evict_expired();
        self.rate_limiter.purge_idle();
        evicted
    }

    pub fn welcome_text(&self) -> String {
        let config = self.contexts.config();
        format!(
            "Hi! I write sarcastic commentary on forwarded messages.\n\n\
             How to use:\n\
             1. Forward me messages and I will keep them in your context\n\
             2. Use /analyze for a detailed comment on the accumulated context\n\
             3. Use /clear to reset the context\n\n\
             The context is cleared after {} of inactivity and keeps the last {} messages.",
            idle_timeout_label(config.ttl_secs),
            config.max_entries
        )
    }

    pub fn contexts(&self) -> &Arc<ContextStore> {
        &self.contexts
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    fn check_rate_limit(&self, user: UserId) -> Option<AnalyzeOutcome> {
        if self.rate_limiter.admit(user) {
            return None;
        }

        let wait_seconds = self.rate_limiter.wait_seconds(user);
        warn!(%user, wait_seconds, "Rate limit exceeded");
        Some(AnalyzeOutcome::RateLimited { wait_seconds })
    }

    async fn generate_with_fallback(&self, text: &str, style: CommentStyle) -> (String, CommentSource) {
        if let Some(backend) = &self.backend {
            match backend.generate(text, style).await {
                Ok(comment) => return (comment, CommentSource::Backend),
                Err(e) => warn!("{} failed: {}. Using local templates", backend.name(), e),
            }
        }

        (TemplateCommenter::comment(text, style), CommentSource::Fallback)
    }
}

fn idle_timeout_label(ttl_secs: u64) -> String {
    if ttl_secs < 60 {
        format!("{} seconds", ttl_secs)
    } else {
        format!("{} minutes", ttl_secs / 60)
    }
}
