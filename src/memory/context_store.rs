//! Per-user context store
//!
//! Owns every user's forwarded-message buffer, expires buffers after
//! inactivity and renders them for the generation backend.

use crate::clock::{Clock, SystemClock};
use crate::error::RelayError;
use crate::memory::store::{Entry, UserContext};
use crate::models::UserId;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for context accumulation
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Maximum entries kept per user
    pub max_entries: usize,
    /// Inactivity period after which a buffer expires
    pub ttl_secs: u64,
    /// Character budget for the rendered context
    pub max_rendered_chars: usize,
    /// Trimmed texts shorter than this are ignored
    pub min_entry_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_entries: 10,
            ttl_secs: 30 * 60,
            max_rendered_chars: 4000 * CHARS_PER_TOKEN,
            min_entry_chars: 5,
        }
    }
}

/// Rough characters-per-token ratio used to turn a token budget into characters
pub const CHARS_PER_TOKEN: usize = 4;

impl ContextConfig {
    fn ttl(&self) -> Result<Duration> {
        if self.max_entries == 0 {
            return Err(RelayError::invalid_config("max_entries must be positive"));
        }
        if self.max_rendered_chars == 0 {
            return Err(RelayError::invalid_config("max_rendered_chars must be positive"));
        }
        if self.ttl_secs == 0 {
            return Err(RelayError::invalid_config("ttl_secs must be positive"));
        }

        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                RelayError::invalid_config(format!("ttl_secs out of range: {}", self.ttl_secs))
            })
    }
}

/// Bounded, expiring context buffers keyed by user.
///
/// The map lock is taken for write only to create or remove a user's buffer.
/// Buffers are read and mutated under their own mutex while the map read guard
/// is held, so removal never races an in-flight append.
pub struct ContextStore {
    config: ContextConfig,
    ttl: Duration,
    users: RwLock<HashMap<UserId, Mutex<UserContext>>>,
    clock: Arc<dyn Clock>,
}

impl ContextStore {
    pub fn new(config: ContextConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ContextConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let ttl = config.ttl()?;

        Ok(Self {
            config,
            ttl,
            users: RwLock::new(HashMap::new()),
            clock,
        })
    }

    /// Append forwarded text. Returns false when the text is too short to keep.
    pub fn append(&self, user: UserId, text: &str, external_id: Option<i64>) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.config.min_entry_chars {
            return false;
        }

        let now = self.clock.now();
        let entry = Entry::new(trimmed, now, external_id);

        {
            let users = self.users.read();
            if let Some(context) = users.get(&user) {
                self.append_locked(user, &mut context.lock(), entry, now);
                return true;
            }
        }

        let mut users = self.users.write();
        let context = users
            .entry(user)
            .or_insert_with(|| Mutex::new(UserContext::new(now)));
        self.append_locked(user, context.get_mut(), entry, now);
        true
    }

    fn append_locked(&self, user: UserId, context: &mut UserContext, entry: Entry, now: DateTime<Utc>) {
        let dropped = context.append(entry, now, self.ttl, self.config.max_entries);
        if dropped > 0 {
            debug!(%user, dropped, "Context trimmed to {} entries", self.config.max_entries);
        }
    }

    /// Render the user's context, or None when absent or expired
    pub fn render(&self, user: UserId) -> Option<String> {
        let rendered = self
            .inspect(user, |context| context.render(self.config.max_rendered_chars))
            .flatten()?;

        if rendered.truncated {
            warn!(
                %user,
                included = rendered.entries_included,
                budget = self.config.max_rendered_chars,
                "Context exceeded render budget, truncated from oldest"
            );
        }

        Some(rendered.text)
    }

    pub fn has_context(&self, user: UserId) -> bool {
        self.inspect(user, |context| !context.is_empty())
            .unwrap_or(false)
    }

    pub fn message_count(&self, user: UserId) -> usize {
        self.inspect(user, UserContext::len).unwrap_or(0)
    }

    /// Drop the user's buffer. Returns whether one existed.
    pub fn clear(&self, user: UserId) -> bool {
        self.users.write().remove(&user).is_some()
    }

    /// Remove every buffer idle for longer than the ttl
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();

        let candidates: Vec<UserId> = {
            let users = self.users.read();
            users
                .iter()
                .filter(|(_, context)| context.lock().is_expired(now, self.ttl))
                .map(|(user, _)| *user)
                .collect()
        };

        let evicted = candidates
            .into_iter()
            .filter(|user| self.remove_if_expired(*user, now))
            .count();

        if evicted > 0 {
            info!(evicted, "Evicted expired contexts");
        }
        evicted
    }

    pub fn tracked_users(&self) -> usize {
        self.users.read().len()
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Run `f` against a live buffer, expiring it lazily when stale
    fn inspect<T>(&self, user: UserId, f: impl FnOnce(&UserContext) -> T) -> Option<T> {
        let now = self.clock.now();

        {
            let users = self.users.read();
            let context = users.get(&user)?.lock();
            if !context.is_expired(now, self.ttl) {
                return Some(f(&context));
            }
        }

        if self.remove_if_expired(user, now) {
            debug!(%user, "Context expired, cleared");
        }
        None
    }

    /// Re-checks under the write lock so a concurrent append keeps its buffer
    fn remove_if_expired(&self, user: UserId, now: DateTime<Utc>) -> bool {
        let mut users = self.users.write();

        let expired = users
            .get_mut(&user)
            .is_some_and(|context| context.get_mut().is_expired(now, self.ttl));

        if expired {
            users.remove(&user);
        }
        expired
    }
}
