//! Forwarded-message buffer for a single user
//!
//! Stores entries oldest→newest with timestamps and renders them into one
//! labeled text blob under a character budget.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Separator placed between rendered entries
pub const ENTRY_SEPARATOR: &str = "\n\n---\n\n";

/// A single forwarded message held in context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Platform message id, when the transport supplies one
    pub external_id: Option<i64>,
}

impl Entry {
    pub fn new(text: &str, created_at: DateTime<Utc>, external_id: Option<i64>) -> Self {
        Self {
            text: text.trim().to_string(),
            created_at,
            external_id,
        }
    }

    /// Labeled block, numbered from 1
    fn render_block(&self, number: usize) -> String {
        format!(
            "[Message {}, {}]\n{}",
            number,
            self.created_at.format("%H:%M:%S"),
            self.text
        )
    }
}

/// Rendered view of a user's buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedContext {
    pub text: String,
    /// Entries represented in `text` (0 when the newest entry was hard-truncated)
    pub entries_included: usize,
    pub truncated: bool,
}

/// Per-user context buffer
#[derive(Debug, Clone)]
pub struct UserContext {
    entries: VecDeque<Entry>,
    last_activity: DateTime<Utc>,
}

impl UserContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            entries: VecDeque::new(),
            last_activity: now,
        }
    }

    /// Append at the tail, dropping from the head past `max_entries`.
    ///
    /// An expired buffer is emptied first. Returns the number of entries dropped.
    pub fn append(
        &mut self,
        entry: Entry,
        now: DateTime<Utc>,
        ttl: Duration,
        max_entries: usize,
    ) -> usize {
        let mut dropped = 0;

        if self.is_expired(now, ttl) {
            dropped += self.entries.len();
            self.entries.clear();
        }

        self.entries.push_back(entry);
        while self.entries.len() > max_entries {
            self.entries.pop_front();
            dropped += 1;
        }

        self.last_activity = now;
        dropped
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity > ttl
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render under a budget of `max_chars` characters.
    ///
    /// Keeps the longest trailing run of entries that fits; when even the newest
    /// entry does not fit, returns its text cut to the budget.
    pub fn render(&self, max_chars: usize) -> Option<RenderedContext> {
        let newest = self.entries.back()?;

        let blocks: Vec<String> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| entry.render_block(i + 1))
            .collect();

        let separator_len = ENTRY_SEPARATOR.chars().count();
        let mut used = 0usize;
        let mut start = blocks.len();

        for (i, block) in blocks.iter().enumerate().rev() {
            let cost = block.chars().count() + if start == blocks.len() { 0 } else { separator_len };
            if used + cost > max_chars {
                break;
            }
            used += cost;
            start = i;
        }

        if start == blocks.len() {
            return Some(RenderedContext {
                text: newest.text.chars().take(max_chars).collect(),
                entries_included: 0,
                truncated: true,
            });
        }

        Some(RenderedContext {
            text: blocks[start..].join(ENTRY_SEPARATOR),
            entries_included: blocks.len() - start,
            truncated: start > 0,
        })
    }
}
