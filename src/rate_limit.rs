//! Per-user sliding-window rate limiting
//!
//! Each user owns an ordered log of admission timestamps. A call is admitted
//! while fewer than `max_actions` timestamps fall inside the trailing window.

use crate::clock::{Clock, SystemClock};
use crate::error::RelayError;
use crate::models::UserId;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Configuration for admission control
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum admitted actions inside one window
    pub max_actions: usize,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_actions: 5,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    fn window(&self) -> Result<Duration> {
        if self.max_actions == 0 {
            return Err(RelayError::invalid_config("max_actions must be positive"));
        }
        if self.window_secs == 0 {
            return Err(RelayError::invalid_config("window_secs must be positive"));
        }

        i64::try_from(self.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                RelayError::invalid_config(format!("window_secs out of range: {}", self.window_secs))
            })
    }
}

#[derive(Debug, Default)]
struct ActivityLog {
    timestamps: VecDeque<DateTime<Utc>>,
}

impl ActivityLog {
    fn prune(&mut self, cutoff: DateTime<Utc>) {
        self.timestamps.retain(|t| *t > cutoff);
    }

    fn oldest(&self) -> Option<DateTime<Utc>> {
        self.timestamps.iter().min().copied()
    }

    fn try_record(&mut self, now: DateTime<Utc>, cutoff: DateTime<Utc>, max_actions: usize) -> bool {
        self.prune(cutoff);

        if self.timestamps.len() >= max_actions {
            return false;
        }

        self.timestamps.push_back(now);
        true
    }
}

/// Sliding-window rate limiter keyed by user.
///
/// The user map lock is taken for write only on first touch and on garbage
/// collection; per-user logs are mutated under their own mutex while the map
/// read guard is held.
pub struct RateLimiter {
    max_actions: usize,
    window: Duration,
    logs: RwLock<HashMap<UserId, Mutex<ActivityLog>>>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let window = config.window()?;

        let now = clock.now();
        if now.checked_sub_signed(window).is_none() || now.checked_add_signed(window).is_none() {
            return Err(RelayError::invalid_config(format!(
                "window_secs exceeds the representable time range: {}",
                config.window_secs
            )));
        }

        Ok(Self {
            max_actions: config.max_actions,
            window,
            logs: RwLock::new(HashMap::new()),
            clock,
        })
    }

    /// Admit one action for `user`, recording it only when admitted
    pub fn admit(&self, user: UserId) -> bool {
        let now = self.clock.now();
        let cutoff = self.cutoff(now);

        {
            let logs = self.logs.read();
            if let Some(log) = logs.get(&user) {
                return log.lock().try_record(now, cutoff, self.max_actions);
            }
        }

        let mut logs = self.logs.write();
        let log = logs.entry(user).or_default();
        log.get_mut().try_record(now, cutoff, self.max_actions)
    }

    /// Seconds until the oldest recorded slot leaves the window. Read-only.
    pub fn wait_seconds(&self, user: UserId) -> u64 {
        let now = self.clock.now();
        let logs = self.logs.read();

        let Some(oldest) = logs.get(&user).and_then(|log| log.lock().oldest()) else {
            return 0;
        };

        let window_end = oldest
            .checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        match (window_end - now).to_std() {
            Ok(remaining) => remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0),
            Err(_) => 0,
        }
    }

    /// Prune every log and drop the ones left empty. Returns the number dropped.
    pub fn purge_idle(&self) -> usize {
        let cutoff = self.cutoff(self.clock.now());
        let mut logs = self.logs.write();
        let before = logs.len();

        logs.retain(|_, log| {
            let log = log.get_mut();
            log.prune(cutoff);
            !log.timestamps.is_empty()
        });

        let purged = before - logs.len();
        if purged > 0 {
            debug!(purged, "Dropped idle rate-limit logs");
        }
        purged
    }

    pub fn tracked_users(&self) -> usize {
        self.logs.read().len()
    }

    /// Timestamps at or before this instant are outside the window ending at `now`
    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(max_actions: usize, window_secs: u64) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let limiter = RateLimiter::with_clock(
            RateLimitConfig {
                max_actions,
                window_secs,
            },
            clock.clone(),
        )
        .unwrap();
        (limiter, clock)
    }

    #[test]
    fn test_burst_rejects_after_limit() {
        let (limiter, _clock) = limiter(5, 60);
        let user = UserId(1);

        for _ in 0..5 {
            assert!(limiter.admit(user));
        }
        assert!(!limiter.admit(user));

        let wait = limiter.wait_seconds(user);
        assert!(wait > 0 && wait <= 60, "wait was {}", wait);
    }

    #[test]
    fn test_wait_seconds_without_history() {
        let (limiter, _clock) = limiter(5, 60);
        assert_eq!(limiter.wait_seconds(UserId(7)), 0);
    }

    #[test]
    fn test_retry_after_wait_succeeds() {
        let (limiter, clock) = limiter(2, 60);
        let user = UserId(1);

        assert!(limiter.admit(user));
        clock.advance_secs(10);
        assert!(limiter.admit(user));
        assert!(!limiter.admit(user));

        let wait = limiter.wait_seconds(user);
        assert_eq!(wait, 50);

        clock.advance_secs(wait as i64 - 1);
        assert!(!limiter.admit(user));

        clock.advance_secs(1);
        assert!(limiter.admit(user));
    }

    #[test]
    fn test_wait_seconds_rounds_up_partial_seconds() {
        let (limiter, clock) = limiter(1, 60);
        let user = UserId(1);

        assert!(limiter.admit(user));
        clock.advance(Duration::milliseconds(59_500));
        assert_eq!(limiter.wait_seconds(user), 1);

        clock.advance(Duration::milliseconds(499));
        assert!(!limiter.admit(user));
        assert_eq!(limiter.wait_seconds(user), 1);
    }

    #[test]
    fn test_wait_seconds_is_read_only() {
        let (limiter, clock) = limiter(1, 30);
        let user = UserId(1);

        assert!(limiter.admit(user));
        clock.advance_secs(45);

        // Stale timestamp is still present, so the projection saturates at zero.
        assert_eq!(limiter.wait_seconds(user), 0);
        assert_eq!(limiter.tracked_users(), 1);
        assert!(limiter.admit(user));
    }

    #[test]
    fn test_rejections_are_not_recorded() {
        let (limiter, clock) = limiter(1, 10);
        let user = UserId(1);

        assert!(limiter.admit(user));
        for _ in 0..5 {
            clock.advance_secs(1);
            assert!(!limiter.admit(user));
        }

        clock.advance_secs(5);
        assert!(limiter.admit(user));
    }

    #[test]
    fn test_trailing_window_never_exceeds_limit() {
        let (limiter, clock) = limiter(3, 20);
        let user = UserId(9);
        let mut admitted: Vec<DateTime<Utc>> = Vec::new();

        for step in 0..120 {
            clock.advance_secs(if step % 4 == 0 { 7 } else { 1 });
            if limiter.admit(user) {
                admitted.push(clock.now());
            }

            let now = clock.now();
            let in_window = admitted
                .iter()
                .filter(|t| **t > now - Duration::seconds(20))
                .count();
            assert!(in_window <= 3, "{} admitted in window at step {}", in_window, step);
        }

        assert!(admitted.len() > 3);
    }

    #[test]
    fn test_users_are_isolated() {
        let (limiter, _clock) = limiter(1, 60);

        assert!(limiter.admit(UserId(1)));
        assert!(!limiter.admit(UserId(1)));
        assert!(limiter.admit(UserId(2)));
        assert_eq!(limiter.wait_seconds(UserId(3)), 0);
    }

    #[test]
    fn test_purge_idle_drops_empty_logs() {
        let (limiter, clock) = limiter(2, 30);

        assert!(limiter.admit(UserId(1)));
        clock.advance_secs(20);
        assert!(limiter.admit(UserId(2)));
        clock.advance_secs(15);

        assert_eq!(limiter.purge_idle(), 1);
        assert_eq!(limiter.tracked_users(), 1);
        assert_eq!(limiter.wait_seconds(UserId(1)), 0);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let zero_actions = RateLimiter::new(RateLimitConfig {
            max_actions: 0,
            window_secs: 60,
        });
        assert!(matches!(zero_actions, Err(RelayError::InvalidConfig(_))));

        let zero_window = RateLimiter::new(RateLimitConfig {
            max_actions: 5,
            window_secs: 0,
        });
        assert!(matches!(zero_window, Err(RelayError::InvalidConfig(_))));
    }

    #[test]
    fn test_window_beyond_time_range_rejected() {
        let result = RateLimiter::new(RateLimitConfig {
            max_actions: 1,
            window_secs: 10_000_000_000_000,
        });
        assert!(matches!(result, Err(RelayError::InvalidConfig(_))));
    }

    #[test]
    fn test_century_window_is_total() {
        let (limiter, clock) = limiter(1, 100 * 365 * 24 * 3600);
        let user = UserId(3);

        assert!(limiter.admit(user));
        assert!(!limiter.admit(user));
        assert_eq!(limiter.wait_seconds(user), 100 * 365 * 24 * 3600);

        clock.advance_secs(3600);
        assert_eq!(limiter.purge_idle(), 0);
        assert_eq!(limiter.tracked_users(), 1);
    }

    #[test]
    fn test_concurrent_admits_respect_limit() {
        let (limiter, _clock) = limiter(10, 60);
        let admitted = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..5 {
                        if limiter.admit(UserId(1)) {
                            admitted.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.into_inner(), 10);
    }
}
