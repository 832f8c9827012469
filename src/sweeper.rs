//! Background eviction of idle sessions
//!
//! Runs on a fixed cadence independent of the context TTL, so memory held by
//! inactive users is reclaimed even when nobody reads it.

use crate::commentary::CommentaryService;
use crate::error::RelayError;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Spawn the sweep loop. The first sweep happens one full `period` after start.
pub fn spawn_sweeper(
    service: Arc<CommentaryService>,
    period: Duration,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>> {
    if period.is_zero() {
        return Err(RelayError::invalid_config("sweep interval must be positive"));
    }

    Ok(tokio::spawn(run_sweeper(service, period, cancel)))
}

async fn run_sweeper(service: Arc<CommentaryService>, period: Duration, cancel: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(period_secs = period.as_secs(), "Context sweeper started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = service.sweep();
                debug!(evicted, "Sweep finished");
            }
            () = cancel.cancelled() => {
                info!("Context sweeper stopped");
                return;
            }
        }
    }
}
