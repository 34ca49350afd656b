//! Expiry Sweeper Task
//!
//! Background task that periodically reclaims expired cache entries from
//! both tiers and idle client windows from the rate limiter.
//!
//! The sweep interval only controls how fast memory is reclaimed. Staleness
//! is governed by the TTL, which lookups enforce on their own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::CacheCoordinator;
use crate::limiter::RateLimiter;

/// Handle to a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signals the sweeper to stop and waits for the current pass to finish.
    pub async fn shutdown(self) {
        // Err means the task already exited; nothing to signal.
        let _ = self.shutdown.send(true);
        if let Err(err) = self.join.await {
            warn!(error = %err, "sweeper task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Runs one pass over the cache tiers and the limiter.
pub async fn sweep_once(coordinator: &CacheCoordinator, limiter: &RateLimiter) {
    let report = coordinator.sweep().await;
    let purged = limiter.purge_stale().await;

    let l2 = report.persistent_expired.unwrap_or(0);
    if report.memory_expired + l2 + purged > 0 {
        info!(
            memory_expired = report.memory_expired,
            persistent_expired = ?report.persistent_expired,
            client_windows_purged = purged,
            "sweep completed"
        );
    } else {
        debug!("sweep: nothing to reclaim");
    }
}

/// Spawns the sweeper, ticking every `interval`.
///
/// The first pass runs one full interval after spawning.
pub fn spawn_sweeper(
    coordinator: Arc<CacheCoordinator>,
    limiter: Arc<RateLimiter>,
    interval: Duration,
) -> SweeperHandle {
    let (shutdown, mut stop) = watch::channel(false);

    let join = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "starting expiry sweeper");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => sweep_once(&coordinator, &limiter).await,
                changed = stop.changed() => {
                    // A dropped sender counts as a stop request too.
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!("expiry sweeper stopped");
    });

    SweeperHandle { shutdown, join }
}
