//! Optional background sweep of expired cache entries.
//!
//! Lookups already ignore expired entries; the sweeper only bounds memory
//! for keys that are written once and never read again.

use super::store::ResultCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handle to a running sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper explicitly.
    pub fn stop(self) {}

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a task that calls [`ResultCache::purge_expired`] every `interval`.
/// Returns `None` for a zero interval, which cannot tick.
///
/// Must be called from within a tokio runtime.
pub fn spawn_sweeper(cache: Arc<ResultCache>, interval: Duration) -> Option<SweeperHandle> {
    if interval.is_zero() {
        warn!("cache sweep interval is zero; sweeper not started");
        return None;
    }
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(removed, remaining = cache.len(), "swept expired cache entries");
            }
        }
    });
    Some(SweeperHandle { task })
}
