//! Watcher — cancellable periodic snapshot loop.
//!
//! Fetches a snapshot immediately, hands the outcome to the caller, then
//! waits `interval` before the next cycle. A shutdown signal ends the loop
//! promptly, even mid-fetch.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use cpxstat_core::{MonitorResult, Snapshot};

use crate::fetcher::SnapshotFetcher;
use crate::source::MetricsSource;

/// Repeatedly polls a fetcher until told to stop.
pub struct Watcher<S> {
    fetcher: SnapshotFetcher<S>,
    interval: Duration,
}

impl<S: MetricsSource> Watcher<S> {
    pub fn new(fetcher: SnapshotFetcher<S>, interval: Duration) -> Self {
        Self { fetcher, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn fetcher(&self) -> &SnapshotFetcher<S> {
        &self.fetcher
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// `on_cycle` sees every outcome, failures included; a failed cycle does
    /// not stop the loop. Returns the number of completed cycles.
    pub async fn run<F>(&self, mut shutdown: watch::Receiver<bool>, mut on_cycle: F) -> u64
    where
        F: FnMut(MonitorResult<Snapshot>),
    {
        info!(interval_ms = self.interval.as_millis() as u64, "watch started");
        let mut cycles = 0u64;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                result = self.fetcher.fetch_snapshot(None) => {
                    cycles += 1;
                    match &result {
                        Ok(snapshot) => debug!(
                            cycle = cycles,
                            instances = snapshot.instances.len(),
                            "watch cycle complete"
                        ),
                        Err(e) => warn!(cycle = cycles, error = %e, "watch cycle failed"),
                    }
                    on_cycle(result);
                }
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(cycles, "watch stopped");
        cycles
    }
}
