//! Fixed-interval periodic work
//!
//! Runs a closure on a Tokio interval until cancelled. The closure is plain
//! synchronous code, so the work it does (an aggregator tick) can also be
//! invoked directly in tests without waiting on real time.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to a running periodic task
pub struct PeriodicTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: Option<JoinHandle<u64>>,
}

impl PeriodicTask {
    /// Spawn `work` every `period` on the current Tokio runtime.
    ///
    /// Late ticks are skipped rather than bunched up, so the output cadence
    /// stays regular after a stall. The task also stops when `parent` is
    /// cancelled.
    pub fn spawn<F>(
        name: &'static str,
        period: Duration,
        parent: &CancellationToken,
        mut work: F,
    ) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = parent.child_token();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks = 0u64;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        work();
                        ticks += 1;
                    }
                    _ = token.cancelled() => break,
                }
            }

            debug!("Periodic task {} stopped after {} ticks", name, ticks);
            ticks
        });

        Self {
            name,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop the task and wait for it; returns the number of ticks run, or 0
    /// if the work panicked
    pub async fn stop(mut self) -> u64 {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(ticks) => ticks,
                Err(e) => {
                    warn!("Periodic task {} failed: {}", self.name, e);
                    0
                }
            },
            None => 0,
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
