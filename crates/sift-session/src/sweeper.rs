//! Background eviction of expired sessions.
//!
//! Expiry is observable immediately through [`SessionStore::get`]; the
//! sweeper is what actually releases the runtime handles of sessions that
//! nobody closed explicitly.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::store::SessionStore;

/// Outcome of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries inspected.
    pub scanned: usize,
    /// Expired entries closed and removed.
    pub evicted: usize,
    /// Expired entries skipped because a call held their lock.
    pub busy: usize,
    /// Evicted entries whose runtime failed to close cleanly.
    pub failed_closes: usize,
}

/// Periodically closes and removes expired sessions.
#[derive(Debug, Clone)]
pub struct EvictionSweeper {
    store: Arc<SessionStore>,
    interval: Duration,
}

impl EvictionSweeper {
    pub fn new(store: Arc<SessionStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one sweep over every tenant's sessions.
    ///
    /// Entries whose lock is held by an in-flight call are left for the next
    /// sweep. A failed close is logged and the entry is removed anyway.
    pub fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let mut report = SweepReport::default();

        for entry in self.store.snapshot() {
            report.scanned += 1;
            if !entry.is_expired_at(now) {
                continue;
            }

            let Some(mut guard) = entry.try_lock() else {
                debug!(
                    tenant = %entry.tenant(),
                    session_id = %entry.id(),
                    "Expired session busy, retrying next sweep"
                );
                report.busy += 1;
                continue;
            };

            if let Some(Err(e)) = guard.close() {
                warn!(
                    tenant = %entry.tenant(),
                    session_id = %entry.id(),
                    component = %entry.component_name(),
                    error = %e,
                    "Failed to close expired session"
                );
                report.failed_closes += 1;
            }
            if self.store.remove_entry(&entry) {
                report.evicted += 1;
                debug!(
                    tenant = %entry.tenant(),
                    session_id = %entry.id(),
                    "Evicted expired session"
                );
            }
        }

        if report.evicted > 0 || report.busy > 0 {
            debug!(
                scanned = report.scanned,
                evicted = report.evicted,
                busy = report.busy,
                failed_closes = report.failed_closes,
                "Sweep finished"
            );
        }

        report
    }

    /// Spawn the sweep loop on the current tokio runtime.
    ///
    /// Each sweep runs on the blocking pool because closing a runtime may
    /// take arbitrarily long. The loop exits when `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            debug!(interval_ms = self.interval.as_millis() as u64, "Sweeper started");

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let sweeper = self.clone();
                        if let Err(e) = tokio::task::spawn_blocking(move || sweeper.sweep()).await {
                            warn!(error = %e, "Sweep task panicked");
                        }
                    }
                }
            }

            debug!("Sweeper stopped");
        })
    }
}
