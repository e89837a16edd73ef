// src/ingest/scheduler.rs
use futures::FutureExt;
use metrics::{counter, gauge};
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::dedup::DedupStore;
use crate::ingest::types::IncidentSource;
use crate::ingest::{collect_incidents, ensure_metrics_described};
use crate::notify::Notifier;

/// When an id enters the dedup store relative to its delivery.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Mark before sending; a failed send is dropped, never retried.
    #[default]
    AtMostOnce,
    /// Mark only after a successful send; failures are retried next cycle.
    AtLeastOnce,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub skipped: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Everything one poll loop needs. The loop owns the store.
pub struct Pipeline<S: DedupStore> {
    pub sources: Vec<Box<dyn IncidentSource>>,
    pub notifier: std::sync::Arc<dyn Notifier>,
    pub store: S,
    pub mode: DeliveryMode,
}

impl<S: DedupStore> Pipeline<S> {
    pub fn new(
        sources: Vec<Box<dyn IncidentSource>>,
        notifier: std::sync::Arc<dyn Notifier>,
        store: S,
    ) -> Self {
        Self {
            sources,
            notifier,
            store,
            mode: DeliveryMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: DeliveryMode) -> Self {
        self.mode = mode;
        self
    }

    /// One fetch → dedupe → deliver pass.
    pub async fn run_cycle(&mut self) -> CycleReport {
        ensure_metrics_described();
        let incidents = collect_incidents(&self.sources).await;

        let mut report = CycleReport {
            fetched: incidents.len(),
            ..CycleReport::default()
        };

        // One incident at a time, so repeated ids inside a cycle are sent once.
        for inc in &incidents {
            if self.store.contains(&inc.id) {
                report.skipped += 1;
                continue;
            }
            if self.mode == DeliveryMode::AtMostOnce {
                self.store.mark_seen(&inc.id);
            }

            match self.notifier.deliver(inc).await {
                Ok(()) => {
                    if self.mode == DeliveryMode::AtLeastOnce {
                        self.store.mark_seen(&inc.id);
                    }
                    report.delivered += 1;
                    tracing::info!(target: "ingest", id = %inc.id, source = %inc.source, "alert sent");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        target: "ingest",
                        error = ?e,
                        id = %inc.id,
                        notifier = self.notifier.name(),
                        "alert delivery failed"
                    );
                }
            }
        }

        counter!("wildfire_dedup_skipped_total").increment(report.skipped as u64);
        counter!("wildfire_alerts_sent_total").increment(report.delivered as u64);
        counter!("wildfire_alert_failures_total").increment(report.failed as u64);
        counter!("wildfire_cycles_total").increment(1);
        gauge!("wildfire_seen_ids").set(self.store.len() as f64);
        gauge!("wildfire_last_cycle_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

        report
    }

    /// Poll until `shutdown` flips to true (or its sender is dropped).
    /// The first cycle runs immediately; a cycle in progress always completes.
    pub async fn run_until_shutdown(
        mut self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match AssertUnwindSafe(self.run_cycle()).catch_unwind().await {
                Ok(r) => tracing::info!(
                    target: "ingest",
                    fetched = r.fetched,
                    skipped = r.skipped,
                    delivered = r.delivered,
                    failed = r.failed,
                    seen = self.store.len(),
                    "poll cycle finished"
                ),
                Err(_) => tracing::error!(target: "ingest", "poll cycle panicked; continuing"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(target: "ingest", "poll loop stopped");
    }
}

/// Spawn the poll loop on the runtime.
pub fn spawn_poll_loop<S: DedupStore + 'static>(
    pipeline: Pipeline<S>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(pipeline.run_until_shutdown(interval, shutdown))
}
