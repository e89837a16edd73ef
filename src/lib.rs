// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod dedup;
pub mod ingest;
pub mod notify;
pub mod relevance;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::dedup::{DedupStore, MemoryDedupStore};
pub use crate::ingest::scheduler::{CycleReport, DeliveryMode, Pipeline};
pub use crate::ingest::types::{Incident, IncidentSource};
pub use crate::notify::Notifier;
pub use crate::relevance::RelevancePolicy;

use std::sync::Arc;
use tracing::info;

/// Build sources, notifier and an empty dedup store from config.
/// Notifier setup failures (bad token, unknown channel) surface here.
pub async fn build_pipeline(
    cfg: &config::AppConfig,
    notifier: Option<Arc<dyn Notifier>>,
) -> anyhow::Result<Pipeline<MemoryDedupStore>> {
    let client = ingest::http_client(cfg.http_timeout())?;
    let sources = ingest::providers::from_config(cfg, &client)?;
    let notifier = match notifier {
        Some(n) => n,
        None => notify::from_config(cfg).await?,
    };
    info!(
        sources = sources.len(),
        notifier = notifier.name(),
        delivery = ?cfg.delivery,
        interval_secs = cfg.check_interval_secs,
        "pipeline ready"
    );
    Ok(Pipeline::new(sources, notifier, MemoryDedupStore::new()).with_mode(cfg.delivery))
}
