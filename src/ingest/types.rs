// src/ingest/types.rs
use anyhow::Result;
use metrics::counter;

/// One normalized incident, rebuilt from upstream data on every cycle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Incident {
    pub id: String,     // "<PREFIX>-<native id>", e.g. "InciWeb-12345"
    pub title: String,  // normalized text
    pub link: String,   // per-incident URL or the source's generic URL
    pub source: String, // e.g., "InciWeb", "NASA EONET"
    pub published_at: Option<u64>, // unix seconds, when upstream provides one
    pub details: Option<String>,
}

/// Build an incident id from a source prefix and the upstream identifier.
pub fn incident_id(prefix: &str, native_id: &str) -> String {
    format!("{prefix}-{}", native_id.trim())
}

#[async_trait::async_trait]
pub trait IncidentSource: Send + Sync {
    /// Fetch and parse the upstream data, returning only relevant incidents.
    async fn fetch_latest(&self) -> Result<Vec<Incident>>;

    fn name(&self) -> &str;

    /// Guarded fetch: a failing source yields nothing for this cycle.
    async fn fetch(&self) -> Vec<Incident> {
        match self.fetch_latest().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, source = self.name(), "source fetch failed");
                counter!("wildfire_source_errors_total", "source" => self.name().to_string())
                    .increment(1);
                Vec::new()
            }
        }
    }
}
