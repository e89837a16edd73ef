// src/ingest/providers/eonet.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::{Mode, SourceMeta};
use crate::ingest::types::{incident_id, Incident, IncidentSource};
use crate::ingest::{normalize_text, record_parse};

#[derive(Debug, Deserialize)]
struct EventsResponse {
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    sources: Vec<EventSource>,
    #[serde(default)]
    geometry: Vec<Geometry>,
}

#[derive(Debug, Deserialize)]
struct EventSource {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(default)]
    date: Option<String>,
}

fn latest_geometry_ts(geometry: &[Geometry]) -> Option<u64> {
    geometry
        .iter()
        .filter_map(|g| g.date.as_deref())
        .filter_map(|d| OffsetDateTime::parse(d, &Rfc3339).ok())
        .map(|dt| dt.unix_timestamp())
        .max()
        .and_then(|x| u64::try_from(x).ok())
}

/// NASA EONET open-wildfire events (`/api/v3/events?category=wildfires&status=open`).
pub struct EonetProvider {
    meta: SourceMeta,
    mode: Mode,
}

impl EonetProvider {
    pub fn from_fixture(meta: SourceMeta, json: &str) -> Self {
        Self {
            meta,
            mode: Mode::Fixture(json.to_string()),
        }
    }

    pub fn from_url(meta: SourceMeta, url: &str, client: reqwest::Client) -> Self {
        Self {
            meta,
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        }
    }

    fn parse_events_from_str(&self, s: &str) -> Result<Vec<Incident>> {
        let t0 = std::time::Instant::now();
        let resp: EventsResponse = serde_json::from_str(s).context("parsing eonet events json")?;

        let mut out = Vec::new();
        for ev in resp.events {
            let title = normalize_text(&ev.title);
            if ev.id.trim().is_empty() || !self.meta.policy.is_relevant(&title) {
                continue;
            }
            let link = ev
                .link
                .filter(|l| !l.trim().is_empty())
                .or_else(|| ev.sources.iter().find_map(|s| s.url.clone()))
                .unwrap_or_else(|| self.meta.home_url.clone());

            out.push(Incident {
                id: incident_id(&self.meta.prefix, &ev.id),
                title,
                link,
                source: self.meta.name.clone(),
                published_at: latest_geometry_ts(&ev.geometry),
                details: None,
            });
        }

        record_parse(&self.meta.name, t0, out.len());
        Ok(out)
    }
}

#[async_trait]
impl IncidentSource for EonetProvider {
    async fn fetch_latest(&self) -> Result<Vec<Incident>> {
        let body = self.mode.body().await?;
        self.parse_events_from_str(&body)
    }

    fn name(&self) -> &str {
        &self.meta.name
    }
}
