// src/ingest/providers/mod.rs
pub mod eonet;
pub mod inciweb_rss;
pub mod table_scrape;

use anyhow::Result;

use crate::config::{AppConfig, SourceKind};
use crate::ingest::types::IncidentSource;
use crate::relevance::RelevancePolicy;

/// Identity and filter shared by every provider.
#[derive(Debug, Clone)]
pub struct SourceMeta {
    /// Display label, e.g. "InciWeb".
    pub name: String,
    /// Id prefix; must be unique per source.
    pub prefix: String,
    /// Fallback link when an entry carries none.
    pub home_url: String,
    pub policy: RelevancePolicy,
}

impl SourceMeta {
    pub fn new(name: &str, prefix: &str, home_url: &str, policy: RelevancePolicy) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
            home_url: home_url.to_string(),
            policy,
        }
    }
}

/// Where a provider reads its payload from.
pub(crate) enum Mode {
    Fixture(String),
    Http {
        url: String,
        client: reqwest::Client,
    },
}

impl Mode {
    pub(crate) async fn body(&self) -> Result<String> {
        match self {
            Mode::Fixture(s) => Ok(s.clone()),
            Mode::Http { url, client } => crate::ingest::get_text(client, url).await,
        }
    }
}

/// Build the enabled sources from config, in config order.
pub fn from_config(
    cfg: &AppConfig,
    client: &reqwest::Client,
) -> Result<Vec<Box<dyn IncidentSource>>> {
    let mut out: Vec<Box<dyn IncidentSource>> = Vec::new();
    for sc in cfg.sources.iter().filter(|s| s.enabled) {
        let rel_cfg = sc.relevance.as_ref().unwrap_or(&cfg.relevance);
        let policy = RelevancePolicy::from_cfg(rel_cfg)
            .map_err(|e| anyhow::anyhow!("source `{}` relevance: {e:#}", sc.name))?;
        let home = sc.home_url.clone().unwrap_or_else(|| sc.url.clone());
        let meta = SourceMeta::new(&sc.name, &sc.prefix, &home, policy);

        let src: Box<dyn IncidentSource> = match sc.kind {
            SourceKind::Rss => Box::new(inciweb_rss::InciwebRssProvider::from_url(
                meta,
                &sc.url,
                client.clone(),
            )),
            SourceKind::Eonet => Box::new(eonet::EonetProvider::from_url(
                meta,
                &sc.url,
                client.clone(),
            )),
            SourceKind::Table => Box::new(
                table_scrape::TableScrapeProvider::from_url(meta, &sc.url, client.clone())
                    .with_columns(sc.columns.clone().unwrap_or_default()),
            ),
        };
        tracing::info!(target: "ingest", source = %sc.name, kind = ?sc.kind, url = %sc.url, "source registered");
        out.push(src);
    }
    Ok(out)
}
