// src/ingest/providers/inciweb_rss.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use super::{Mode, SourceMeta};
use crate::ingest::types::{incident_id, Incident, IncidentSource};
use crate::ingest::{normalize_text, record_parse};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

// <guid isPermaLink="false">…</guid>; the attribute is ignored.
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text", default)]
    value: String,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<u64> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
        .and_then(|x| u64::try_from(x).ok())
}

/// RSS incident feed (InciWeb publishes one item per active incident).
pub struct InciwebRssProvider {
    meta: SourceMeta,
    mode: Mode,
}

impl InciwebRssProvider {
    pub fn from_fixture(meta: SourceMeta, content: &str) -> Self {
        Self {
            meta,
            mode: Mode::Fixture(content.to_string()),
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

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<Incident>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let rss: Rss = from_str(&xml_clean).context("parsing incident rss xml")?;

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            if title.is_empty() || !self.meta.policy.is_relevant(&title) {
                continue;
            }

            let link = it
                .link
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            let native = it
                .guid
                .map(|g| g.value.trim().to_string())
                .filter(|g| !g.is_empty())
                .or_else(|| link.clone())
                .unwrap_or_else(|| title.clone());

            out.push(Incident {
                id: incident_id(&self.meta.prefix, &native),
                title,
                link: link.unwrap_or_else(|| self.meta.home_url.clone()),
                source: self.meta.name.clone(),
                published_at: it.pub_date.as_deref().and_then(parse_rfc2822_to_unix),
                details: None,
            });
        }

        record_parse(&self.meta.name, t0, out.len());
        Ok(out)
    }
}

#[async_trait]
impl IncidentSource for InciwebRssProvider {
    async fn fetch_latest(&self) -> Result<Vec<Incident>> {
        let body = self.mode.body().await?;
        self.parse_items_from_str(&body)
    }

    fn name(&self) -> &str {
        &self.meta.name
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
