// src/ingest/providers/table_scrape.rs
//! HTML table scrape: the first `<table>` on the page, one incident per data row.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use metrics::counter;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime, Time,
};

use super::{Mode, SourceMeta};
use crate::ingest::types::{incident_id, Incident, IncidentSource};
use crate::ingest::{normalize_text, record_parse};

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

fn default_name() -> usize {
    0
}
fn default_agency() -> usize {
    1
}
fn default_location() -> usize {
    2
}
fn default_updated() -> usize {
    4
}
fn default_min_columns() -> usize {
    5
}

/// Column layout of the scraped table (0-based cell indices).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TableColumns {
    #[serde(default = "default_name")]
    pub name: usize,
    #[serde(default = "default_agency")]
    pub agency: usize,
    #[serde(default = "default_location")]
    pub location: usize,
    #[serde(default = "default_updated")]
    pub updated: usize,
    /// Rows with fewer cells are skipped.
    #[serde(default = "default_min_columns")]
    pub min_columns: usize,
}

impl Default for TableColumns {
    fn default() -> Self {
        Self {
            name: default_name(),
            agency: default_agency(),
            location: default_location(),
            updated: default_updated(),
            min_columns: default_min_columns(),
        }
    }
}

impl TableColumns {
    /// Smallest row width that still covers every configured column.
    fn required_width(&self) -> usize {
        let widest = self.name.max(self.agency).max(self.location).max(self.updated);
        self.min_columns.max(widest + 1)
    }
}

/// Stable id fragment from an incident name: trimmed, whitespace runs become `_`.
/// Everything else is kept so distinct names never share an id.
pub fn slug_from_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

fn parse_updated(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let ts = if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        dt.unix_timestamp()
    } else if let Ok(dt) =
        PrimitiveDateTime::parse(raw, format_description!("[year]-[month]-[day] [hour]:[minute]"))
    {
        dt.assume_utc().unix_timestamp()
    } else if let Ok(d) = Date::parse(raw, format_description!("[year]-[month]-[day]")) {
        PrimitiveDateTime::new(d, Time::MIDNIGHT).assume_utc().unix_timestamp()
    } else if let Ok(d) = Date::parse(raw, format_description!("[month]/[day]/[year]")) {
        PrimitiveDateTime::new(d, Time::MIDNIGHT).assume_utc().unix_timestamp()
    } else {
        return None;
    };
    u64::try_from(ts).ok()
}

fn cell_text(cell: &ElementRef<'_>) -> String {
    normalize_text(&cell.text().collect::<Vec<_>>().join(" "))
}

pub struct TableScrapeProvider {
    meta: SourceMeta,
    mode: Mode,
    columns: TableColumns,
}

impl TableScrapeProvider {
    pub fn from_fixture(meta: SourceMeta, html: &str) -> Self {
        Self {
            meta,
            mode: Mode::Fixture(html.to_string()),
            columns: TableColumns::default(),
        }
    }

    pub fn from_url(meta: SourceMeta, url: &str, client: reqwest::Client) -> Self {
        Self {
            meta,
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
            columns: TableColumns::default(),
        }
    }

    pub fn with_columns(mut self, columns: TableColumns) -> Self {
        self.columns = columns;
        self
    }

    fn parse_rows_from_str(&self, html: &str) -> Result<Vec<Incident>> {
        let t0 = std::time::Instant::now();
        let doc = Html::parse_document(html);
        let table = doc
            .select(&TABLE)
            .next()
            .ok_or_else(|| anyhow!("no <table> found on page"))?;

        let cols = &self.columns;
        let width = cols.required_width();
        let mut out = Vec::new();
        let mut skipped = 0u64;

        // First row is the header.
        for row in table.select(&ROW).skip(1) {
            let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
            if cells.len() < width {
                skipped += 1;
                continue;
            }
            let texts: Vec<String> = cells.iter().map(cell_text).collect();

            let name = &texts[cols.name];
            let slug = slug_from_name(name);
            if slug.is_empty() {
                skipped += 1;
                continue;
            }
            let agency = &texts[cols.agency];
            let location = &texts[cols.location];

            let core = format!("{name} {agency} {location}");
            if !self.meta.policy.is_relevant(&core) {
                continue;
            }
            // Other cells can only exclude a row, never qualify it.
            let rest: Vec<&str> = texts
                .iter()
                .enumerate()
                .filter(|(i, _)| ![cols.name, cols.agency, cols.location].contains(i))
                .map(|(_, t)| t.as_str())
                .collect();
            if self.meta.policy.excludes(&rest.join(" ")) {
                continue;
            }

            let link = cells[cols.name]
                .select(&ANCHOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|h| h.trim().to_string())
                .filter(|h| h.starts_with("http"))
                .unwrap_or_else(|| self.meta.home_url.clone());

            let details: Vec<&str> = [agency.as_str(), location.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect();

            out.push(Incident {
                id: incident_id(&self.meta.prefix, &slug),
                title: name.clone(),
                link,
                source: self.meta.name.clone(),
                published_at: parse_updated(&texts[cols.updated]),
                details: (!details.is_empty()).then(|| details.join(" · ")),
            });
        }

        if skipped > 0 {
            tracing::debug!(
                target: "ingest",
                source = %self.meta.name,
                skipped,
                "malformed rows skipped"
            );
            counter!("wildfire_rows_skipped_total", "source" => self.meta.name.clone())
                .increment(skipped);
        }
        record_parse(&self.meta.name, t0, out.len());
        Ok(out)
    }
}

#[async_trait]
impl IncidentSource for TableScrapeProvider {
    async fn fetch_latest(&self) -> Result<Vec<Incident>> {
        let body = self.mode.body().await?;
        self.parse_rows_from_str(&body)
    }

    fn name(&self) -> &str {
        &self.meta.name
    }
}
