// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::ingest::types::{Incident, IncidentSource};
use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use std::time::Duration;

pub const USER_AGENT: &str = concat!("wildfire-watch/", env!("CARGO_PKG_VERSION"));

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "wildfire_incidents_fetched_total",
            "Relevant incidents returned by sources."
        );
        describe_counter!(
            "wildfire_source_errors_total",
            "Source fetch/parse errors."
        );
        describe_counter!(
            "wildfire_rows_skipped_total",
            "Upstream rows skipped as malformed."
        );
        describe_counter!(
            "wildfire_dedup_skipped_total",
            "Incidents skipped because their id was already announced."
        );
        describe_counter!("wildfire_alerts_sent_total", "Alerts delivered.");
        describe_counter!(
            "wildfire_alert_failures_total",
            "Alerts that failed to deliver."
        );
        describe_counter!("wildfire_cycles_total", "Completed poll cycles.");
        describe_histogram!("wildfire_parse_ms", "Source parse time in milliseconds.");
        describe_gauge!("wildfire_seen_ids", "Ids held by the dedup store.");
        describe_gauge!(
            "wildfire_last_cycle_ts",
            "Unix ts when the poll loop last completed a cycle."
        );
    });
}

/// Shared HTTP client for source fetches. Every request is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("building source http client")
}

/// GET `url` and return the body, treating non-2xx statuses as errors.
pub(crate) async fn get_text(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()
        .with_context(|| format!("GET {url} non-2xx"))?;
    resp.text().await.context("reading response body")
}

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (also turns NBSP into a plain space)
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"[\s\u{00A0}]+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 500 chars (Discord embed descriptions allow more, titles do not)
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}

/// Record parse timing and output size for one source.
pub(crate) fn record_parse(source: &str, started: std::time::Instant, kept: usize) {
    let ms = started.elapsed().as_secs_f64() * 1_000.0;
    histogram!("wildfire_parse_ms", "source" => source.to_string()).record(ms);
    counter!("wildfire_incidents_fetched_total", "source" => source.to_string())
        .increment(kept as u64);
}

/// Fetch every source concurrently and join the results in registration order.
pub async fn collect_incidents(sources: &[Box<dyn IncidentSource>]) -> Vec<Incident> {
    ensure_metrics_described();

    let batches = futures::future::join_all(sources.iter().map(|s| s.fetch())).await;

    let mut out = Vec::new();
    for (src, mut batch) in sources.iter().zip(batches) {
        tracing::debug!(target: "ingest", source = src.name(), count = batch.len(), "source fetched");
        out.append(&mut batch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_collapses_ws_and_entities() {
        let s = "  Evergreen&nbsp;&nbsp;Fire <b>near</b>\n Mt&nbsp;Hood  ";
        let out = normalize_text(s);
        assert_eq!(out, "Evergreen Fire near Mt Hood");
    }

    #[test]
    fn normalize_text_caps_length() {
        let long = "x".repeat(2_000);
        assert_eq!(normalize_text(&long).chars().count(), 500);
    }

    struct Fixed(&'static str, Vec<&'static str>);

    #[async_trait::async_trait]
    impl IncidentSource for Fixed {
        async fn fetch_latest(&self) -> Result<Vec<Incident>> {
            Ok(self
                .1
                .iter()
                .map(|id| Incident {
                    id: id.to_string(),
                    title: id.to_string(),
                    link: String::new(),
                    source: self.0.to_string(),
                    published_at: None,
                    details: None,
                })
                .collect())
        }
        fn name(&self) -> &str {
            self.0
        }
    }

    #[tokio::test]
    async fn collect_preserves_registration_order() {
        let sources: Vec<Box<dyn IncidentSource>> = vec![
            Box::new(Fixed("A", vec!["A-1", "A-2"])),
            Box::new(Fixed("B", vec!["B-1"])),
        ];
        let ids: Vec<String> = collect_incidents(&sources)
            .await
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["A-1", "A-2", "B-1"]);
    }
}
