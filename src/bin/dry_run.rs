//! Runs a single poll cycle against the configured sources and logs the alerts
//! that would be sent, without touching Discord.

use std::sync::Arc;

use wildfire_watch::{build_pipeline, config, notify::LogNotifier, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = config::load_default()?;
    let mut pipeline = build_pipeline(&cfg, Some(Arc::new(LogNotifier))).await?;
    let report = pipeline.run_cycle().await;

    println!(
        "dry-run done: fetched={} delivered={} skipped={} failed={}",
        report.fetched, report.delivered, report.skipped, report.failed
    );
    Ok(())
}
