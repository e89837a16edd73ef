//! Wildfire Watch: binary entrypoint.
//! Loads config, connects the notifier, then polls until Ctrl-C / SIGTERM.

use tokio::sync::watch;
use wildfire_watch::{build_pipeline, config, ingest::scheduler::spawn_poll_loop, telemetry};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = ?e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = ?e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    let cfg = config::load_default()?;

    let _metrics = match cfg.metrics_addr.as_deref() {
        Some(addr) => {
            let m = telemetry::Metrics::init()?;
            m.serve(addr).await?;
            Some(m)
        }
        None => None,
    };

    // Fails fast on a bad token or unknown channel.
    let pipeline = build_pipeline(&cfg, None).await?;

    let (tx, rx) = watch::channel(false);
    let poller = spawn_poll_loop(pipeline, cfg.check_interval(), rx);

    shutdown_signal().await;
    tracing::info!("shutdown requested; waiting for the current cycle");
    let _ = tx.send(true);
    poller.await?;

    tracing::info!("bye");
    Ok(())
}
