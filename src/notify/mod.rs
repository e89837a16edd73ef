// src/notify/mod.rs
pub mod discord;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::config::{AppConfig, NotifierKind};
use crate::ingest::types::Incident;

/// Delivers one incident alert to its destination.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, incident: &Incident) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Human-readable timestamp for alert bodies.
pub fn format_published(ts: Option<u64>) -> Option<String> {
    let secs = i64::try_from(ts?).ok()?;
    DateTime::<Utc>::from_timestamp(secs, 0).map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
}

/// Logs alerts instead of sending them (dry runs, local testing).
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, incident: &Incident) -> Result<()> {
        tracing::info!(
            target: "notify",
            id = %incident.id,
            source = %incident.source,
            link = %incident.link,
            details = incident.details.as_deref().unwrap_or("-"),
            published = format_published(incident.published_at).as_deref().unwrap_or("-"),
            "🔥 wildfire alert: {}",
            incident.title
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Build the configured notifier. Discord verifies its token and resolves the
/// destination channel here, so a bad setup fails before the poll loop starts.
pub async fn from_config(cfg: &AppConfig) -> Result<Arc<dyn Notifier>> {
    match cfg.notifier {
        NotifierKind::Log => Ok(Arc::new(LogNotifier)),
        NotifierKind::Discord => {
            let token = cfg
                .discord
                .token
                .clone()
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("DISCORD_TOKEN is not set"))?;
            let n = discord::DiscordNotifier::connect(
                &cfg.discord.api_base,
                &token,
                &cfg.discord.channel,
                cfg.http_timeout(),
            )
            .await?
            .with_retries(cfg.send_attempts());
            Ok(Arc::new(n))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_formatting() {
        assert_eq!(
            format_published(Some(1_719_853_200)).as_deref(),
            Some("2024-07-01 17:00 UTC")
        );
        assert_eq!(format_published(None), None);
    }

    #[tokio::test]
    async fn log_notifier_never_fails() {
        let inc = Incident {
            id: "InciWeb-1".into(),
            title: "Evergreen Fire near Mt Hood, Oregon".into(),
            link: "https://inciweb.test/1".into(),
            source: "InciWeb".into(),
            published_at: None,
            details: None,
        };
        assert!(LogNotifier.deliver(&inc).await.is_ok());
    }
}
