// src/config/app.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::providers::table_scrape::TableColumns;
use crate::ingest::scheduler::DeliveryMode;
use crate::notify::discord::{DISCORD_API_BASE, MAX_SEND_ATTEMPTS};
use crate::relevance::RelevanceCfg;

pub const DEFAULT_CONFIG_PATH: &str = "config/wildfire.toml";
pub const ENV_CONFIG_PATH: &str = "WILDFIRE_CONFIG_PATH";

const ENV_TOKEN: &str = "DISCORD_TOKEN";
const ENV_INTERVAL: &str = "CHECK_INTERVAL_SECS";
const ENV_CHANNEL: &str = "ALERT_CHANNEL";
const ENV_METRICS_ADDR: &str = "METRICS_ADDR";
const ENV_HTTP_TIMEOUT: &str = "HTTP_TIMEOUT_SECS";

fn default_interval() -> u64 {
    600
}
fn default_http_timeout() -> u64 {
    20
}
fn default_channel() -> String {
    "fire-alerts".to_string()
}
fn default_api_base() -> String {
    DISCORD_API_BASE.to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotifierKind {
    #[default]
    Discord,
    Log,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rss,
    Table,
    Eonet,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiscordCfg {
    /// Never read from the file; comes from `DISCORD_TOKEN`.
    #[serde(skip)]
    pub token: Option<String>,
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Send attempts per alert. Unset means 1 under at-most-once delivery
    /// (a resend after a lost response would duplicate the post) and 3 otherwise.
    #[serde(default)]
    pub max_retries: Option<u8>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for DiscordCfg {
    fn default() -> Self {
        Self {
            token: None,
            channel: default_channel(),
            max_retries: None,
            api_base: default_api_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SourceCfg {
    pub kind: SourceKind,
    pub name: String,
    /// Id prefix, e.g. "InciWeb" → "InciWeb-<native id>".
    pub prefix: String,
    pub url: String,
    /// Link used when an entry has none; defaults to `url`.
    #[serde(default)]
    pub home_url: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-source override of the global `[relevance]` section.
    #[serde(default)]
    pub relevance: Option<RelevanceCfg>,
    #[serde(default)]
    pub columns: Option<TableColumns>,
}

fn default_sources() -> Vec<SourceCfg> {
    vec![
        SourceCfg {
            kind: SourceKind::Rss,
            name: "InciWeb".into(),
            prefix: "InciWeb".into(),
            url: "https://inciweb.nwcg.gov/feeds/rss/incidents/".into(),
            home_url: Some("https://inciweb.nwcg.gov/".into()),
            enabled: true,
            relevance: None,
            columns: None,
        },
        SourceCfg {
            kind: SourceKind::Eonet,
            name: "NASA EONET".into(),
            prefix: "NASA".into(),
            url: "https://eonet.gsfc.nasa.gov/api/v3/events?category=wildfires&status=open"
                .into(),
            home_url: Some("https://eonet.gsfc.nasa.gov/".into()),
            enabled: true,
            relevance: None,
            columns: None,
        },
    ]
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default = "default_interval")]
    pub check_interval_secs: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub delivery: DeliveryMode,
    #[serde(default)]
    pub notifier: NotifierKind,
    #[serde(default)]
    pub discord: DiscordCfg,
    /// Serve Prometheus metrics on this address when set, e.g. "0.0.0.0:9100".
    #[serde(default)]
    pub metrics_addr: Option<String>,
    #[serde(default)]
    pub relevance: RelevanceCfg,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceCfg>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_interval(),
            http_timeout_secs: default_http_timeout(),
            delivery: DeliveryMode::default(),
            notifier: NotifierKind::default(),
            discord: DiscordCfg::default(),
            metrics_addr: None,
            relevance: RelevanceCfg::default(),
            sources: default_sources(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing wildfire config toml")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Effective per-alert send attempts for the Discord notifier.
    pub fn send_attempts(&self) -> u8 {
        self.discord.max_retries.unwrap_or(match self.delivery {
            DeliveryMode::AtMostOnce => 1,
            DeliveryMode::AtLeastOnce => 3,
        })
    }

    /// Apply overrides from a variable lookup (the process env in production).
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(t) = get(ENV_TOKEN) {
            self.discord.token = Some(t);
        }
        if let Some(v) = get(ENV_INTERVAL) {
            self.check_interval_secs = v
                .parse()
                .map_err(|_| anyhow!("{ENV_INTERVAL} must be a positive integer, got `{v}`"))?;
        }
        if let Some(v) = get(ENV_HTTP_TIMEOUT) {
            self.http_timeout_secs = v
                .parse()
                .map_err(|_| anyhow!("{ENV_HTTP_TIMEOUT} must be a positive integer, got `{v}`"))?;
        }
        if let Some(c) = get(ENV_CHANNEL) {
            self.discord.channel = c;
        }
        if let Some(a) = get(ENV_METRICS_ADDR) {
            self.metrics_addr = Some(a);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval_secs == 0 {
            bail!("check_interval_secs must be > 0");
        }
        if self.http_timeout_secs == 0 {
            bail!("http_timeout_secs must be > 0");
        }
        if self.discord.channel.trim().trim_start_matches('#').is_empty() {
            bail!("discord.channel must not be empty");
        }
        if !(1..=MAX_SEND_ATTEMPTS).contains(&self.send_attempts()) {
            bail!("discord.max_retries must be between 1 and {MAX_SEND_ATTEMPTS}");
        }

        let enabled: Vec<&SourceCfg> = self.sources.iter().filter(|s| s.enabled).collect();
        if enabled.is_empty() {
            bail!("no enabled sources configured");
        }
        let mut prefixes = HashSet::new();
        for s in &enabled {
            if s.url.trim().is_empty() {
                bail!("source `{}` has an empty url", s.name);
            }
            if s.prefix.trim().is_empty() {
                bail!("source `{}` has an empty prefix", s.name);
            }
            if !prefixes.insert(s.prefix.as_str()) {
                bail!("duplicate source prefix `{}`", s.prefix);
            }
            if s.columns.is_some() && s.kind != SourceKind::Table {
                bail!("source `{}`: `columns` only applies to table sources", s.name);
            }
            s.relevance
                .as_ref()
                .unwrap_or(&self.relevance)
                .validate()
                .with_context(|| format!("source `{}`", s.name))?;
        }
        Ok(())
    }
}

/// Load config using env var + fallbacks, then apply env overrides and validate:
/// 1) $WILDFIRE_CONFIG_PATH
/// 2) config/wildfire.toml
/// 3) built-in defaults
pub fn load_default() -> Result<AppConfig> {
    let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
        }
        AppConfig::load_from(&pb)?
    } else {
        let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            AppConfig::load_from(&fallback)?
        } else {
            tracing::info!("no config file found, using built-in defaults");
            AppConfig::default()
        }
    };

    cfg.apply_overrides(|k| std::env::var(k).ok())?;
    cfg.validate()?;
    Ok(cfg)
}
