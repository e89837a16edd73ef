// src/notify/discord.rs
//! Discord bot notifier (REST API, bot token). The channel is resolved by name once.

use anyhow::{anyhow, bail, Context, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{format_published, Notifier};
use crate::ingest::types::Incident;

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const EMBED_COLOR: u32 = 0xFF4500;
/// Upper bound on send attempts per alert; keeps backoff under ~8 s in total.
pub const MAX_SEND_ATTEMPTS: u8 = 5;

// Guild text and announcement channels.
const TEXT_CHANNEL_TYPES: [u8; 2] = [0, 5];

#[derive(Debug, Deserialize)]
struct CurrentUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Guild {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    kind: u8,
}

#[derive(Clone)]
pub struct DiscordNotifier {
    client: Client,
    api_base: String,
    auth: String,
    channel_id: String,
    max_retries: u8,
}

impl DiscordNotifier {
    /// Verify the token and resolve `channel_name` across the bot's guilds.
    pub async fn connect(
        api_base: &str,
        token: &str,
        channel_name: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(crate::ingest::USER_AGENT)
            .build()
            .context("building discord http client")?;
        let mut this = Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            auth: format!("Bot {}", token.trim()),
            channel_id: String::new(),
            max_retries: 1,
        };

        let me: CurrentUser = this.get_json("/users/@me").await?;
        tracing::info!(target: "notify", user = %me.username, "discord bot authenticated");

        this.channel_id = this.resolve_channel(channel_name).await?;
        tracing::info!(
            target: "notify",
            channel = channel_name,
            channel_id = %this.channel_id,
            "alert channel resolved"
        );
        Ok(this)
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.clamp(1, MAX_SEND_ATTEMPTS);
        self
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.api_base, path);
        let resp = self
            .client
            .get(&url)
            .header("Authorization", &self.auth)
            .send()
            .await
            .with_context(|| format!("discord GET {path}"))?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            bail!("discord rejected the bot token");
        }
        let resp = resp
            .error_for_status()
            .with_context(|| format!("discord GET {path} non-2xx"))?;
        resp.json::<T>()
            .await
            .with_context(|| format!("discord GET {path} body"))
    }

    async fn resolve_channel(&self, channel_name: &str) -> Result<String> {
        let wanted = channel_name.trim().trim_start_matches('#');
        let guilds: Vec<Guild> = self.get_json("/users/@me/guilds").await?;
        for g in &guilds {
            let channels: Vec<Channel> = self
                .get_json(&format!("/guilds/{}/channels", g.id))
                .await?;
            let hit = channels.into_iter().find(|c| {
                TEXT_CHANNEL_TYPES.contains(&c.kind)
                    && c.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(wanted))
            });
            if let Some(c) = hit {
                tracing::debug!(target: "notify", guild = %g.name, "channel found");
                return Ok(c.id);
            }
        }
        Err(anyhow!(
            "channel `{wanted}` not found in {} guild(s) visible to the bot",
            guilds.len()
        ))
    }

    async fn post_message(&self, payload: &MessagePayload) -> Result<()> {
        let url = format!("{}/channels/{}/messages", self.api_base, self.channel_id);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .header("Authorization", &self.auth)
                .json(payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) => match rsp.error_for_status() {
                    Ok(_) => return Ok(()),
                    Err(e) => anyhow!("Discord HTTP error: {e}"),
                },
                Err(e) => anyhow!("Discord request failed: {e}"),
            };
            if attempt >= self.max_retries {
                return Err(err);
            }
            tracing::debug!(
                target: "notify",
                attempt,
                error = %err,
                "discord post failed, retrying"
            );
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, incident: &Incident) -> Result<()> {
        let payload = MessagePayload::embed(DiscordEmbed::for_incident(incident));
        self.post_message(&payload).await
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DiscordEmbed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
}

impl DiscordEmbed {
    pub fn for_incident(incident: &Incident) -> Self {
        let field = |name: &str, value: &str| EmbedField {
            name: name.to_string(),
            value: value.to_string(),
            inline: false,
        };
        let mut fields = vec![field("Source", &incident.source)];
        if let Some(d) = incident.details.as_deref() {
            fields.push(field("Details", d));
        }
        fields.push(field("More Info", &incident.link));

        Self {
            title: "🔥 Wildfire Alert".to_string(),
            description: incident.title.clone(),
            color: EMBED_COLOR,
            fields,
            footer: format_published(incident.published_at).map(|t| EmbedFooter {
                text: format!("Reported {t}"),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagePayload {
    embeds: Vec<DiscordEmbed>,
}

impl MessagePayload {
    fn embed(embed: DiscordEmbed) -> Self {
        Self {
            embeds: vec![embed],
        }
    }
}
