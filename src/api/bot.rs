//! Control client for the external auto-reply bot process.
//!
//! The bot runs on its own host; this side only starts/stops it, pushes
//! config, and reads back what it reports.

use chrono::DateTime;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::{unwrap_list, ApiClient};
use crate::config::Config;
use crate::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotStatus {
    #[serde(default, alias = "is_running")]
    pub running: bool,
    #[serde(default, deserialize_with = "deserialize_started_at")]
    pub started_at: Option<String>,
    #[serde(default, alias = "processed_count", alias = "replied")]
    pub processed: Option<u64>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub config: Option<BotConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Bot settings pushed through `/config`. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replies: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotComment {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "comment", alias = "content")]
    pub text: String,
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BotClient {
    api: ApiClient,
}

impl BotClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api = ApiClient::new(&config.bot_base_url, config.token.clone(), config.timeout())?;
        Ok(Self::new(api))
    }

    pub async fn status(&self) -> Result<BotStatus> {
        self.api.get_json("bot_status", "/status").await
    }

    /// Most recent comments the bot has seen, newest first.
    pub async fn comments(&self, limit: usize) -> Result<Vec<BotComment>> {
        let request = self
            .api
            .request(Method::GET, "/comments")
            .query(&[("limit", limit)]);
        let value: Value = self.api.send_json("bot_comments", request).await?;
        unwrap_list(value, &["comments", "items", "data"])
    }

    pub async fn start(&self) -> Result<BotStatus> {
        info!("Starting auto-reply bot");
        self.post_for_status("bot_start", "/start").await
    }

    pub async fn stop(&self) -> Result<BotStatus> {
        info!("Stopping auto-reply bot");
        self.post_for_status("bot_stop", "/stop").await
    }

    pub async fn set_config(&self, config: &BotConfig) -> Result<BotStatus> {
        let request = self.api.request(Method::POST, "/config").json(config);
        let value: Value = self.api.send_json("bot_config", request).await?;
        self.reported_status(value).await
    }

    async fn post_for_status(&self, endpoint: &'static str, path: &str) -> Result<BotStatus> {
        let request = self.api.request(Method::POST, path);
        let value: Value = self.api.send_json(endpoint, request).await?;
        self.reported_status(value).await
    }

    /// A bare ack says nothing about state, so ask the bot for it.
    async fn reported_status(&self, value: Value) -> Result<BotStatus> {
        match status_from(value)? {
            Some(status) => Ok(status),
            None => self.status().await,
        }
    }
}

/// Control endpoints reply with a status object, possibly nested under
/// `status`, or a bare ack (`None`).
fn status_from(value: Value) -> Result<Option<BotStatus>> {
    let inner = match value {
        Value::Object(mut map) if map.get("status").is_some_and(Value::is_object) => {
            map.remove("status").unwrap_or_default()
        }
        Value::Object(map) if map.contains_key("running") || map.contains_key("is_running") => {
            Value::Object(map)
        }
        _ => return Ok(None),
    };
    Ok(Some(serde_json::from_value(inner)?))
}

/// `started_at` arrives as text or as epoch seconds.
fn deserialize_started_at<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(
            n.as_i64()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| n.to_string()),
        )),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number for started_at, got {}",
            other
        ))),
    }
}
