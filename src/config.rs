//! Configuration for the admin API, the bot process and the local cache
//!
//! Loads configuration from config.yml file

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Default constants (fallback if config.yml not found)
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_BOT_URL: &str = "http://localhost:8100";
pub const DEFAULT_CACHE_DIR: &str = ".qa_admin";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_COMMENTS_LIMIT: usize = 20;
pub const DEFAULT_FANOUT_LIMIT: usize = 8;

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    api: Option<ApiSection>,
    bot: Option<BotSection>,
    cache: Option<CacheSection>,
    behavior: Option<BehaviorSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSection {
    base_url: Option<String>,
    token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_or_number")]
    timeout_secs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BotSection {
    base_url: Option<String>,
    comments_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSection {
    dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BehaviorSection {
    fanout_limit: Option<usize>,
}

/// Deserialize a value that can be either a string or a number
fn deserialize_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected string or number, got {:?}",
            other
        ))),
    }
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub bot_base_url: String,
    pub token: Option<String>,
    pub cache_dir: PathBuf,
    pub timeout_secs: u64,
    pub comments_limit: usize,
    pub fanout_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or use defaults
    /// Environment variables take precedence over config.yml string values
    pub fn new() -> Self {
        Self::load_from_file("config.yml")
            .or_else(|_| Self::load_from_file("../config.yml"))
            .unwrap_or_else(|_| Self::from_yaml(YamlConfig::default()))
    }

    /// Resolve a value: prefer env var if config value looks like ${VAR}
    fn resolve_env_string(value: Option<String>, env_key: &str) -> Option<String> {
        if let Some(ref v) = value {
            if let Some(var_name) = v.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
                if let Ok(env_val) = std::env::var(var_name) {
                    return Some(env_val);
                }
            }
        }
        if let Ok(env_val) = std::env::var(env_key) {
            return Some(env_val);
        }
        value.filter(|v| !(v.starts_with("${") && v.ends_with('}')))
    }

    /// Resolve a numeric value; literal YAML numbers win over the environment
    fn resolve_env_u64(value: Option<String>, env_key: &str) -> Option<u64> {
        if let Some(ref v) = value {
            if let Some(var_name) = v.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
                if let Some(parsed) = std::env::var(var_name).ok().and_then(|s| s.parse().ok()) {
                    return Some(parsed);
                }
            }
            if let Ok(parsed) = v.parse::<u64>() {
                return Some(parsed);
            }
        }
        std::env::var(env_key).ok().and_then(|s| s.parse().ok())
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_dotenv();

        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::InvalidArgument(format!("Failed to read config file: {}", e)))?;

        let yaml: YamlConfig = serde_yaml::from_str(&content)
            .map_err(|e| Error::InvalidArgument(format!("Failed to parse config file: {}", e)))?;

        Ok(Self::from_yaml(yaml))
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let api = yaml.api.unwrap_or_default();
        let bot = yaml.bot.unwrap_or_default();
        let cache = yaml.cache.unwrap_or_default();
        let behavior = yaml.behavior.unwrap_or_default();

        let api_base_url = Self::resolve_env_string(api.base_url, "QA_ADMIN_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let bot_base_url = Self::resolve_env_string(bot.base_url, "QA_ADMIN_BOT_URL")
            .unwrap_or_else(|| DEFAULT_BOT_URL.to_string());
        let token = Self::resolve_env_string(api.token, "QA_ADMIN_TOKEN").filter(|t| !t.is_empty());
        let cache_dir = Self::resolve_env_string(cache.dir, "QA_ADMIN_CACHE_DIR")
            .unwrap_or_else(|| DEFAULT_CACHE_DIR.to_string());

        Self {
            api_base_url: trim_base_url(&api_base_url),
            bot_base_url: trim_base_url(&bot_base_url),
            token,
            cache_dir: PathBuf::from(cache_dir),
            timeout_secs: Self::resolve_env_u64(api.timeout_secs, "QA_ADMIN_TIMEOUT")
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            comments_limit: bot.comments_limit.unwrap_or(DEFAULT_COMMENTS_LIMIT),
            fanout_limit: behavior.fanout_limit.unwrap_or(DEFAULT_FANOUT_LIMIT).max(1),
        }
    }

    /// Request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
