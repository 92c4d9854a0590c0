//! REST clients for the admin API and the auto-reply bot process.
//!
//! Every admin call goes through [`ApiClient`], which attaches the bearer
//! token and turns non-2xx responses into [`Error::Api`] with the message the
//! server put in the body.

pub mod behavior;
pub mod bot;
pub mod documents;
pub mod stats;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::metrics;
use crate::{Error, Result};

pub use behavior::{ActivityPoint, ConversationLog, NullSamePersonRow, SamePersonActivity};
pub use bot::{BotClient, BotComment, BotConfig, BotStatus};
pub use documents::{Document, DocumentPatch, UploadStats};
pub use stats::{CumulativeQuestionsPoint, CumulativeUsersPoint, UserCount};

/// Authenticated client for `/api/admin/...` endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client for `base_url` with an optional bearer token.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("qa_admin/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Create from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.api_base_url, config.token.clone(), config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }

    pub(crate) fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.authorize(self.http.request(method, self.url(path)))
    }

    /// Send a prepared request and decode a JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(endpoint, request).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(Error::from)
    }

    /// Send a prepared request and return the checked response.
    pub(crate) async fn send(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<Response> {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_api_request(endpoint, "transport_error");
                return Err(Error::from(e));
            }
        };
        let status = response.status();
        metrics::record_api_request(endpoint, status.as_str());
        debug!(endpoint, status = %status, "admin api response");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
    ) -> Result<T> {
        self.send_json(endpoint, self.request(reqwest::Method::GET, path))
            .await
    }

    pub(crate) async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        path: &str,
        body: &B,
    ) -> Result<T> {
        self.send_json(endpoint, self.request(reqwest::Method::PUT, path).json(body))
            .await
    }
}

/// Map a failed response into an [`Error`], pulling the server message out of
/// the body when there is one.
pub(crate) fn status_error(status: StatusCode, body: &str) -> Error {
    let message = extract_message(body).unwrap_or_default();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::AuthorizationRequired(message),
        _ => Error::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull a human message out of an error body.
///
/// Understands `{"detail": "..."}`, `{"message": "..."}`, `{"error": "..."}`
/// and FastAPI validation arrays (`{"detail": [{"msg": "..."}]}`). Plain text
/// bodies are used as-is when short.
pub fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return (trimmed.chars().count() <= 200 && !trimmed.starts_with('<'))
            .then(|| trimmed.to_string());
    };

    ["detail", "message", "error"]
        .iter()
        .filter_map(|key| value.get(key))
        .find_map(message_from_value)
}

fn message_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(_) => item.get("msg").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(_) => value
            .get("message")
            .or_else(|| value.get("msg"))
            .and_then(message_from_value),
        _ => None,
    }
}

/// Accept either a bare JSON array or an object wrapping one under a
/// well-known key.
pub(crate) fn unwrap_list<T: DeserializeOwned>(value: Value, keys: &[&str]) -> Result<Vec<T>> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => keys
            .iter()
            .find_map(|key| map.remove(*key))
            .filter(|v| !v.is_null())
            .unwrap_or(Value::Array(Vec::new())),
        Value::Null => Value::Array(Vec::new()),
        other => {
            return Err(Error::SerializationError(format!(
                "expected a list, got {}",
                other
            )))
        }
    };
    serde_json::from_value(list).map_err(Error::from)
}
