//! User-behavior endpoints: same-person activity and conversation logs.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{unwrap_list, ApiClient};
use crate::Result;

const SAME_PERSON_ACTIVITY: &str = "/api/admin/stats/behavior/same-person-activity";
const NULL_SAME_PERSON_ROWS: &str = "/api/admin/stats/behavior/null-same-person-rows";
const LATEST_CONVERSATION: &str = "/api/admin/stats/behavior/latest-conversation";
const LOG_BY_ID: &str = "/api/admin/stats/behavior/log-by-id";

/// One anonymized visitor's activity summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPoint {
    pub is_same_person: String,
    #[serde(default, alias = "question_count")]
    pub total_questions: u64,
    #[serde(default, alias = "distinct_hours", alias = "hour_count")]
    pub distinct_hour_appearances: u64,
    #[serde(default, alias = "last_seen", alias = "created_at")]
    pub timestamp: Option<String>,
}

/// Response of the same-person-activity endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamePersonActivity {
    #[serde(default, alias = "rows", alias = "data")]
    pub points: Vec<ActivityPoint>,
    /// Questions asked without a same-person key.
    #[serde(default, alias = "null_count")]
    pub null_same_person_count: u64,
    #[serde(default)]
    pub null_same_person_questions: u64,
}

/// A question logged without an identity key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NullSamePersonRow {
    #[serde(alias = "id")]
    pub log_id: i64,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One stored Q&A exchange.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationLog {
    #[serde(default, alias = "id")]
    pub log_id: Option<i64>,
    #[serde(default)]
    pub is_same_person: Option<String>,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiClient {
    /// Fetch activity points plus the null-identity counters.
    pub async fn same_person_activity(&self) -> Result<SamePersonActivity> {
        self.get_json("same_person_activity", SAME_PERSON_ACTIVITY)
            .await
    }

    /// Questions that carry no same-person key.
    pub async fn null_same_person_rows(&self) -> Result<Vec<NullSamePersonRow>> {
        let value: Value = self
            .get_json("null_same_person_rows", NULL_SAME_PERSON_ROWS)
            .await?;
        unwrap_list(value, &["rows", "data", "items"])
    }

    /// Most recent conversation for one visitor key.
    pub async fn latest_conversation(&self, is_same_person: &str) -> Result<ConversationLog> {
        let request = self
            .request(Method::GET, LATEST_CONVERSATION)
            .query(&[("is_same_person", is_same_person)]);
        let value: Value = self.send_json("latest_conversation", request).await?;
        unwrap_log(value)
    }

    /// A single conversation log by id.
    pub async fn log_by_id(&self, log_id: i64) -> Result<ConversationLog> {
        let request = self
            .request(Method::GET, LOG_BY_ID)
            .query(&[("log_id", log_id)]);
        let value: Value = self.send_json("log_by_id", request).await?;
        unwrap_log(value)
    }
}

/// Logs come back either bare or as `{"log": {...}}`.
fn unwrap_log(value: Value) -> Result<ConversationLog> {
    let inner = match value {
        Value::Object(mut map) if map.contains_key("log") => map.remove("log").unwrap_or_default(),
        other => other,
    };
    serde_json::from_value(inner).map_err(Into::into)
}
