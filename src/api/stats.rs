//! KPI endpoints and the shared funnel-spreadsheet store.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{unwrap_list, ApiClient};
use crate::analytics::funnel::PathRow;
use crate::analytics::timeseries::DayPoint;
use crate::Result;

const USERS_COUNT: &str = "/api/admin/stats/users/count";
const USERS_CUMULATIVE: &str = "/api/admin/stats/users/cumulative-timeseries";
const QUESTIONS_CUMULATIVE: &str = "/api/admin/stats/questions/cumulative-timeseries";
const PATH_EXCEL: &str = "/api/admin/stats/path-excel";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCount {
    #[serde(alias = "total_users", alias = "total")]
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeUsersPoint {
    pub day: String,
    #[serde(default)]
    pub new_users: u64,
    #[serde(default)]
    pub cumulative_users: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CumulativeQuestionsPoint {
    pub day: String,
    #[serde(default)]
    pub new_questions: u64,
    #[serde(default)]
    pub cumulative_questions: u64,
}

impl DayPoint for CumulativeUsersPoint {
    fn day(&self) -> &str {
        &self.day
    }
}

impl DayPoint for CumulativeQuestionsPoint {
    fn day(&self) -> &str {
        &self.day
    }
}

impl ApiClient {
    pub async fn user_count(&self) -> Result<UserCount> {
        self.get_json("users_count", USERS_COUNT).await
    }

    pub async fn cumulative_users(&self) -> Result<Vec<CumulativeUsersPoint>> {
        let value: Value = self.get_json("users_cumulative", USERS_CUMULATIVE).await?;
        unwrap_list(value, &["series", "rows", "data"])
    }

    pub async fn cumulative_questions(&self) -> Result<Vec<CumulativeQuestionsPoint>> {
        let value: Value = self
            .get_json("questions_cumulative", QUESTIONS_CUMULATIVE)
            .await?;
        unwrap_list(value, &["series", "rows", "data"])
    }

    /// Funnel rows previously uploaded by any admin.
    pub async fn get_path_rows(&self) -> Result<Vec<PathRow>> {
        let value: Value = self.get_json("path_excel_get", PATH_EXCEL).await?;
        unwrap_list(value, &["rows", "data"])
    }

    /// Replace the shared funnel rows.
    pub async fn put_path_rows(&self, rows: &[PathRow]) -> Result<()> {
        let _: Value = self
            .put_json("path_excel_put", PATH_EXCEL, &json!({ "rows": rows }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.base_url(), Some("t".into()), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn user_count_accepts_aliases() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(USERS_COUNT);
            then.status(200).json_body(json!({"total_users": 42}));
        });

        let count = client(&server).user_count().await.unwrap();
        assert_eq!(count.count, 42);
    }

    #[tokio::test]
    async fn cumulative_users_parses_series() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(USERS_CUMULATIVE);
            then.status(200).json_body(json!({
                "series": [{"day": "2026-02-03", "new_users": 5, "cumulative_users": 12}]
            }));
        });

        let series = client(&server).cumulative_users().await.unwrap();
        assert_eq!(
            series,
            vec![CumulativeUsersPoint {
                day: "2026-02-03".into(),
                new_users: 5,
                cumulative_users: 12,
            }]
        );
    }

    #[tokio::test]
    async fn put_path_rows_wraps_rows() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path(PATH_EXCEL)
                .header("Authorization", "Bearer t")
                .json_body(json!({"rows": [{
                    "step": "1. 세션 시작",
                    "source": "google",
                    "activeUsers": 10,
                    "completionRate": 0.5,
                    "exits": 5,
                    "bounceRate": 0.25
                }]}));
            then.status(200).json_body(json!({"ok": true}));
        });

        let rows = vec![PathRow {
            step: "1. 세션 시작".into(),
            source: "google".into(),
            active_users: 10,
            completion_rate: 0.5,
            exits: 5,
            bounce_rate: 0.25,
        }];
        client(&server).put_path_rows(&rows).await.unwrap();
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn get_path_rows_empty_when_unset() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(PATH_EXCEL);
            then.status(200).json_body(json!({"rows": null}));
        });

        let rows = client(&server).get_path_rows().await.unwrap();
        assert!(rows.is_empty());
    }
}
