//! View state for the dashboard sections.
//!
//! Each section carries its own loading/error state so one failed request
//! never hides the others.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::analytics::funnel::{self, PathRow, SourceFilter};
use crate::analytics::grouping::{group_points, GroupedPoint};
use crate::analytics::timeseries::{label_series, Labeled};
use crate::api::{
    ApiClient, ConversationLog, CumulativeQuestionsPoint, CumulativeUsersPoint, NullSamePersonRow,
    SamePersonActivity,
};
use crate::ingest;
use crate::store::{PathStore, RemoteRows, RowsOrigin, SaveOutcome};
use crate::task::{fan_out, CancelToken, MemberResult};
use crate::{Error, Result};

/// One independently loaded block of a page.
#[derive(Debug, Clone, PartialEq)]
pub enum Section<T> {
    Loading,
    /// Loaded fine, nothing to show yet.
    Empty,
    Ready(T),
    Failed(String),
}

impl<T> Default for Section<T> {
    fn default() -> Self {
        Section::Loading
    }
}

impl<T> Section<T> {
    pub fn from_result(result: Result<T>, is_empty: impl FnOnce(&T) -> bool) -> Self {
        match result {
            Ok(value) if is_empty(&value) => Section::Empty,
            Ok(value) => Section::Ready(value),
            Err(e) => {
                warn!(error = %e, "Section failed to load");
                Section::Failed(e.user_message())
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Section::Failed(message) => Some(message),
            _ => None,
        }
    }
}

// ============================================================================
// KPI page
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct KpiOverview {
    pub user_count: Section<u64>,
    pub users: Section<Vec<Labeled<CumulativeUsersPoint>>>,
    pub questions: Section<Vec<Labeled<CumulativeQuestionsPoint>>>,
}

impl KpiOverview {
    /// Issue the three KPI requests concurrently.
    pub async fn fetch(client: &ApiClient) -> Self {
        let (count, users, questions) = tokio::join!(
            client.user_count(),
            client.cumulative_users(),
            client.cumulative_questions(),
        );

        Self {
            user_count: Section::from_result(count.map(|c| c.count), |_| false),
            users: Section::from_result(users.map(|s| label_series(&s)), Vec::is_empty),
            questions: Section::from_result(questions.map(|s| label_series(&s)), Vec::is_empty),
        }
    }

    /// Reload in place unless the token is cancelled by the time data arrives.
    pub async fn refresh(&mut self, client: &ApiClient, token: &CancelToken) -> bool {
        let fresh = Self::fetch(client).await;
        token.commit(self, fresh)
    }
}

// ============================================================================
// Behavior page
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySummary {
    pub groups: Vec<GroupedPoint>,
    pub total_points: usize,
    pub null_same_person_count: u64,
    pub null_same_person_questions: u64,
}

impl From<SamePersonActivity> for ActivitySummary {
    fn from(activity: SamePersonActivity) -> Self {
        Self {
            groups: group_points(&activity.points),
            total_points: activity.points.len(),
            null_same_person_count: activity.null_same_person_count,
            null_same_person_questions: activity.null_same_person_questions,
        }
    }
}

pub type MemberConversation = MemberResult<String, ConversationLog>;

#[derive(Debug, Clone, Default)]
pub struct BehaviorView {
    pub activity: Section<ActivitySummary>,
    pub null_rows: Section<Vec<NullSamePersonRow>>,
    pub selected: Option<usize>,
    pub details: Vec<MemberConversation>,
}

impl BehaviorView {
    pub async fn fetch(client: &ApiClient) -> Self {
        let (activity, null_rows) =
            tokio::join!(client.same_person_activity(), client.null_same_person_rows());

        Self {
            activity: Section::from_result(activity.map(ActivitySummary::from), |s| {
                s.groups.is_empty() && s.null_same_person_count == 0
            }),
            null_rows: Section::from_result(null_rows, Vec::is_empty),
            selected: None,
            details: Vec::new(),
        }
    }

    pub fn group(&self, index: usize) -> Option<&GroupedPoint> {
        self.activity.ready().and_then(|s| s.groups.get(index))
    }

    /// Fetch the latest conversation of every member of group `index`.
    ///
    /// All member requests run (bounded by `limit`) and each yields a result;
    /// nothing is written if `token` was cancelled meanwhile.
    pub async fn select_group(
        &mut self,
        index: usize,
        client: &ApiClient,
        limit: usize,
        token: &CancelToken,
    ) -> Result<()> {
        let members = self
            .group(index)
            .map(|g| g.members.clone())
            .ok_or_else(|| Error::InvalidArgument(format!("No group at index {}", index)))?;

        info!(group = index, members = members.len(), "Fetching group conversations");
        let results = fan_out(members, limit, |id: String| async move {
            client.latest_conversation(&id).await
        })
        .await;

        token.check()?;
        self.selected = Some(index);
        self.details = results;
        Ok(())
    }
}

// ============================================================================
// Funnel page
// ============================================================================

#[derive(Debug, Clone)]
pub struct FunnelView {
    dataset: Arc<Vec<PathRow>>,
    filter: SourceFilter,
    pub origin: RowsOrigin,
    /// Remote read failure shown above the chart.
    pub notice: Option<String>,
    /// Last ingest failure shown next to the upload control.
    pub upload_error: Option<String>,
}

impl Default for FunnelView {
    fn default() -> Self {
        Self {
            dataset: Arc::new(Vec::new()),
            filter: SourceFilter::All,
            origin: RowsOrigin::None,
            notice: None,
            upload_error: None,
        }
    }
}

impl FunnelView {
    pub async fn load<R: RemoteRows>(store: &PathStore<R>) -> Self {
        let (loaded, filter) = tokio::join!(store.load(), store.load_filter());
        Self {
            dataset: Arc::new(loaded.rows),
            filter,
            origin: loaded.origin,
            notice: loaded.remote_error,
            upload_error: None,
        }
    }

    /// Empty view carrying only the saved source filter; the stored rows
    /// are not fetched.
    pub async fn with_saved_filter<R: RemoteRows>(store: &PathStore<R>) -> Self {
        Self {
            filter: store.load_filter().await,
            ..Self::default()
        }
    }

    pub fn dataset(&self) -> &Arc<Vec<PathRow>> {
        &self.dataset
    }

    pub fn filter(&self) -> &SourceFilter {
        &self.filter
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn set_filter(&mut self, filter: SourceFilter) {
        self.filter = filter;
    }

    /// Swap in a whole new dataset.
    pub fn replace_dataset(&mut self, rows: Vec<PathRow>) {
        self.dataset = Arc::new(rows);
    }

    pub fn visible_rows(&self) -> Vec<PathRow> {
        funnel::visible_rows(&self.dataset, &self.filter)
    }

    pub fn sources(&self) -> Vec<String> {
        funnel::sources(&self.dataset)
    }

    /// Parse an uploaded file and, on success, replace the dataset and
    /// persist it. A failed parse leaves the current dataset alone.
    pub async fn ingest_file<R: RemoteRows>(
        &mut self,
        path: &Path,
        store: &PathStore<R>,
    ) -> Result<SaveOutcome> {
        match ingest::read_spreadsheet(path).await {
            Ok(rows) => Ok(self.accept_rows(rows, store).await),
            Err(e) => {
                self.upload_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    pub async fn ingest_bytes<R: RemoteRows>(
        &mut self,
        bytes: &[u8],
        store: &PathStore<R>,
    ) -> Result<SaveOutcome> {
        match ingest::parse_spreadsheet(bytes) {
            Ok(rows) => Ok(self.accept_rows(rows, store).await),
            Err(e) => {
                self.upload_error = Some(e.user_message());
                Err(e)
            }
        }
    }

    async fn accept_rows<R: RemoteRows>(
        &mut self,
        rows: Vec<PathRow>,
        store: &PathStore<R>,
    ) -> SaveOutcome {
        let outcome = store.save(&rows).await;
        self.replace_dataset(rows);
        self.upload_error = None;
        self.origin = if outcome.remote_saved {
            RowsOrigin::Remote
        } else {
            RowsOrigin::Local
        };
        outcome
    }
}
