//! Two-tier storage for funnel rows: the shared remote store is
//! authoritative, a local JSON cache mirrors it for offline use.
//!
//! Read precedence: remote rows if there are any, otherwise the local copy.
//! Writes go to the local cache first, then best-effort to the remote.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::analytics::funnel::{PathRow, SourceFilter};
use crate::api::ApiClient;
use crate::{Error, Result};

/// Cache key for parsed rows (JSON array).
pub const ROWS_KEY: &str = "path_excel_rows.json";
/// Cache key for the selected filter source (plain text).
pub const SOURCE_KEY: &str = "path_selected_source";

/// Remote half of the store.
#[async_trait]
pub trait RemoteRows: Send + Sync {
    async fn fetch_rows(&self) -> Result<Vec<PathRow>>;
    async fn save_rows(&self, rows: &[PathRow]) -> Result<()>;
}

#[async_trait]
impl RemoteRows for ApiClient {
    async fn fetch_rows(&self) -> Result<Vec<PathRow>> {
        self.get_path_rows().await
    }

    async fn save_rows(&self, rows: &[PathRow]) -> Result<()> {
        self.put_path_rows(rows).await
    }
}

/// File-per-key cache under a directory.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageError(format!("read {}: {}", key, e))),
        }
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::StorageError(format!("create {}: {}", self.dir.display(), e)))?;
        fs::write(self.path(key), value)
            .await
            .map_err(|e| Error::StorageError(format!("write {}: {}", key, e)))
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StorageError(format!("remove {}: {}", key, e))),
        }
    }

    pub async fn read_rows(&self) -> Result<Vec<PathRow>> {
        match self.get(ROWS_KEY).await? {
            Some(content) => serde_json::from_str(&content).map_err(Error::from),
            None => Ok(Vec::new()),
        }
    }

    pub async fn write_rows(&self, rows: &[PathRow]) -> Result<()> {
        let content = serde_json::to_string(rows)?;
        self.set(ROWS_KEY, &content).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsOrigin {
    Remote,
    Local,
    /// Neither tier had rows.
    None,
}

#[derive(Debug, Clone)]
pub struct LoadedRows {
    pub rows: Vec<PathRow>,
    pub origin: RowsOrigin,
    /// Set when the remote read failed and the cache answered instead.
    pub remote_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    pub local_saved: bool,
    pub remote_saved: bool,
}

pub struct PathStore<R> {
    remote: R,
    local: LocalCache,
}

impl<R: RemoteRows> PathStore<R> {
    pub fn new(remote: R, local: LocalCache) -> Self {
        Self { remote, local }
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    pub async fn load(&self) -> LoadedRows {
        let remote_error = match self.remote.fetch_rows().await {
            Ok(rows) if !rows.is_empty() => {
                if let Err(e) = self.local.write_rows(&rows).await {
                    warn!(error = %e, "Failed to mirror remote funnel rows locally");
                }
                debug!(rows = rows.len(), "Funnel rows loaded from remote store");
                return LoadedRows {
                    rows,
                    origin: RowsOrigin::Remote,
                    remote_error: None,
                };
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Remote funnel store unavailable, using local cache");
                Some(e.user_message())
            }
        };

        let rows = match self.local.read_rows().await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "Local funnel cache unreadable");
                Vec::new()
            }
        };
        let origin = if rows.is_empty() {
            RowsOrigin::None
        } else {
            RowsOrigin::Local
        };

        LoadedRows {
            rows,
            origin,
            remote_error,
        }
    }

    /// Persist a freshly parsed dataset to both tiers.
    pub async fn save(&self, rows: &[PathRow]) -> SaveOutcome {
        let local_saved = match self.local.write_rows(rows).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to write local funnel cache");
                false
            }
        };
        let remote_saved = match self.remote.save_rows(rows).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to save funnel rows to remote store");
                false
            }
        };
        info!(rows = rows.len(), local_saved, remote_saved, "Funnel rows saved");
        SaveOutcome {
            local_saved,
            remote_saved,
        }
    }

    pub async fn load_filter(&self) -> SourceFilter {
        match self.local.get(SOURCE_KEY).await {
            Ok(value) => SourceFilter::from_selection(value.as_deref()),
            Err(e) => {
                warn!(error = %e, "Failed to read saved source filter");
                SourceFilter::All
            }
        }
    }

    pub async fn save_filter(&self, filter: &SourceFilter) -> Result<()> {
        match filter.selected_source() {
            Some(source) => self.local.set(SOURCE_KEY, source).await,
            None => self.local.remove(SOURCE_KEY).await,
        }
    }
}
