//! Document management endpoints.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::{unwrap_list, ApiClient};
use crate::{Error, Result};

const DOCUMENTS: &str = "/api/admin/documents";
const DOCUMENTS_UPLOAD: &str = "/api/admin/documents/upload";

/// A stored document as listed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(alias = "document_id")]
    pub id: Value,
    #[serde(default, alias = "filename", alias = "name")]
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, alias = "chunk_count")]
    pub chunks: Option<u64>,
    #[serde(default, alias = "uploaded_at")]
    pub created_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Document {
    /// The id rendered for paths and tables.
    pub fn id_string(&self) -> String {
        match &self.id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Fields an admin may change on a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.category.is_none() && self.enabled.is_none()
    }
}

/// Processing stats returned after an upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadStats {
    #[serde(default, alias = "filename")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub pages: Option<u64>,
    #[serde(default, alias = "chunk_count")]
    pub chunks: Option<u64>,
    #[serde(default, alias = "elapsed", alias = "elapsed_sec")]
    pub elapsed_seconds: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiClient {
    /// Upload a file as multipart field `file`.
    pub async fn upload_document(&self, path: &Path) -> Result<UploadStats> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::InvalidArgument(format!("Invalid file path: {}", path.display())))?
            .to_string();
        let data = tokio::fs::read(path).await?;
        let size = data.len();

        let part = Part::bytes(data).file_name(file_name.clone());
        let form = Form::new().part("file", part);
        let request = self.request(Method::POST, DOCUMENTS_UPLOAD).multipart(form);

        let stats: UploadStats = self.send_json("documents_upload", request).await?;
        info!(file = %file_name, bytes = size, chunks = ?stats.chunks, "Document uploaded");
        Ok(stats)
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let value: Value = self.get_json("documents_list", DOCUMENTS).await?;
        unwrap_list(value, &["documents", "items", "data", "rows"])
    }

    pub async fn update_document(&self, id: &str, patch: &DocumentPatch) -> Result<Value> {
        if patch.is_empty() {
            return Err(Error::InvalidArgument(
                "Nothing to update: set at least one field".to_string(),
            ));
        }
        self.put_json("documents_update", &document_path(id), patch)
            .await
    }

    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let request = self.request(Method::DELETE, &document_path(id));
        self.send("documents_delete", request).await?;
        info!(id, "Document deleted");
        Ok(())
    }
}

fn document_path(id: &str) -> String {
    format!("{}/{}", DOCUMENTS, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn client(server: &MockServer) -> ApiClient {
        ApiClient::new(&server.base_url(), Some("t".into()), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn upload_sends_multipart_file() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path(DOCUMENTS_UPLOAD)
                .header("Authorization", "Bearer t")
                .body_includes("filename=\"guide.txt\"")
                .body_includes("hello docs");
            then.status(200)
                .json_body(json!({"filename": "guide.txt", "pages": 1, "chunk_count": 4, "elapsed": 0.8}));
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guide.txt");
        std::fs::write(&path, "hello docs").unwrap();

        let stats = client(&server).upload_document(&path).await.unwrap();
        assert_eq!(stats.file_name.as_deref(), Some("guide.txt"));
        assert_eq!(stats.chunks, Some(4));
        assert_eq!(stats.elapsed_seconds, Some(0.8));
        mock.assert_calls(1);
    }

    #[tokio::test]
    async fn upload_missing_file_is_io_error() {
        let server = MockServer::start_async().await;
        let err = client(&server)
            .upload_document(Path::new("/nonexistent/qa_admin/file.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }

    #[tokio::test]
    async fn list_documents_accepts_numeric_ids() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path(DOCUMENTS);
            then.status(200).json_body(json!({"documents": [
                {"id": 7, "filename": "a.pdf", "status": "ready", "chunk_count": 12},
                {"document_id": "x-1", "title": "b.docx"}
            ]}));
        });

        let docs = client(&server).list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id_string(), "7");
        assert_eq!(docs[0].title, "a.pdf");
        assert_eq!(docs[1].id_string(), "x-1");
    }

    #[tokio::test]
    async fn update_rejects_empty_patch() {
        let server = MockServer::start_async().await;
        let err = client(&server)
            .update_document("1", &DocumentPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn delete_hits_document_path() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(DELETE).path("/api/admin/documents/42");
            then.status(204);
        });

        client(&server).delete_document("42").await.unwrap();
        mock.assert_calls(1);
    }
}
