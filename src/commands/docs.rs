//! Document management for the QA knowledge base.

use std::path::PathBuf;

use anyhow::Result;

use super::{or_dash, print_structured, truncate, OutputFormat};
use crate::api::{ApiClient, DocumentPatch};
use crate::config::Config;
use crate::task::fan_out;

/// Upload one or more files; each file reports on its own.
pub async fn upload(config: &Config, paths: Vec<PathBuf>) -> Result<()> {
    if paths.is_empty() {
        anyhow::bail!("No files given");
    }
    let client = ApiClient::from_config(config)?;
    let results = fan_out(paths, config.fanout_limit, |path: PathBuf| {
        let client = &client;
        async move { client.upload_document(&path).await }
    })
    .await;

    let mut failed = 0usize;
    for result in &results {
        match &result.outcome {
            Ok(stats) => {
                let pages = stats.pages.map(|p| p.to_string());
                let chunks = stats.chunks.map(|c| c.to_string());
                let elapsed = stats.elapsed_seconds.map(|s| format!("{:.1}s", s));
                println!(
                    "✅ {} | 페이지 {} | 청크 {} | {}",
                    result.key.display(),
                    or_dash(pages.as_deref()),
                    or_dash(chunks.as_deref()),
                    or_dash(elapsed.as_deref())
                );
            }
            Err(message) => {
                failed += 1;
                println!("❌ {} | {}", result.key.display(), message);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} uploads failed", failed, results.len());
    }
    Ok(())
}

pub async fn list(config: &Config, format: OutputFormat) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    let documents = client.list_documents().await?;

    if format != OutputFormat::Table {
        print_structured(format, &documents)?;
        return Ok(());
    }

    if documents.is_empty() {
        println!("등록된 문서가 없습니다.");
        return Ok(());
    }
    println!(
        "{:<10} {:<40} {:<12} {:>7} {}",
        "id", "제목", "상태", "청크", "등록일"
    );
    for doc in &documents {
        let chunks = doc.chunks.map(|c| c.to_string());
        println!(
            "{:<10} {:<40} {:<12} {:>7} {}",
            doc.id_string(),
            truncate(&doc.title, 40),
            or_dash(doc.status.as_deref()),
            or_dash(chunks.as_deref()),
            or_dash(doc.created_at.as_deref())
        );
    }
    println!("\n총 {}개", documents.len());
    Ok(())
}

pub async fn update(config: &Config, id: &str, patch: DocumentPatch) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    client.update_document(id, &patch).await?;
    println!("✅ 문서 {}을(를) 수정했습니다.", id);
    Ok(())
}

pub async fn delete(config: &Config, id: &str) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    client.delete_document(id).await?;
    println!("🗑  문서 {}을(를) 삭제했습니다.", id);
    Ok(())
}
