//! GA4 path-exploration funnel: spreadsheet ingest and source filtering.

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::warn;

use super::{print_structured, OutputFormat};
use crate::analytics::funnel::{percent, PathRow, SourceFilter};
use crate::api::ApiClient;
use crate::config::Config;
use crate::store::{LocalCache, PathStore, RowsOrigin};
use crate::view::FunnelView;

fn open_store(config: &Config) -> Result<PathStore<ApiClient>> {
    let client = ApiClient::from_config(config)?;
    Ok(PathStore::new(client, LocalCache::new(&config.cache_dir)))
}

/// Parse a spreadsheet and replace the stored dataset with its rows.
pub async fn ingest(config: &Config, path: &Path) -> Result<()> {
    let store = open_store(config)?;
    let mut view = FunnelView::with_saved_filter(&store).await;

    let outcome = view.ingest_file(path, &store).await?;
    println!(
        "✅ {}행을 불러왔습니다 ({}개 소스).",
        view.dataset().len(),
        view.sources().len()
    );
    if !outcome.local_saved {
        warn!("Local cache write failed");
        println!("⚠️  로컬 캐시에 저장하지 못했습니다.");
    }
    if !outcome.remote_saved {
        println!("⚠️  서버에 저장하지 못했습니다. 로컬 사본만 갱신되었습니다.");
    }
    Ok(())
}

#[derive(Serialize)]
struct FunnelPayload<'a> {
    filter: String,
    sources: Vec<String>,
    rows: &'a [PathRow],
}

/// Print the funnel under the current filter, optionally changing it first.
pub async fn show(
    config: &Config,
    source: Option<String>,
    all: bool,
    format: OutputFormat,
) -> Result<()> {
    let store = open_store(config)?;
    let mut view = FunnelView::load(&store).await;

    let requested = if all {
        Some(SourceFilter::All)
    } else {
        source.map(SourceFilter::Source)
    };
    if let Some(filter) = requested {
        if let Err(e) = store.save_filter(&filter).await {
            warn!(error = %e, "Failed to persist source filter");
        }
        view.set_filter(filter);
    }

    let rows = view.visible_rows();

    if format != OutputFormat::Table {
        let payload = FunnelPayload {
            filter: view.filter().to_string(),
            sources: view.sources(),
            rows: &rows,
        };
        print_structured(format, &payload)?;
        return Ok(());
    }

    if let Some(notice) = &view.notice {
        println!("⚠️  {}", notice);
    }
    if view.is_empty() {
        println!("엑셀 파일을 업로드하면 탐색 분석 결과가 표시됩니다.");
        return Ok(());
    }

    let origin = match view.origin {
        RowsOrigin::Remote => "서버",
        RowsOrigin::Local => "로컬 캐시",
        RowsOrigin::None => "-",
    };
    println!("▶ 경로 탐색 ({}) | 출처: {}", view.filter(), origin);
    println!("{}", "-".repeat(78));
    println!(
        "{:<24} {:<16} {:>10} {:>10} {:>8} {:>8}",
        "단계", "소스", "활성 사용자", "완료율", "이탈", "이탈률"
    );
    for row in &rows {
        println!(
            "{:<24} {:<16} {:>10} {:>10} {:>8} {:>8}",
            row.step,
            row.source,
            row.active_users,
            percent(row.completion_rate),
            row.exits,
            percent(row.bounce_rate)
        );
    }
    if rows.is_empty() {
        println!("선택한 소스에 해당하는 행이 없습니다.");
    }
    Ok(())
}

/// List the distinct sources in the stored dataset.
pub async fn sources(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let view = FunnelView::load(&store).await;

    let sources = view.sources();
    if sources.is_empty() {
        println!("저장된 소스가 없습니다.");
        return Ok(());
    }
    let selected = view.filter().selected_source();
    for source in sources {
        let marker = if selected == Some(source.as_str()) { "*" } else { " " };
        println!("{} {}", marker, source);
    }
    Ok(())
}
