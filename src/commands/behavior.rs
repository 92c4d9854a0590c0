//! User-behavior analytics: same-person groups and conversation drill-down.

use anyhow::Result;
use tokio::signal;

use super::{or_dash, print_section, print_structured, truncate, OutputFormat};
use crate::analytics::group_color;
use crate::api::{ApiClient, ConversationLog};
use crate::config::Config;
use crate::task::CancelToken;
use crate::view::BehaviorView;

/// Grouped activity scatter plus the null-identity counters.
pub async fn groups(config: &Config, format: OutputFormat) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    let view = BehaviorView::fetch(&client).await;

    if format != OutputFormat::Table {
        if let Some(summary) = view.activity.ready() {
            print_structured(format, &summary.groups)?;
        } else if let Some(message) = view.activity.error() {
            anyhow::bail!("{}", message);
        }
        return Ok(());
    }

    print_section("동일인 활동 분포", &view.activity, |summary| {
        println!(
            "방문자 {}명, 좌표 {}개 | 식별 불가 질문 {}건 (세션 {}개)",
            summary.total_points,
            summary.groups.len(),
            summary.null_same_person_questions,
            summary.null_same_person_count
        );
        println!("{:<5} {:<20} {:<9} {}", "#", "좌표 (질문, 시간대)", "색상", "인원");
        for (idx, group) in summary.groups.iter().enumerate() {
            println!(
                "{:<5} {:<20} {:<9} {}",
                idx,
                group.label,
                group_color(idx),
                group.count
            );
        }
    });

    print_section("식별 불가 질문", &view.null_rows, |rows| {
        println!("{}건", rows.len());
    });
    Ok(())
}

/// Fetch every member's latest conversation for group `index`.
///
/// Ctrl+C abandons the fan-out; partial results are discarded.
pub async fn group(config: &Config, index: usize) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    let mut view = BehaviorView::fetch(&client).await;
    if let Some(message) = view.activity.error() {
        anyhow::bail!("{}", message);
    }

    let token = CancelToken::new();
    let guard = token.guard();

    tokio::select! {
        result = view.select_group(index, &client, config.fanout_limit, &token) => {
            result?;
        }
        _ = signal::ctrl_c() => {
            drop(guard);
            println!("\n요청을 취소했습니다.");
            return Ok(());
        }
    }

    let Some(group) = view.group(index) else {
        return Ok(());
    };
    println!("▶ {} ({}명)", group.label, group.count);
    println!("{}", "-".repeat(60));
    for member in &view.details {
        match &member.outcome {
            Ok(log) => print_log(&member.key, log),
            Err(message) => println!("[{}] ❌ {}", member.key, message),
        }
    }
    Ok(())
}

pub async fn null_rows(config: &Config, format: OutputFormat) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    let rows = client.null_same_person_rows().await?;

    if format != OutputFormat::Table {
        print_structured(format, &rows)?;
        return Ok(());
    }

    if rows.is_empty() {
        println!("식별 불가 질문이 없습니다.");
        return Ok(());
    }
    println!("{:<8} {:<20} {}", "log_id", "시각", "질문");
    for row in &rows {
        println!(
            "{:<8} {:<20} {}",
            row.log_id,
            or_dash(row.created_at.as_deref()),
            truncate(&row.question, 60)
        );
    }
    Ok(())
}

pub async fn log(config: &Config, log_id: i64, format: OutputFormat) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    let entry = client.log_by_id(log_id).await?;

    if format != OutputFormat::Table {
        print_structured(format, &entry)?;
        return Ok(());
    }
    print_log(&log_id.to_string(), &entry);
    Ok(())
}

fn print_log(key: &str, log: &ConversationLog) {
    println!("[{}] {}", key, or_dash(log.created_at.as_deref()));
    println!("  Q: {}", truncate(&log.question, 200));
    println!("  A: {}", truncate(&log.answer, 200));
}
