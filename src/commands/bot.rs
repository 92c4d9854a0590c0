//! Auto-reply bot control.

use anyhow::Result;

use super::{or_dash, print_structured, truncate, OutputFormat};
use crate::api::{BotClient, BotConfig, BotStatus};
use crate::config::Config;

pub async fn status(config: &Config, format: OutputFormat) -> Result<()> {
    let bot = BotClient::from_config(config)?;
    let status = bot.status().await?;
    render_status(&status, format)
}

pub async fn comments(config: &Config, limit: Option<usize>, format: OutputFormat) -> Result<()> {
    let bot = BotClient::from_config(config)?;
    let comments = bot.comments(limit.unwrap_or(config.comments_limit)).await?;

    if format != OutputFormat::Table {
        print_structured(format, &comments)?;
        return Ok(());
    }

    if comments.is_empty() {
        println!("수집된 댓글이 없습니다.");
        return Ok(());
    }
    for comment in &comments {
        println!(
            "[{}] {} ({})",
            or_dash(comment.created_at.as_deref()),
            or_dash(comment.author.as_deref()),
            or_dash(comment.status.as_deref())
        );
        println!("  💬 {}", truncate(&comment.text, 120));
        if let Some(reply) = comment.reply.as_deref().filter(|r| !r.is_empty()) {
            println!("  ↪ {}", truncate(reply, 120));
        }
    }
    Ok(())
}

pub async fn start(config: &Config, format: OutputFormat) -> Result<()> {
    let bot = BotClient::from_config(config)?;
    let status = bot.start().await?;
    render_status(&status, format)
}

pub async fn stop(config: &Config, format: OutputFormat) -> Result<()> {
    let bot = BotClient::from_config(config)?;
    let status = bot.stop().await?;
    render_status(&status, format)
}

pub async fn configure(config: &Config, update: BotConfig, format: OutputFormat) -> Result<()> {
    if update == BotConfig::default() {
        anyhow::bail!("Nothing to update: pass at least one setting");
    }
    let bot = BotClient::from_config(config)?;
    let status = bot.set_config(&update).await?;
    render_status(&status, format)
}

fn render_status(status: &BotStatus, format: OutputFormat) -> Result<()> {
    if format != OutputFormat::Table {
        print_structured(format, status)?;
        return Ok(());
    }

    let state = if status.running { "🟢 실행 중" } else { "⚪ 중지됨" };
    println!("상태:     {}", state);
    println!("시작 시각: {}", or_dash(status.started_at.as_deref()));
    if let Some(processed) = status.processed {
        println!("처리 건수: {}", processed);
    }
    if let Some(error) = status.last_error.as_deref().filter(|e| !e.is_empty()) {
        println!("최근 오류: {}", error);
    }
    if let Some(cfg) = &status.config {
        if let Some(interval) = cfg.interval_secs {
            println!("주기:     {}초", interval);
        }
        if let Some(max) = cfg.max_replies {
            println!("최대 답글: {}", max);
        }
        if let Some(dry_run) = cfg.dry_run {
            println!("dry-run:  {}", dry_run);
        }
        if let Some(url) = cfg.target_url.as_deref() {
            println!("대상:     {}", url);
        }
    }
    Ok(())
}
