//! Document QA Admin Console Library
//!
//! This library provides tools to:
//! - Manage documents in the QA service (upload, list, update, delete)
//! - Read usage KPIs and cumulative user/question series
//! - Group same-person activity and drill into visitor conversations
//! - Ingest GA4 funnel spreadsheets and filter them by session source
//! - Control the auto-reply bot process

pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod store;
pub mod task;
pub mod view;

// Re-export common types
pub use api::{ApiClient, BotClient};
pub use config::Config;
pub use error::{Error, Result};
pub use task::CancelToken;

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
