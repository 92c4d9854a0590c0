//! QA Admin CLI - main entry point
//!
//! Terminal front end for the document-QA admin dashboard.

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use qa_admin::api::{BotConfig, DocumentPatch};
use qa_admin::commands::{self, OutputFormat};
use qa_admin::{metrics, Config};
use tracing::warn;

#[derive(Parser)]
#[command(name = "qa_admin")]
#[command(about = "Document QA admin dashboard", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Output format: table | json | yaml
    #[arg(long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Total users and cumulative user/question series
    Kpi,

    /// Same-person activity analytics
    Behavior {
        #[command(subcommand)]
        action: BehaviorAction,
    },

    /// GA4 path-exploration funnel
    Funnel {
        #[command(subcommand)]
        action: FunnelAction,
    },

    /// Knowledge-base documents
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Auto-reply bot control
    Bot {
        #[command(subcommand)]
        action: BotAction,
    },
}

#[derive(Subcommand)]
enum BehaviorAction {
    /// Grouped (questions, hours) points with member counts
    Groups,

    /// Latest conversation of every member in a group
    Group {
        /// Group index as printed by `behavior groups`
        index: usize,
    },

    /// Questions that could not be attributed to a person
    NullRows,

    /// Show a single conversation log
    Log {
        /// Log id
        id: i64,
    },
}

#[derive(Subcommand)]
enum FunnelAction {
    /// Load a spreadsheet export (xlsx, xls, ods or csv)
    Ingest {
        /// Spreadsheet file
        file: PathBuf,
    },

    /// Print the funnel table
    Show {
        /// Show rows of a single source
        #[arg(short, long, conflicts_with = "all")]
        source: Option<String>,

        /// Show the top source per step
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// List sources in the stored dataset
    Sources,
}

#[derive(Subcommand)]
enum DocsAction {
    /// Upload one or more documents
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List documents
    List,

    /// Update document metadata
    Update {
        /// Document id
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        category: Option<String>,

        /// Enable or disable the document for answering
        #[arg(long)]
        enabled: Option<bool>,
    },

    /// Delete a document
    Delete {
        /// Document id
        id: String,
    },
}

#[derive(Subcommand)]
enum BotAction {
    /// Current bot state
    Status,

    /// Recent comments seen by the bot
    Comments {
        /// Number of comments (defaults to config)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Start the bot
    Start,

    /// Stop the bot
    Stop,

    /// Change bot settings
    Config {
        /// Polling interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Maximum replies per run
        #[arg(long)]
        max_replies: Option<u32>,

        /// Generate replies without posting them
        #[arg(long)]
        dry_run: Option<bool>,

        /// Page to watch for comments
        #[arg(long)]
        target_url: Option<String>,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Kpi => "kpi",
            Commands::Behavior { action } => match action {
                BehaviorAction::Groups => "behavior_groups",
                BehaviorAction::Group { .. } => "behavior_group",
                BehaviorAction::NullRows => "behavior_null_rows",
                BehaviorAction::Log { .. } => "behavior_log",
            },
            Commands::Funnel { action } => match action {
                FunnelAction::Ingest { .. } => "funnel_ingest",
                FunnelAction::Show { .. } => "funnel_show",
                FunnelAction::Sources => "funnel_sources",
            },
            Commands::Docs { action } => match action {
                DocsAction::Upload { .. } => "docs_upload",
                DocsAction::List => "docs_list",
                DocsAction::Update { .. } => "docs_update",
                DocsAction::Delete { .. } => "docs_delete",
            },
            Commands::Bot { action } => match action {
                BotAction::Status => "bot_status",
                BotAction::Comments { .. } => "bot_comments",
                BotAction::Start => "bot_start",
                BotAction::Stop => "bot_stop",
                BotAction::Config { .. } => "bot_config",
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("qa_admin=info".parse()?))
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let format = OutputFormat::parse(&cli.format)?;
    let config = Config::new();

    let command_name = cli.command.name();
    metrics::record_command_start(command_name);
    let start = Instant::now();

    let result = execute_command(cli.command, &config, format).await;

    metrics::record_command_result(command_name, start.elapsed(), result.is_ok());

    if let Some(hint) = result.as_ref().err().and_then(commands::login_hint) {
        eprintln!("{}", hint);
    }

    result
}

async fn execute_command(
    command: Commands,
    config: &Config,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        Commands::Kpi => commands::kpi::run(config, format).await?,
        Commands::Behavior { action } => match action {
            BehaviorAction::Groups => commands::behavior::groups(config, format).await?,
            BehaviorAction::Group { index } => commands::behavior::group(config, index).await?,
            BehaviorAction::NullRows => commands::behavior::null_rows(config, format).await?,
            BehaviorAction::Log { id } => commands::behavior::log(config, id, format).await?,
        },
        Commands::Funnel { action } => match action {
            FunnelAction::Ingest { file } => commands::funnel::ingest(config, &file).await?,
            FunnelAction::Show { source, all } => {
                commands::funnel::show(config, source, all, format).await?
            }
            FunnelAction::Sources => commands::funnel::sources(config).await?,
        },
        Commands::Docs { action } => match action {
            DocsAction::Upload { files } => commands::docs::upload(config, files).await?,
            DocsAction::List => commands::docs::list(config, format).await?,
            DocsAction::Update {
                id,
                title,
                category,
                enabled,
            } => {
                let patch = DocumentPatch {
                    title,
                    category,
                    enabled,
                };
                commands::docs::update(config, &id, patch).await?;
            }
            DocsAction::Delete { id } => commands::docs::delete(config, &id).await?,
        },
        Commands::Bot { action } => match action {
            BotAction::Status => commands::bot::status(config, format).await?,
            BotAction::Comments { limit } => commands::bot::comments(config, limit, format).await?,
            BotAction::Start => commands::bot::start(config, format).await?,
            BotAction::Stop => commands::bot::stop(config, format).await?,
            BotAction::Config {
                interval,
                max_replies,
                dry_run,
                target_url,
            } => {
                let update = BotConfig {
                    interval_secs: interval,
                    max_replies,
                    dry_run,
                    target_url,
                };
                commands::bot::configure(config, update, format).await?;
            }
        },
    }

    Ok(())
}
