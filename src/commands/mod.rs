//! Command implementations
//!
//! All admin CLI commands are implemented here.
//! Each module corresponds to a subcommand in the CLI.

pub mod behavior;
pub mod bot;
pub mod docs;
pub mod funnel;
pub mod kpi;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::view::Section;

/// How a command prints its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(Error::InvalidArgument(format!(
                "Unsupported format '{}'. Use table|json|yaml",
                other
            ))),
        }
    }
}

/// Print a serializable payload as JSON or YAML.
pub(crate) fn print_structured<T: Serialize + ?Sized>(fmt: OutputFormat, payload: &T) -> Result<()> {
    let text = match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(payload)?,
        OutputFormat::Yaml => {
            serde_yaml::to_string(payload).map_err(|e| Error::SerializationError(e.to_string()))?
        }
        OutputFormat::Table => {
            return Err(Error::InvalidArgument(
                "table output has no structured form".to_string(),
            ))
        }
    };
    println!("{text}");
    Ok(())
}

/// Print a section header and its state; `render` runs only for ready data.
pub(crate) fn print_section<T>(title: &str, section: &Section<T>, render: impl FnOnce(&T)) {
    println!("\n▶ {}", title);
    println!("{}", "-".repeat(60));
    match section {
        Section::Loading => println!("불러오는 중..."),
        Section::Empty => println!("아직 데이터가 없습니다."),
        Section::Failed(message) => println!("❌ {}", message),
        Section::Ready(value) => render(value),
    }
}

pub(crate) fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

/// Re-login hint for failures the admin token would fix.
pub fn login_hint(err: &anyhow::Error) -> Option<&'static str> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<Error>())
        .any(Error::is_auth)
        .then_some("인증이 만료되었습니다. QA_ADMIN_TOKEN을 새 관리자 토큰으로 설정한 뒤 다시 시도해 주세요.")
}

/// Shorten long text for table cells.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        let cut: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
