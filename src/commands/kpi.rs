//! KPI overview: total users and cumulative series.

use anyhow::Result;
use serde::Serialize;

use super::{print_section, print_structured, OutputFormat};
use crate::analytics::Labeled;
use crate::api::{ApiClient, CumulativeQuestionsPoint, CumulativeUsersPoint};
use crate::config::Config;
use crate::view::{KpiOverview, Section};

#[derive(Serialize)]
struct KpiPayload<'a> {
    user_count: Option<u64>,
    users: Option<&'a [Labeled<CumulativeUsersPoint>]>,
    questions: Option<&'a [Labeled<CumulativeQuestionsPoint>]>,
    errors: Vec<&'a str>,
}

pub async fn run(config: &Config, format: OutputFormat) -> Result<()> {
    let client = ApiClient::from_config(config)?;
    let overview = KpiOverview::fetch(&client).await;

    if format != OutputFormat::Table {
        let payload = KpiPayload {
            user_count: overview.user_count.ready().copied(),
            users: overview.users.ready().map(Vec::as_slice),
            questions: overview.questions.ready().map(Vec::as_slice),
            errors: [
                overview.user_count.error(),
                overview.users.error(),
                overview.questions.error(),
            ]
            .into_iter()
            .flatten()
            .collect(),
        };
        print_structured(format, &payload)?;
        return Ok(());
    }

    print_overview(&overview);
    Ok(())
}

fn print_overview(overview: &KpiOverview) {
    print_section("총 사용자 수", &overview.user_count, |count| {
        println!("{} 명", count);
    });

    print_series("누적 사용자", &overview.users, |p| {
        (p.point.new_users, p.point.cumulative_users)
    });
    print_series("누적 질문", &overview.questions, |p| {
        (p.point.new_questions, p.point.cumulative_questions)
    });
}

fn print_series<T>(title: &str, section: &Section<Vec<Labeled<T>>>, values: impl Fn(&Labeled<T>) -> (u64, u64)) {
    print_section(title, section, |series| {
        println!("{:<8} {:>10} {:>12}", "날짜", "신규", "누적");
        for point in series {
            let (new, cumulative) = values(point);
            println!("{:<8} {:>10} {:>12}", point.label, new, cumulative);
        }
    });
}
