//! Funnel path rows, source filtering and per-step collapse.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One funnel step for one session source.
///
/// Rates are fractions in `0..=1`; multiply by 100 only for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRow {
    pub step: String,
    #[serde(default)]
    pub source: String,
    #[serde(alias = "active_users")]
    pub active_users: u64,
    #[serde(default, alias = "completion_rate")]
    pub completion_rate: f64,
    #[serde(default)]
    pub exits: u64,
    #[serde(default, alias = "bounce_rate")]
    pub bounce_rate: f64,
}

/// Which rows the funnel view shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceFilter {
    /// One row per step, the one with the most active users.
    #[default]
    All,
    Source(String),
}

impl SourceFilter {
    /// Blank selections mean "all sources".
    pub fn from_selection(selection: Option<&str>) -> Self {
        match selection.map(str::trim) {
            Some(s) if !s.is_empty() => SourceFilter::Source(s.to_string()),
            _ => SourceFilter::All,
        }
    }

    pub fn selected_source(&self) -> Option<&str> {
        match self {
            SourceFilter::All => None,
            SourceFilter::Source(s) => Some(s),
        }
    }
}

impl fmt::Display for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFilter::All => write!(f, "ALL"),
            SourceFilter::Source(s) => write!(f, "{}", s),
        }
    }
}

/// Rows to display for `filter`, sorted by step.
///
/// Pure in `(rows, filter)`. With [`SourceFilter::All`] each step keeps its
/// row with the highest active-user count; ties go to the smallest source
/// label, then to the earlier row.
pub fn visible_rows(rows: &[PathRow], filter: &SourceFilter) -> Vec<PathRow> {
    let mut out = match filter {
        SourceFilter::Source(source) => rows
            .iter()
            .filter(|row| &row.source == source)
            .cloned()
            .collect(),
        SourceFilter::All => collapse_by_step(rows),
    };
    out.sort_by(|a, b| natural_cmp(&a.step, &b.step));
    out
}

fn collapse_by_step(rows: &[PathRow]) -> Vec<PathRow> {
    let mut best: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        match best.get(row.step.as_str()) {
            None => {
                best.insert(&row.step, i);
                order.push(&row.step);
            }
            Some(&current) => {
                if beats(row, &rows[current]) {
                    best.insert(&row.step, i);
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|step| best.get(step).map(|&i| rows[i].clone()))
        .collect()
}

fn beats(candidate: &PathRow, current: &PathRow) -> bool {
    match candidate.active_users.cmp(&current.active_users) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => candidate.source < current.source,
    }
}

/// Distinct sources, sorted for the selector.
pub fn sources(rows: &[PathRow]) -> Vec<String> {
    let mut out: Vec<String> = rows.iter().map(|r| r.source.clone()).collect();
    out.sort_by(|a, b| natural_cmp(a, b));
    out.dedup();
    out
}

/// Rate as a percentage string, e.g. `0.4567` → `45.7%`.
pub fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Locale-style comparison for step labels.
///
/// Case-insensitive, with runs of ASCII digits compared by value so
/// `"2. 검색"` sorts before `"10. 이탈"`. Falls back to a plain comparison so
/// the order is total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let ln = take_digits(&mut left);
                let rn = take_digits(&mut right);
                let ord = compare_digit_runs(&ln, &rn);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(l), Some(r)) => {
                let ord = l.to_lowercase().cmp(r.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        chars.next();
    }
    run
}

fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(step: &str, source: &str, active_users: u64) -> PathRow {
        PathRow {
            step: step.to_string(),
            source: source.to_string(),
            active_users,
            completion_rate: 0.0,
            exits: 0,
            bounce_rate: 0.0,
        }
    }

    #[test]
    fn collapse_keeps_max_active_users_per_step() {
        let rows = vec![row("A", "X", 10), row("A", "Y", 30)];
        let out = visible_rows(&rows, &SourceFilter::All);
        assert_eq!(out, vec![row("A", "Y", 30)]);
    }

    #[test]
    fn collapse_tie_goes_to_smallest_source() {
        let rows = vec![row("A", "naver", 30), row("A", "direct", 30), row("A", "google", 30)];
        let out = visible_rows(&rows, &SourceFilter::All);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "direct");
    }

    #[test]
    fn collapse_tie_with_same_source_keeps_first_row() {
        let mut first = row("A", "X", 5);
        first.exits = 1;
        let mut second = row("A", "X", 5);
        second.exits = 2;
        let out = visible_rows(&[first.clone(), second], &SourceFilter::All);
        assert_eq!(out, vec![first]);
    }

    #[test]
    fn single_source_filters_and_sorts() {
        let rows = vec![
            row("10. 이탈", "google", 1),
            row("2. 검색", "google", 8),
            row("1. 세션 시작", "naver", 20),
            row("1. 세션 시작", "google", 12),
        ];
        let out = visible_rows(&rows, &SourceFilter::Source("google".into()));
        let steps: Vec<&str> = out.iter().map(|r| r.step.as_str()).collect();
        assert_eq!(steps, vec!["1. 세션 시작", "2. 검색", "10. 이탈"]);
        assert!(out.iter().all(|r| r.source == "google"));
    }

    #[test]
    fn unknown_source_yields_nothing() {
        let rows = vec![row("A", "X", 1)];
        assert!(visible_rows(&rows, &SourceFilter::Source("Z".into())).is_empty());
    }

    #[test]
    fn filtering_does_not_touch_input() {
        let rows = vec![row("B", "X", 1), row("A", "Y", 2), row("A", "X", 3)];
        let before = rows.clone();
        let _ = visible_rows(&rows, &SourceFilter::All);
        let _ = visible_rows(&rows, &SourceFilter::Source("X".into()));
        assert_eq!(rows, before);
    }

    #[test]
    fn sources_are_distinct_and_sorted() {
        let rows = vec![row("A", "naver", 1), row("B", "direct", 1), row("C", "naver", 1)];
        assert_eq!(sources(&rows), vec!["direct", "naver"]);
    }

    #[test]
    fn natural_cmp_orders_numbers_by_value() {
        assert_eq!(natural_cmp("2. a", "10. a"), Ordering::Less);
        assert_eq!(natural_cmp("b", "A"), Ordering::Greater);
        assert_eq!(natural_cmp("step 007", "step 7"), Ordering::Less);
        assert_eq!(natural_cmp("x", "x"), Ordering::Equal);
        assert_eq!(natural_cmp("", "a"), Ordering::Less);
    }

    #[test]
    fn filter_from_blank_selection_is_all() {
        assert_eq!(SourceFilter::from_selection(None), SourceFilter::All);
        assert_eq!(SourceFilter::from_selection(Some("  ")), SourceFilter::All);
        assert_eq!(
            SourceFilter::from_selection(Some("google")),
            SourceFilter::Source("google".into())
        );
    }

    #[test]
    fn percent_formats_fraction() {
        assert_eq!(percent(0.4567), "45.7%");
        assert_eq!(percent(1.0), "100.0%");
    }

    #[test]
    fn path_row_json_uses_camel_case_and_accepts_snake_case() {
        let value = serde_json::to_value(row("A", "X", 3)).unwrap();
        assert_eq!(value["activeUsers"], 3);

        let parsed: PathRow = serde_json::from_str(
            r#"{"step":"A","source":"X","active_users":4,"completion_rate":0.5,"exits":1,"bounce_rate":0.1}"#,
        )
        .unwrap();
        assert_eq!(parsed.active_users, 4);
        assert_eq!(parsed.completion_rate, 0.5);
    }
}
