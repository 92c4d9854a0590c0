//! Day labels for cumulative time series.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// A point keyed by a day string.
pub trait DayPoint {
    fn day(&self) -> &str;
}

/// A series point with its display label; the point itself is untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Labeled<T> {
    pub label: String,
    #[serde(flatten)]
    pub point: T,
}

/// `month/day` without padding, e.g. `2026-02-03` → `2/3`.
///
/// Accepts plain dates and date-times; anything unparseable gives an empty
/// label.
pub fn day_label(day: &str) -> String {
    parse_day(day.trim())
        .map(|date| format!("{}/{}", date.month(), date.day()))
        .unwrap_or_default()
}

fn parse_day(day: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(day) {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(day, fmt).ok())
        .map(|dt| dt.date())
}

/// Attach a label to every point, keeping order.
pub fn label_series<T: DayPoint + Clone>(series: &[T]) -> Vec<Labeled<T>> {
    series
        .iter()
        .map(|point| Labeled {
            label: day_label(point.day()),
            point: point.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::CumulativeUsersPoint;

    #[test]
    fn labels_plain_dates_without_padding() {
        assert_eq!(day_label("2026-02-03"), "2/3");
        assert_eq!(day_label("2025-12-25"), "12/25");
    }

    #[test]
    fn labels_date_times() {
        assert_eq!(day_label("2026-02-03T23:10:00"), "2/3");
        assert_eq!(day_label("2026-02-03 08:00:00"), "2/3");
        assert_eq!(day_label("2026-02-03T08:00:00+09:00"), "2/3");
    }

    #[test]
    fn malformed_dates_yield_empty_label() {
        assert_eq!(day_label(""), "");
        assert_eq!(day_label("yesterday"), "");
        assert_eq!(day_label("2026-13-40"), "");
    }

    #[test]
    fn label_series_keeps_numbers() {
        let series = vec![CumulativeUsersPoint {
            day: "2026-02-03".into(),
            new_users: 5,
            cumulative_users: 12,
        }];
        let labeled = label_series(&series);

        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].label, "2/3");
        assert_eq!(labeled[0].point, series[0]);
    }

    #[test]
    fn labeled_point_serializes_flat() {
        let labeled = Labeled {
            label: "2/3".to_string(),
            point: CumulativeUsersPoint {
                day: "2026-02-03".into(),
                new_users: 5,
                cumulative_users: 12,
            },
        };
        let value = serde_json::to_value(&labeled).unwrap();
        assert_eq!(value["label"], "2/3");
        assert_eq!(value["cumulative_users"], 12);
    }
}
