//! Client-side shaping of analytics rows
//!
//! Provides:
//! - Coordinate grouping for the same-person scatter chart
//! - Day labels for cumulative KPI series
//! - Funnel source filtering and per-step collapse

pub mod funnel;
pub mod grouping;
pub mod timeseries;

pub use funnel::{natural_cmp, visible_rows, PathRow, SourceFilter};
pub use grouping::{group_color, group_label, group_points, GroupedPoint};
pub use timeseries::{day_label, label_series, DayPoint, Labeled};
