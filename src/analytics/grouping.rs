//! Coordinate grouping for the same-person scatter chart.
//!
//! Points sharing `(total_questions, distinct_hour_appearances)` collapse into
//! one marker that remembers every member identity.

use std::collections::HashMap;

use serde::Serialize;

use crate::api::ActivityPoint;

/// Marker colors, assigned by group index.
pub const PALETTE: &[&str] = &[
    "#4e79a7", "#f28e2b", "#e15759", "#76b7b2", "#59a14f", "#edc948", "#b07aa1", "#ff9da7",
    "#9c755f", "#bab0ac",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupedPoint {
    /// Total questions.
    pub x: u64,
    /// Distinct hours the visitor appeared in.
    pub y: u64,
    pub count: usize,
    /// Member identities in input order.
    pub members: Vec<String>,
    pub label: String,
}

impl GroupedPoint {
    fn new(x: u64, y: u64) -> Self {
        Self {
            x,
            y,
            count: 0,
            members: Vec::new(),
            label: String::new(),
        }
    }
}

/// Chart label: `(x, y)` for a single visitor, `(x, y) N명` otherwise.
pub fn group_label(x: u64, y: u64, count: usize) -> String {
    if count > 1 {
        format!("({}, {}) {}명", x, y, count)
    } else {
        format!("({}, {})", x, y)
    }
}

/// Partition points by exact coordinate pair.
///
/// Groups come out in order of first appearance, so index-based colors stay
/// put as long as the input does.
pub fn group_points(points: &[ActivityPoint]) -> Vec<GroupedPoint> {
    let mut index: HashMap<(u64, u64), usize> = HashMap::new();
    let mut groups: Vec<GroupedPoint> = Vec::new();

    for point in points {
        let key = (point.total_questions, point.distinct_hour_appearances);
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(GroupedPoint::new(key.0, key.1));
            groups.len() - 1
        });
        let group = &mut groups[slot];
        group.members.push(point.is_same_person.clone());
        group.count += 1;
    }

    for group in &mut groups {
        group.label = group_label(group.x, group.y, group.count);
    }
    groups
}

/// Stable color for the group at `index`.
pub fn group_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}
