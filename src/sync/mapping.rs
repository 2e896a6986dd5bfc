//! Tracker status labels and priority numbers mapped onto board enums.
//!
//! Both mappings are total: anything unrecognized falls back to the default.

use crate::models::{Priority, TaskStatus};

/// Map a free-text workflow state name onto a [`TaskStatus`].
///
/// Case-insensitive substring rules, first match wins:
/// backlog, todo, in progress / started, done / completed / closed, review.
pub fn map_status(label: &str) -> TaskStatus {
    let label = label.to_lowercase();
    if label.contains("backlog") {
        TaskStatus::Backlog
    } else if label.contains("todo") {
        TaskStatus::Todo
    } else if label.contains("in progress") || label.contains("started") {
        TaskStatus::InProgress
    } else if label.contains("done") || label.contains("completed") || label.contains("closed") {
        TaskStatus::Done
    } else if label.contains("review") {
        TaskStatus::Review
    } else {
        TaskStatus::Todo
    }
}

/// Map a tracker priority number (1 urgent .. 4 low) onto a [`Priority`].
///
/// Missing, zero, non-integral and out-of-range values map to medium.
pub fn map_priority(raw: Option<f64>) -> Priority {
    match raw {
        Some(n) if n == 1.0 => Priority::Urgent,
        Some(n) if n == 2.0 => Priority::High,
        Some(n) if n == 3.0 => Priority::Medium,
        Some(n) if n == 4.0 => Priority::Low,
        _ => Priority::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_status_table() {
        let cases = [
            ("Backlog", TaskStatus::Backlog),
            ("Todo", TaskStatus::Todo),
            ("TODO", TaskStatus::Todo),
            ("In Progress", TaskStatus::InProgress),
            ("Started", TaskStatus::InProgress),
            ("Done", TaskStatus::Done),
            ("Completed", TaskStatus::Done),
            ("Closed", TaskStatus::Done),
            ("In Review", TaskStatus::Review),
            ("Code review", TaskStatus::Review),
            ("Canceled", TaskStatus::Todo),
            ("", TaskStatus::Todo),
        ];
        for (label, expected) in cases {
            assert_eq!(map_status(label), expected, "label {:?}", label);
        }
    }

    #[test]
    fn test_map_status_rule_order() {
        // Earlier rules win when several substrings are present.
        assert_eq!(map_status("Backlog (done)"), TaskStatus::Backlog);
        assert_eq!(map_status("Review done"), TaskStatus::Done);
    }

    #[test]
    fn test_map_priority_table() {
        assert_eq!(map_priority(Some(1.0)), Priority::Urgent);
        assert_eq!(map_priority(Some(2.0)), Priority::High);
        assert_eq!(map_priority(Some(3.0)), Priority::Medium);
        assert_eq!(map_priority(Some(4.0)), Priority::Low);
    }

    #[test]
    fn test_map_priority_defaults() {
        for raw in [None, Some(0.0), Some(5.0), Some(2.5), Some(-1.0), Some(f64::NAN)] {
            assert_eq!(map_priority(raw), Priority::Medium, "raw {:?}", raw);
        }
    }
}
