//! Domain records: subjects, tasks and completed study sessions.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A subject of study with a weekly goal in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub goal_hours: f64,
    /// Gradient color pair used by display layers; stored as-is.
    pub colors: Vec<String>,
}

/// Task priority. Integer values match what is stored in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn title(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn value(&self) -> i64 {
        match self {
            Priority::Low => 0,
            Priority::Medium => 1,
            Priority::High => 2,
        }
    }

    /// Unknown values fall back to `Medium`.
    pub fn from_value(value: i64) -> Self {
        match value {
            0 => Priority::Low,
            2 => Priority::High,
            _ => Priority::Medium,
        }
    }
}

/// A task attached to a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub subject_id: i64,
    pub title: String,
    pub description: String,
    /// Due date as epoch milliseconds, matching what pickers produce.
    pub due_date_ms: Option<i64>,
    pub priority: Priority,
    pub related_to_subject: String,
    pub is_complete: bool,
}

/// A persisted study session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub subject_id: Option<i64>,
    pub related_to_subject: String,
    pub date: DateTime<Utc>,
    pub duration_secs: u64,
}

impl Session {
    /// Duration as fractional hours, rounded to two decimals for display.
    pub fn duration_hours(&self) -> f64 {
        seconds_to_hours(self.duration_secs)
    }
}

/// Seconds as fractional hours, rounded to two decimals.
pub fn seconds_to_hours(secs: u64) -> f64 {
    (secs as f64 / 3600.0 * 100.0).round() / 100.0
}

/// Epoch milliseconds as a "dd MMM yyyy" local date string. `None` renders
/// today's date, matching the date-picker default.
pub fn millis_to_date_string(millis: Option<i64>) -> String {
    let date = millis
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Local::now);
    date.format("%d %b %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_round_trips_through_value() {
        for p in [Priority::Low, Priority::Medium, Priority::High] {
            assert_eq!(Priority::from_value(p.value()), p);
        }
    }

    #[test]
    fn unknown_priority_value_falls_back_to_medium() {
        assert_eq!(Priority::from_value(42), Priority::Medium);
        assert_eq!(Priority::from_value(-1), Priority::Medium);
    }

    #[test]
    fn seconds_convert_to_fractional_hours() {
        assert_eq!(seconds_to_hours(3600), 1.0);
        assert_eq!(seconds_to_hours(5400), 1.5);
        assert_eq!(seconds_to_hours(0), 0.0);
        // 1 second rounds to 0.00 hours.
        assert_eq!(seconds_to_hours(1), 0.0);
    }

    #[test]
    fn millis_render_as_date_string() {
        let rendered = millis_to_date_string(Some(0));
        // Epoch in any timezone is Dec 31 1969 or Jan 1 1970.
        assert!(rendered.ends_with("1970") || rendered.ends_with("1969"));
    }
}
