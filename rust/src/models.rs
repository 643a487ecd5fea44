//! Core data types crossing the engine boundary.
//!
//! Field names serialize in camelCase to match the host application's
//! JSON shapes; dates serialize as ISO `YYYY-MM-DD`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calendar::WorkingDayCalendar;

/// Dependency type. Only finish-to-start exists today; new types are added
/// as variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyType {
    #[default]
    #[serde(rename = "FS")]
    FinishToStart,
}

/// A dependency on a predecessor task with a signed lag in working days.
///
/// Negative lag lets the successor overlap the tail of the predecessor,
/// positive lag adds a buffer, zero means the successor starts on the next
/// working day after the predecessor ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub predecessor_id: String,
    #[serde(rename = "type", default)]
    pub dependency_type: DependencyType,
    #[serde(default)]
    pub lag: i32,
}

impl Dependency {
    pub fn finish_to_start(predecessor_id: impl Into<String>, lag: i32) -> Self {
        Self {
            predecessor_id: predecessor_id.into(),
            dependency_type: DependencyType::FinishToStart,
            lag,
        }
    }

    /// Number of working days the successor overlaps the predecessor.
    ///
    /// Equal to `-lag` for negative lags and zero otherwise; the trailing day
    /// is not counted.
    pub fn overlap_days(&self) -> u32 {
        if self.lag < 0 {
            self.lag.unsigned_abs()
        } else {
            0
        }
    }
}

/// A task to be scheduled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    /// Duration in working days (at least 1).
    pub duration: u32,
    /// Grouping key; dependencies never cross asset groups.
    pub asset_id: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl Task {
    pub fn new(id: impl Into<String>, duration: u32, asset_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            duration,
            asset_id: asset_id.into(),
            dependencies: Vec::new(),
        }
    }

    /// Builder-style helper to append a finish-to-start dependency.
    pub fn after(mut self, predecessor_id: impl Into<String>, lag: i32) -> Self {
        self.dependencies
            .push(Dependency::finish_to_start(predecessor_id, lag));
        self
    }
}

/// A task with its assigned calendar dates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub id: String,
    pub duration: u32,
    pub asset_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub is_critical: bool,
    pub total_float: i64,
}

/// Engine input.
///
/// Dates stay as raw strings here so that malformed values can be reported
/// as typed errors rather than rejected by the deserializer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub holidays: Vec<String>,
    pub anchor_date: String,
    #[serde(default)]
    pub allow_anchor_on_non_working_day: bool,
}

impl ScheduleRequest {
    pub fn new(tasks: Vec<Task>, anchor_date: impl Into<String>) -> Self {
        Self {
            tasks,
            holidays: Vec::new(),
            anchor_date: anchor_date.into(),
            allow_anchor_on_non_working_day: false,
        }
    }

    pub fn with_holidays<I, S>(mut self, holidays: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.holidays = holidays.into_iter().map(Into::into).collect();
        self
    }
}

/// Engine output on success.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    /// Scheduled tasks in input order.
    pub scheduled_tasks: Vec<ScheduledTask>,
    /// Longest path through the graph, in working-day offsets.
    pub project_duration: i64,
    /// Critical chain from root to sink.
    pub critical_path: Vec<String>,
}

impl Schedule {
    pub fn task(&self, id: &str) -> Option<&ScheduledTask> {
        self.scheduled_tasks.iter().find(|t| t.id == id)
    }

    /// Working days a task is behind as of `as_of`.
    ///
    /// Positive when `as_of` is past the task's end date, zero or negative
    /// while the task is still within its window. `None` for unknown ids.
    pub fn working_days_behind(
        &self,
        task_id: &str,
        as_of: NaiveDate,
        calendar: &WorkingDayCalendar,
    ) -> Option<i64> {
        self.task(task_id)
            .map(|t| calendar.count_working_days(t.end, as_of))
    }

    /// First start and last end across all tasks.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.scheduled_tasks.iter().map(|t| t.start).min()?;
        let end = self.scheduled_tasks.iter().map(|t| t.end).max()?;
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_overlap_days() {
        assert_eq!(Dependency::finish_to_start("a", -3).overlap_days(), 3);
        assert_eq!(Dependency::finish_to_start("a", 0).overlap_days(), 0);
        assert_eq!(Dependency::finish_to_start("a", 2).overlap_days(), 0);
    }

    #[test]
    fn test_request_deserializes_contract_shape() {
        let json = r#"{
            "tasks": [
                {"id": "a", "duration": 2, "assetId": "site-1"},
                {"id": "b", "duration": 1, "assetId": "site-1",
                 "dependencies": [{"predecessorId": "a", "lag": -1}]},
                {"id": "c", "duration": 1, "assetId": "site-1",
                 "dependencies": [{"predecessorId": "b", "type": "FS"}]}
            ],
            "holidays": ["2025-01-01"],
            "anchorDate": "2025-01-06"
        }"#;
        let request: ScheduleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.tasks.len(), 3);
        assert!(request.tasks[0].dependencies.is_empty());
        assert_eq!(request.tasks[1].dependencies[0].lag, -1);
        assert_eq!(
            request.tasks[2].dependencies[0],
            Dependency::finish_to_start("b", 0)
        );
        assert!(!request.allow_anchor_on_non_working_day);
    }

    #[test]
    fn test_unknown_dependency_type_is_rejected() {
        let json = r#"{"predecessorId": "a", "type": "SS", "lag": 0}"#;
        assert!(serde_json::from_str::<Dependency>(json).is_err());
    }

    #[test]
    fn test_scheduled_task_serializes_iso_dates() {
        let task = ScheduledTask {
            id: "a".to_string(),
            duration: 1,
            asset_id: "site-1".to_string(),
            dependencies: vec![],
            start: d(2025, 1, 10),
            end: d(2025, 1, 10),
            is_critical: true,
            total_float: 0,
        };
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["start"], "2025-01-10");
        assert_eq!(json["isCritical"], true);
        assert_eq!(json["totalFloat"], 0);
        assert!(json.get("dependencies").is_none());
    }

    #[test]
    fn test_working_days_behind() {
        let schedule = Schedule {
            scheduled_tasks: vec![ScheduledTask {
                id: "a".to_string(),
                duration: 3,
                asset_id: "site-1".to_string(),
                dependencies: vec![],
                start: d(2025, 1, 8),
                end: d(2025, 1, 10),
                is_critical: true,
                total_float: 0,
            }],
            project_duration: 3,
            critical_path: vec!["a".to_string()],
        };
        let cal = WorkingDayCalendar::default();
        // Friday end, checked the following Tuesday: Mon + Tue
        assert_eq!(schedule.working_days_behind("a", d(2025, 1, 14), &cal), Some(2));
        assert_eq!(schedule.working_days_behind("a", d(2025, 1, 9), &cal), Some(-1));
        assert_eq!(schedule.working_days_behind("zzz", d(2025, 1, 9), &cal), None);
        assert_eq!(schedule.date_span(), Some((d(2025, 1, 8), d(2025, 1, 10))));
    }
}
