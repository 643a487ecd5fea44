//! Calendar-aware critical path scheduling.
//!
//! Tasks with finish-to-start dependencies (positive lag = buffer, negative
//! lag = overlap) are validated, run through the critical path method in
//! working-day offsets, then mapped onto a weekend- and holiday-aware
//! calendar from an anchor date.
//!
//! [`engine::SchedulingEngine`] is the entry point; the stages are public so
//! callers can run them individually.

pub mod assignment;
pub mod calendar;
pub mod config;
pub mod critical_path;
pub mod engine;
pub mod graph;
pub mod interner;
pub mod logging;
pub mod models;
pub mod validation;

#[cfg(feature = "python")]
mod python;

pub use assignment::{AnchorPlacement, AssignmentError, DateAssigner, DateRange};
pub use calendar::{parse_iso_date, CalendarError, WorkingDayCalendar, DEFAULT_SEARCH_LIMIT_DAYS};
pub use config::{DanglingDependencyPolicy, SchedulerConfig};
pub use critical_path::{
    calculate_critical_path, CriticalPathCalculator, CriticalPathError, CriticalPathResult,
    TaskTiming,
};
pub use engine::{schedule, EngineError, ErrorKind, ScheduleFailure, SchedulingEngine};
pub use graph::{GraphError, TaskGraph};
pub use models::{Dependency, DependencyType, Schedule, ScheduleRequest, ScheduledTask, Task};
pub use validation::{DependencyValidator, Validation, ValidationError, ValidationErrorKind};
