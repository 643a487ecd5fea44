//! Scheduling pipeline: build → validate → critical path → dates.
//!
//! This is the only entry point external callers need. Each stage has its
//! own error type; here they are flattened into [`EngineError`] values with
//! a stable [`ErrorKind`] so a caller can show every problem at once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assignment::{AnchorPlacement, AssignmentError, DateAssigner};
use crate::calendar::{parse_iso_date, CalendarError, WorkingDayCalendar};
use crate::config::{DanglingDependencyPolicy, SchedulerConfig};
use crate::critical_path::{CriticalPathCalculator, CriticalPathError};
use crate::graph::{GraphError, TaskGraph};
use crate::models::{Schedule, ScheduleRequest, ScheduledTask, Task};
use crate::validation::{DependencyValidator, Validation, ValidationError, ValidationErrorKind};
use crate::{log_changes, log_checks};

/// Failure categories exposed to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DuplicateTaskId,
    DanglingDependency,
    CircularDependency,
    OverlapExceedsDuration,
    CrossAssetDependency,
    InvalidAnchorDate,
    CalendarRangeExceeded,
    EmptyTaskList,
    InvalidDuration,
}

/// One reported problem.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[error("{kind:?}: {message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
    pub involved_task_ids: Vec<String>,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, involved_task_ids: Vec<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            involved_task_ids,
        }
    }
}

/// Every problem that stopped a scheduling run.
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[error("Scheduling failed with {} error(s): {}", .errors.len(), summarize(&.errors))]
pub struct ScheduleFailure {
    pub errors: Vec<EngineError>,
}

impl ScheduleFailure {
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(|e| e.kind).collect()
    }
}

impl From<Vec<EngineError>> for ScheduleFailure {
    fn from(errors: Vec<EngineError>) -> Self {
        Self { errors }
    }
}

fn summarize(errors: &[EngineError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<GraphError> for EngineError {
    fn from(err: GraphError) -> Self {
        let message = err.to_string();
        match err {
            GraphError::EmptyTaskList => EngineError::new(ErrorKind::EmptyTaskList, message, vec![]),
            GraphError::DuplicateTaskId(id) => {
                EngineError::new(ErrorKind::DuplicateTaskId, message, vec![id])
            }
            GraphError::InvalidDuration(id) => {
                EngineError::new(ErrorKind::InvalidDuration, message, vec![id])
            }
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        let kind = match err.kind {
            ValidationErrorKind::DanglingDependency => ErrorKind::DanglingDependency,
            ValidationErrorKind::CircularDependency => ErrorKind::CircularDependency,
            ValidationErrorKind::OverlapExceedsDuration => ErrorKind::OverlapExceedsDuration,
            ValidationErrorKind::CrossAssetDependency => ErrorKind::CrossAssetDependency,
        };
        EngineError::new(kind, err.message, err.involved_task_ids)
    }
}

impl From<CriticalPathError> for EngineError {
    fn from(err: CriticalPathError) -> Self {
        let message = err.to_string();
        match err {
            CriticalPathError::CircularDependency(ids) => {
                EngineError::new(ErrorKind::CircularDependency, message, ids)
            }
        }
    }
}

impl From<AssignmentError> for EngineError {
    fn from(err: AssignmentError) -> Self {
        let message = err.to_string();
        match err {
            AssignmentError::Anchor { .. } => {
                EngineError::new(ErrorKind::CalendarRangeExceeded, message, vec![])
            }
            AssignmentError::Fallback(inner) => EngineError::from(inner),
            AssignmentError::Calendar { task_id, .. }
            | AssignmentError::OffsetOutOfRange { task_id, .. } => {
                EngineError::new(ErrorKind::CalendarRangeExceeded, message, vec![task_id])
            }
        }
    }
}

impl From<CalendarError> for EngineError {
    fn from(err: CalendarError) -> Self {
        EngineError::new(ErrorKind::CalendarRangeExceeded, err.to_string(), vec![])
    }
}

/// Stateless scheduling engine. Holds configuration only; every call
/// starts from scratch.
#[derive(Clone, Debug, Default)]
pub struct SchedulingEngine {
    config: SchedulerConfig,
}

impl SchedulingEngine {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Build the calendar described by a request.
    pub fn calendar_for(&self, request: &ScheduleRequest) -> WorkingDayCalendar {
        let (calendar, rejected) =
            WorkingDayCalendar::from_iso_strings(&request.holidays, self.config.calendar_search_limit);
        for raw in rejected {
            log_changes!(
                self.config.verbosity,
                "[engine] ignoring holiday '{}': not an ISO date",
                raw
            );
        }
        calendar
    }

    /// Schedule a request, or report everything that prevents it.
    pub fn schedule(&self, request: &ScheduleRequest) -> Result<Schedule, ScheduleFailure> {
        let verbosity = self.config.verbosity;
        let mut errors: Vec<EngineError> = Vec::new();

        let anchor = parse_iso_date(&request.anchor_date);
        if anchor.is_none() {
            errors.push(EngineError::new(
                ErrorKind::InvalidAnchorDate,
                format!("Anchor date '{}' is not a valid ISO date", request.anchor_date),
                vec![],
            ));
        }

        let graph = match TaskGraph::build(&request.tasks) {
            Ok(graph) => Some(graph),
            Err(graph_errors) => {
                errors.extend(graph_errors.into_iter().map(EngineError::from));
                None
            }
        };

        let (Some(anchor), Some(mut graph)) = (anchor, graph) else {
            return Err(errors.into());
        };

        if self.config.dangling_dependency_policy == DanglingDependencyPolicy::SequentialFallback {
            for link in graph.apply_sequential_fallback() {
                let replaced: Vec<&str> =
                    link.replaced.iter().map(|d| d.predecessor_id.as_str()).collect();
                log_changes!(
                    verbosity,
                    "[engine] {} depends on missing {:?}; placed after {}",
                    graph.name(link.task),
                    replaced,
                    link.placed_after.map_or("nothing", |p| graph.name(p))
                );
            }
        }

        if let Validation::Invalid(validation_errors) =
            DependencyValidator::new(verbosity).validate(&graph)
        {
            log_changes!(
                verbosity,
                "[engine] validation failed with {} error(s)",
                validation_errors.len()
            );
            return Err(validation_errors
                .into_iter()
                .map(EngineError::from)
                .collect::<Vec<_>>()
                .into());
        }

        let cpm = CriticalPathCalculator::new(verbosity)
            .calculate(&graph)
            .map_err(|e| ScheduleFailure::from(vec![EngineError::from(e)]))?;
        log_checks!(
            verbosity,
            "[engine] project duration {} days, critical path {:?}",
            cpm.project_duration,
            cpm.critical_path_ids(&graph)
        );

        let calendar = self.calendar_for(request);
        let placement = AnchorPlacement {
            anchor,
            allow_non_working_day: request.allow_anchor_on_non_working_day,
        };
        let ranges = DateAssigner::new(&calendar, verbosity)
            .assign(&graph, &cpm, &placement)
            .map_err(|e| ScheduleFailure::from(vec![EngineError::from(e)]))?;

        let scheduled_tasks = graph
            .nodes()
            .iter()
            .map(|node| {
                let timing = cpm.timing(node.id);
                let range = ranges[node.id as usize];
                ScheduledTask {
                    id: node.task.id.clone(),
                    duration: node.task.duration,
                    asset_id: node.task.asset_id.clone(),
                    dependencies: node.task.dependencies.clone(),
                    start: range.start,
                    end: range.end,
                    is_critical: timing.is_critical(),
                    total_float: timing.slack,
                }
            })
            .collect();

        Ok(Schedule {
            scheduled_tasks,
            project_duration: cpm.project_duration,
            critical_path: cpm.critical_path_ids(&graph),
        })
    }

    /// Pre-check one dependency before a caller adds it to `tasks`.
    ///
    /// Structural problems with `tasks` themselves are returned as a failure;
    /// otherwise the candidate's [`Validation`] is returned.
    pub fn validate_dependency(
        &self,
        tasks: &[Task],
        predecessor_id: &str,
        successor_id: &str,
        lag: i32,
    ) -> Result<Validation, ScheduleFailure> {
        let graph = TaskGraph::build(tasks).map_err(|errs| {
            ScheduleFailure::from(errs.into_iter().map(EngineError::from).collect::<Vec<_>>())
        })?;
        Ok(DependencyValidator::new(self.config.verbosity).validate_candidate(
            predecessor_id,
            successor_id,
            lag,
            &graph,
        ))
    }
}

/// Schedule a request with the given configuration.
pub fn schedule(
    request: &ScheduleRequest,
    config: &SchedulerConfig,
) -> Result<Schedule, ScheduleFailure> {
    SchedulingEngine::new(config.clone()).schedule(request)
}
