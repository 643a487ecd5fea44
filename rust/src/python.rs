//! Python bindings.
//!
//! Thin wrappers around the engine types; all scheduling happens in Rust
//! and failures surface as `ValueError`.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use chrono::NaiveDate;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{DanglingDependencyPolicy, SchedulerConfig};
use crate::engine::SchedulingEngine;
use crate::models::{Schedule, ScheduleRequest, ScheduledTask, Task};
use crate::validation::ValidationError;

/// Task input (PyO3 wrapper).
#[pyclass(name = "Task")]
#[derive(Clone, Debug)]
pub struct PyTask {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    pub duration: u32,
    #[pyo3(get, set)]
    pub asset_id: String,
    /// `(predecessor_id, lag)` pairs, all finish-to-start.
    #[pyo3(get, set)]
    pub dependencies: Vec<(String, i32)>,
}

#[pymethods]
impl PyTask {
    #[new]
    #[pyo3(signature = (id, duration, asset_id, dependencies=Vec::new()))]
    fn new(id: String, duration: u32, asset_id: String, dependencies: Vec<(String, i32)>) -> Self {
        Self {
            id,
            duration,
            asset_id,
            dependencies,
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "Task(id={:?}, duration={}, asset_id={:?}, dependencies={:?})",
            self.id, self.duration, self.asset_id, self.dependencies
        )
    }
}

impl From<PyTask> for Task {
    fn from(py: PyTask) -> Self {
        py.dependencies
            .into_iter()
            .fold(Task::new(py.id, py.duration, py.asset_id), |task, (pred, lag)| {
                task.after(pred, lag)
            })
    }
}

/// One scheduled task (PyO3 wrapper).
#[pyclass(name = "ScheduledTask")]
#[derive(Clone, Debug)]
pub struct PyScheduledTask {
    #[pyo3(get)]
    pub id: String,
    #[pyo3(get)]
    pub asset_id: String,
    #[pyo3(get)]
    pub duration: u32,
    #[pyo3(get)]
    pub start: NaiveDate,
    #[pyo3(get)]
    pub end: NaiveDate,
    #[pyo3(get)]
    pub is_critical: bool,
    #[pyo3(get)]
    pub total_float: i64,
}

#[pymethods]
impl PyScheduledTask {
    fn __repr__(&self) -> String {
        format!(
            "ScheduledTask(id={:?}, start={}, end={}, is_critical={})",
            self.id, self.start, self.end, self.is_critical
        )
    }
}

impl From<ScheduledTask> for PyScheduledTask {
    fn from(task: ScheduledTask) -> Self {
        Self {
            id: task.id,
            asset_id: task.asset_id,
            duration: task.duration,
            start: task.start,
            end: task.end,
            is_critical: task.is_critical,
            total_float: task.total_float,
        }
    }
}

/// Schedule result (PyO3 wrapper).
#[pyclass(name = "Schedule")]
#[derive(Clone, Debug)]
pub struct PySchedule {
    #[pyo3(get)]
    pub scheduled_tasks: Vec<PyScheduledTask>,
    #[pyo3(get)]
    pub project_duration: i64,
    #[pyo3(get)]
    pub critical_path: Vec<String>,
}

impl From<Schedule> for PySchedule {
    fn from(schedule: Schedule) -> Self {
        Self {
            scheduled_tasks: schedule
                .scheduled_tasks
                .into_iter()
                .map(PyScheduledTask::from)
                .collect(),
            project_duration: schedule.project_duration,
            critical_path: schedule.critical_path,
        }
    }
}

/// A single validation problem (PyO3 wrapper).
#[pyclass(name = "ValidationIssue")]
#[derive(Clone, Debug)]
pub struct PyValidationIssue {
    #[pyo3(get)]
    pub kind: String,
    #[pyo3(get)]
    pub message: String,
    #[pyo3(get)]
    pub involved_task_ids: Vec<String>,
}

impl From<&ValidationError> for PyValidationIssue {
    fn from(err: &ValidationError) -> Self {
        Self {
            kind: format!("{:?}", err.kind),
            message: err.message.clone(),
            involved_task_ids: err.involved_task_ids.clone(),
        }
    }
}

fn engine(verbosity: u8, dangling_policy: Option<&str>) -> PyResult<SchedulingEngine> {
    let policy = dangling_policy
        .map(str::parse::<DanglingDependencyPolicy>)
        .transpose()
        .map_err(PyValueError::new_err)?;
    Ok(SchedulingEngine::new(SchedulerConfig::from_overrides(
        Some(verbosity),
        policy,
        None,
    )))
}

/// Schedule tasks onto working days starting at `anchor_date`.
///
/// # Raises
/// * ValueError listing every problem if the tasks cannot be scheduled
#[pyfunction]
#[pyo3(signature = (
    tasks,
    anchor_date,
    holidays=Vec::new(),
    allow_anchor_on_non_working_day=false,
    dangling_policy=None,
    verbosity=0
))]
fn schedule_tasks(
    tasks: Vec<PyTask>,
    anchor_date: String,
    holidays: Vec<String>,
    allow_anchor_on_non_working_day: bool,
    dangling_policy: Option<&str>,
    verbosity: u8,
) -> PyResult<PySchedule> {
    let engine = engine(verbosity, dangling_policy)?;
    let mut request = ScheduleRequest::new(tasks.into_iter().map(Task::from).collect(), anchor_date)
        .with_holidays(holidays);
    request.allow_anchor_on_non_working_day = allow_anchor_on_non_working_day;

    engine
        .schedule(&request)
        .map(PySchedule::from)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Check whether `predecessor_id -> successor_id` may be added to `tasks`.
///
/// Returns an empty list when the dependency is acceptable.
#[pyfunction]
#[pyo3(signature = (tasks, predecessor_id, successor_id, lag=0, verbosity=0))]
fn validate_dependency(
    tasks: Vec<PyTask>,
    predecessor_id: &str,
    successor_id: &str,
    lag: i32,
    verbosity: u8,
) -> PyResult<Vec<PyValidationIssue>> {
    let tasks: Vec<Task> = tasks.into_iter().map(Task::from).collect();
    let validation = engine(verbosity, None)?
        .validate_dependency(&tasks, predecessor_id, successor_id, lag)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(validation.errors().iter().map(PyValidationIssue::from).collect())
}

#[pymodule]
fn runway_rust(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Data types
    m.add_class::<PyTask>()?;
    m.add_class::<PyScheduledTask>()?;
    m.add_class::<PySchedule>()?;
    m.add_class::<PyValidationIssue>()?;

    // Engine
    m.add_function(wrap_pyfunction!(schedule_tasks, m)?)?;
    m.add_function(wrap_pyfunction!(validate_dependency, m)?)?;

    Ok(())
}
