//! Mapping CPM offsets onto calendar dates.
//!
//! Offset 0 is the anchor date snapped forward to a working day and each
//! further offset is the next working day, so a task's dates come from
//! walking the calendar rather than from plain date arithmetic.
//!
//! Dates are assigned by a fold over the topological order. Each task
//! starts at its mapped offset unless an already-dated predecessor pushes it
//! later, which makes any correction cascade to everything downstream.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::{CalendarError, WorkingDayCalendar};
use crate::critical_path::{topological_order, CriticalPathError, CriticalPathResult};
use crate::graph::{TaskGraph, TaskNode};
use crate::interner::NodeId;
use crate::{log_changes, log_checks, log_debug};

/// Errors that can occur while assigning dates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignmentError {
    #[error("Could not anchor the schedule at {anchor}: {source}")]
    Anchor {
        anchor: NaiveDate,
        #[source]
        source: CalendarError,
    },
    #[error("Sequential placement of unresolved dependencies failed: {0}")]
    Fallback(#[from] CriticalPathError),
    #[error("Could not place task '{task_id}': {source}")]
    Calendar {
        task_id: String,
        #[source]
        source: CalendarError,
    },
    #[error("Task '{task_id}' has an offset of {offset} days, outside the supported range")]
    OffsetOutOfRange { task_id: String, offset: i64 },
}

/// Inclusive date range occupied by a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// How day 0 is anchored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnchorPlacement {
    pub anchor: NaiveDate,
    /// Let the go-live task sit on the raw anchor date even when that date
    /// is not a working day. The go-live task is a standalone one-day task
    /// (no predecessors, no successors) starting at offset 0. When several
    /// tasks qualify, only the last one in input order is pinned.
    pub allow_non_working_day: bool,
}

impl AnchorPlacement {
    pub fn new(anchor: NaiveDate) -> Self {
        Self {
            anchor,
            allow_non_working_day: false,
        }
    }
}

/// Assigns calendar dates to CPM offsets.
pub struct DateAssigner<'a> {
    calendar: &'a WorkingDayCalendar,
    verbosity: u8,
}

impl<'a> DateAssigner<'a> {
    pub fn new(calendar: &'a WorkingDayCalendar, verbosity: u8) -> Self {
        Self {
            calendar,
            verbosity,
        }
    }

    /// Assign a date range to every node, indexed by node id.
    pub fn assign(
        &self,
        graph: &TaskGraph,
        cpm: &CriticalPathResult,
        placement: &AnchorPlacement,
    ) -> Result<Vec<DateRange>, AssignmentError> {
        let base = self
            .calendar
            .snap_forward(placement.anchor)
            .map_err(|source| AssignmentError::Anchor {
                anchor: placement.anchor,
                source,
            })?;
        let pin_go_live =
            placement.allow_non_working_day && !self.calendar.is_working_day(placement.anchor);
        log_debug!(
            self.verbosity,
            "[assign] anchor {} -> day 0 = {}",
            placement.anchor,
            base
        );

        // References that no longer resolve still mean "not first": those
        // tasks fall in behind the previous task of their asset.
        let resolved;
        let (graph, order) = if graph.has_dangling() {
            let mut patched = graph.clone();
            for link in patched.apply_sequential_fallback() {
                log_changes!(
                    self.verbosity,
                    "[assign] {} has unresolved dependencies, placed after {}",
                    patched.name(link.task),
                    link.placed_after.map_or("nothing", |p| patched.name(p))
                );
            }
            let order = topological_order(&patched)?;
            resolved = patched;
            (&resolved, order)
        } else {
            (graph, cpm.topo_order.clone())
        };

        let go_live = if pin_go_live {
            go_live_task(graph, cpm)
        } else {
            None
        };

        let mut ranges: Vec<Option<DateRange>> = vec![None; graph.len()];
        for &id in &order {
            let node = graph.node(id);
            let early_start = cpm.timing(id).early_start;

            let range = if go_live == Some(id) {
                log_changes!(
                    self.verbosity,
                    "[assign] go-live task {} pinned to non-working anchor {}",
                    node.task_id(),
                    placement.anchor
                );
                DateRange {
                    start: placement.anchor,
                    end: placement.anchor,
                }
            } else {
                self.place(graph, node, early_start, base, &ranges)?
            };
            ranges[id as usize] = Some(range);
        }

        ranges
            .into_iter()
            .enumerate()
            .map(|(idx, range)| {
                range.ok_or_else(|| AssignmentError::OffsetOutOfRange {
                    task_id: graph.name(idx as NodeId).to_string(),
                    offset: cpm.timings[idx].early_start,
                })
            })
            .collect()
    }

    fn place(
        &self,
        graph: &TaskGraph,
        node: &TaskNode,
        early_start: i64,
        base: NaiveDate,
        ranges: &[Option<DateRange>],
    ) -> Result<DateRange, AssignmentError> {
        let calendar_err = |source: CalendarError| AssignmentError::Calendar {
            task_id: node.task_id().to_string(),
            source,
        };
        let offset = u32::try_from(early_start).map_err(|_| AssignmentError::OffsetOutOfRange {
            task_id: node.task_id().to_string(),
            offset: early_start,
        })?;

        let mapped = self
            .calendar
            .working_day_index(base, offset)
            .map_err(calendar_err)?;
        let mut start = mapped;

        for edge in &node.predecessors {
            let Some(pred) = ranges[edge.node as usize] else {
                continue;
            };
            let required = self
                .earliest_after(pred.end, edge.lag)
                .map_err(calendar_err)?;
            log_checks!(
                self.verbosity,
                "[assign] {} after {} (lag {}): needs {}, has {}",
                node.task_id(),
                graph.name(edge.node),
                edge.lag,
                required,
                start
            );
            if required > start {
                log_changes!(
                    self.verbosity,
                    "[assign] {} moved {} -> {} to follow {}",
                    node.task_id(),
                    start,
                    required,
                    graph.name(edge.node)
                );
                start = required;
            }
            // Finish-to-start: adjacent tasks never share a day.
            debug_assert!(
                edge.lag != 0 || start > pred.end,
                "{} starts {} but {} ends {}",
                node.task_id(),
                start,
                graph.name(edge.node),
                pred.end
            );
        }

        let end = self
            .calendar
            .add_working_days(start, node.task.duration)
            .map_err(calendar_err)?;
        log_debug!(
            self.verbosity,
            "[assign] {}: offset {} -> {}..{}",
            node.task_id(),
            early_start,
            start,
            end
        );
        Ok(DateRange { start, end })
    }

    /// Earliest start allowed by a predecessor ending on `pred_end`.
    ///
    /// Lag 0 is the next working day; positive lag skips that many more
    /// working days; negative lag backs into the predecessor's own span.
    fn earliest_after(&self, pred_end: NaiveDate, lag: i64) -> Result<NaiveDate, CalendarError> {
        if lag >= 0 {
            let next = self.calendar.next_working_day(pred_end)?;
            let skip = u32::try_from(lag).map_err(|_| CalendarError::OutOfRange { from: pred_end })?;
            self.calendar.working_day_index(next, skip)
        } else {
            let back = u32::try_from(-lag).map_err(|_| CalendarError::OutOfRange { from: pred_end })?;
            self.calendar.subtract_working_days(pred_end, back)
        }
    }
}

fn is_go_live(node: &TaskNode) -> bool {
    node.is_root() && node.is_sink() && node.task.duration == 1
}

/// The single task allowed onto a non-working anchor: the last standalone
/// one-day task at offset 0, in input order.
fn go_live_task(graph: &TaskGraph, cpm: &CriticalPathResult) -> Option<NodeId> {
    graph
        .nodes()
        .iter()
        .rev()
        .find(|node| is_go_live(node) && cpm.timing(node.id).early_start == 0)
        .map(|node| node.id)
}
