//! Types for critical path calculation.

use serde::{Deserialize, Serialize};

/// Per-task timing from the forward and backward passes.
///
/// All values are working-day offsets from day 0 (the anchor). A task with
/// `early_start = 2` and duration 3 occupies offsets 2, 3 and 4, and has
/// `early_finish = 5`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskTiming {
    /// Earliest possible start (forward pass).
    pub early_start: i64,
    /// Earliest possible finish (forward pass).
    pub early_finish: i64,
    /// Latest allowable start (backward pass).
    pub late_start: i64,
    /// Latest allowable finish (backward pass).
    pub late_finish: i64,
    /// Total float: `late_start - early_start`.
    pub slack: i64,
}

impl TaskTiming {
    pub fn is_critical(&self) -> bool {
        self.slack == 0
    }
}
