//! Critical path method over a validated task graph.
//!
//! Works purely in the working-day offset domain; mapping offsets to
//! calendar dates is the job of [`crate::assignment`].

mod calculation;
mod types;

pub use calculation::{
    calculate_critical_path, topological_order, CriticalPathCalculator, CriticalPathError,
    CriticalPathResult,
};
pub use types::TaskTiming;
