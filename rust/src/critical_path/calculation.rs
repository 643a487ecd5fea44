//! Critical path calculation using forward and backward passes.

use std::collections::VecDeque;

use thiserror::Error;

use crate::graph::TaskGraph;
use crate::interner::NodeId;
use crate::log_debug;

use super::types::TaskTiming;

/// Error types for critical path calculation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CriticalPathError {
    /// The graph is not acyclic; lists the tasks that could not be ordered.
    #[error("Circular dependency detected among tasks: {}", .0.join(", "))]
    CircularDependency(Vec<String>),
}

/// Result of the critical path calculation for a whole graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CriticalPathResult {
    /// Timing per node, indexed by node id.
    pub timings: Vec<TaskTiming>,
    /// Nodes in the topological order used by both passes.
    pub topo_order: Vec<NodeId>,
    /// Maximum early finish over all sinks.
    ///
    /// Only sinks count, so that the zero-slack chain always ends at a sink.
    /// A predecessor overlapped by a successor that finishes first can run
    /// past this value; use the assigned dates for the full calendar span.
    pub project_duration: i64,
    /// One zero-slack chain from a root to a sink, in that order.
    pub critical_path: Vec<NodeId>,
    /// Sum of all task durations.
    pub total_work: i64,
}

impl CriticalPathResult {
    #[inline]
    pub fn timing(&self, id: NodeId) -> &TaskTiming {
        &self.timings[id as usize]
    }

    pub fn timing_by_id(&self, graph: &TaskGraph, task_id: &str) -> Option<&TaskTiming> {
        graph.id_of(task_id).map(|id| self.timing(id))
    }

    /// Task ids on the reported critical path.
    pub fn critical_path_ids(&self, graph: &TaskGraph) -> Vec<String> {
        self.critical_path
            .iter()
            .map(|&id| graph.name(id).to_string())
            .collect()
    }

    /// Every zero-slack node, in input order. May be a superset of
    /// `critical_path` when several chains tie.
    pub fn critical_nodes(&self) -> Vec<NodeId> {
        (0..self.timings.len() as NodeId)
            .filter(|&id| self.timing(id).is_critical())
            .collect()
    }
}

/// Runs CPM passes over a graph.
#[derive(Clone, Debug, Default)]
pub struct CriticalPathCalculator {
    verbosity: u8,
}

impl CriticalPathCalculator {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    /// Calculate timings, project duration and the critical path.
    ///
    /// The graph is expected to have passed validation; a cycle is still
    /// detected here and reported as an error rather than looping.
    pub fn calculate(&self, graph: &TaskGraph) -> Result<CriticalPathResult, CriticalPathError> {
        let topo_order = topological_order(graph)?;
        let mut timings = vec![TaskTiming::default(); graph.len()];

        // Forward pass: earliest start/finish
        let mut total_work = 0;
        for &id in &topo_order {
            let node = graph.node(id);
            total_work += node.duration();

            let early_start = node
                .predecessors
                .iter()
                .map(|edge| timings[edge.node as usize].early_finish + edge.lag)
                .max()
                .unwrap_or(0)
                .max(0);

            let timing = &mut timings[id as usize];
            timing.early_start = early_start;
            timing.early_finish = early_start + node.duration();
            log_debug!(
                self.verbosity,
                "[cpm] forward {}: ES={} EF={}",
                node.task_id(),
                timing.early_start,
                timing.early_finish
            );
        }

        let project_duration = graph
            .sinks()
            .iter()
            .map(|&id| timings[id as usize].early_finish)
            .max()
            .unwrap_or(0);

        // Backward pass: latest start/finish in reverse topological order
        for &id in topo_order.iter().rev() {
            let node = graph.node(id);
            let late_finish = node
                .successors
                .iter()
                .map(|edge| timings[edge.node as usize].late_start - edge.lag)
                .min()
                .unwrap_or(project_duration);

            let timing = &mut timings[id as usize];
            timing.late_finish = late_finish;
            timing.late_start = late_finish - node.duration();
            timing.slack = timing.late_start - timing.early_start;
            log_debug!(
                self.verbosity,
                "[cpm] backward {}: LS={} LF={} slack={}",
                node.task_id(),
                timing.late_start,
                timing.late_finish,
                timing.slack
            );
        }

        let critical_path = trace_critical_path(graph, &timings);

        Ok(CriticalPathResult {
            timings,
            topo_order,
            project_duration,
            critical_path,
            total_work,
        })
    }
}

/// Calculate the critical path with logging disabled.
pub fn calculate_critical_path(graph: &TaskGraph) -> Result<CriticalPathResult, CriticalPathError> {
    CriticalPathCalculator::default().calculate(graph)
}

/// Kahn's algorithm. The queue is seeded in input order and successors are
/// visited in input order, so the result is reproducible.
pub fn topological_order(graph: &TaskGraph) -> Result<Vec<NodeId>, CriticalPathError> {
    let mut in_degree: Vec<usize> = graph.nodes().iter().map(|n| n.predecessors.len()).collect();

    let mut queue: VecDeque<NodeId> = graph
        .nodes()
        .iter()
        .filter(|n| n.predecessors.is_empty())
        .map(|n| n.id)
        .collect();

    let mut result: Vec<NodeId> = Vec::with_capacity(graph.len());

    while let Some(id) = queue.pop_front() {
        result.push(id);
        for edge in &graph.node(id).successors {
            let degree = &mut in_degree[edge.node as usize];
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(edge.node);
            }
        }
    }

    if result.len() != graph.len() {
        let unprocessed = graph
            .nodes()
            .iter()
            .filter(|n| in_degree[n.id as usize] > 0)
            .map(|n| n.task_id().to_string())
            .collect();
        return Err(CriticalPathError::CircularDependency(unprocessed));
    }

    Ok(result)
}

/// Pick one critical chain deterministically.
///
/// Starts at the sink with the greatest early finish and walks back through
/// driving predecessors (those whose `early_finish + lag` sets this node's
/// early start) that have zero slack. At each join the predecessor with the
/// latest early finish wins; remaining ties go to the earlier input position.
fn trace_critical_path(graph: &TaskGraph, timings: &[TaskTiming]) -> Vec<NodeId> {
    let Some(sink) = graph
        .sinks()
        .into_iter()
        .filter(|&id| timings[id as usize].is_critical())
        .max_by(|&a, &b| {
            timings[a as usize]
                .early_finish
                .cmp(&timings[b as usize].early_finish)
                .then(b.cmp(&a))
        })
    else {
        return Vec::new();
    };

    let mut path = vec![sink];
    let mut current = sink;
    loop {
        let early_start = timings[current as usize].early_start;
        let driver = graph
            .node(current)
            .predecessors
            .iter()
            .filter(|edge| {
                let t = &timings[edge.node as usize];
                t.is_critical() && t.early_finish + edge.lag == early_start
            })
            .map(|edge| edge.node)
            .max_by(|&a, &b| {
                timings[a as usize]
                    .early_finish
                    .cmp(&timings[b as usize].early_finish)
                    .then(b.cmp(&a))
            });
        match driver {
            // Acyclic graph, so this always terminates.
            Some(pred) => {
                path.push(pred);
                current = pred;
            }
            None => break,
        }
    }

    path.reverse();
    path
}
