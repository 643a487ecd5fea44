//! Task graph construction.
//!
//! The builder only indexes tasks and resolves dependency references into
//! edges. It does not judge the result: cycles, overlap bounds and asset
//! boundaries are checked by [`crate::validation`] against the fully built
//! graph, and references to unknown tasks are kept on the node as
//! `dangling` so they can be reported with full context.

use thiserror::Error;

use crate::interner::{NodeId, NodeInterner};
use crate::models::{Dependency, Task};

/// Structural problems that prevent a graph from being built at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Task list is empty")]
    EmptyTaskList,
    #[error("Duplicate task id: {0}")]
    DuplicateTaskId(String),
    #[error("Task '{0}' has a duration of 0 working days; durations must be at least 1")]
    InvalidDuration(String),
}

/// Where an edge came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    /// Declared by the task's dependency list.
    Declared,
    /// Added by [`TaskGraph::apply_sequential_fallback`] for a task whose
    /// declared predecessor no longer exists.
    SequentialFallback,
}

/// A finish-to-start edge as seen from one endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    /// The node at the other end of the edge.
    pub node: NodeId,
    pub lag: i64,
    pub kind: EdgeKind,
}

/// A task plus its resolved neighbourhood.
#[derive(Clone, Debug)]
pub struct TaskNode {
    pub id: NodeId,
    pub task: Task,
    /// Incoming edges, in dependency declaration order.
    pub predecessors: Vec<Edge>,
    /// Outgoing edges, in the order their successors appear in the input.
    pub successors: Vec<Edge>,
    /// Declared dependencies whose predecessor id is not in the graph.
    pub dangling: Vec<Dependency>,
}

impl TaskNode {
    pub fn task_id(&self) -> &str {
        &self.task.id
    }

    pub fn duration(&self) -> i64 {
        i64::from(self.task.duration)
    }

    pub fn asset_id(&self) -> &str {
        &self.task.asset_id
    }

    pub fn is_root(&self) -> bool {
        self.predecessors.is_empty()
    }

    pub fn is_sink(&self) -> bool {
        self.successors.is_empty()
    }
}

/// A sequential-fallback link created for a task with dangling references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackLink {
    pub task: NodeId,
    /// Previous task of the same asset, if there is one.
    pub placed_after: Option<NodeId>,
    pub replaced: Vec<Dependency>,
}

/// Dependency graph over one scheduling run's tasks.
#[derive(Clone, Debug)]
pub struct TaskGraph {
    index: NodeInterner,
    nodes: Vec<TaskNode>,
}

impl TaskGraph {
    /// Build a graph from a flat task list.
    ///
    /// Pass one indexes nodes in input order, pass two resolves every
    /// dependency into a predecessor edge plus a successor back-edge.
    /// All structural errors are collected before returning.
    pub fn build(tasks: &[Task]) -> Result<Self, Vec<GraphError>> {
        if tasks.is_empty() {
            return Err(vec![GraphError::EmptyTaskList]);
        }

        let mut errors = Vec::new();
        let mut index = NodeInterner::with_capacity(tasks.len());
        let mut nodes: Vec<TaskNode> = Vec::with_capacity(tasks.len());

        for task in tasks {
            if task.duration == 0 {
                errors.push(GraphError::InvalidDuration(task.id.clone()));
            }
            match index.insert_unique(&task.id) {
                Ok(id) => nodes.push(TaskNode {
                    id,
                    task: task.clone(),
                    predecessors: Vec::new(),
                    successors: Vec::new(),
                    dangling: Vec::new(),
                }),
                Err(_) => errors.push(GraphError::DuplicateTaskId(task.id.clone())),
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        for succ in 0..nodes.len() {
            let deps = nodes[succ].task.dependencies.clone();
            for dep in deps {
                match index.get(&dep.predecessor_id) {
                    Some(pred) => {
                        link(&mut nodes, pred, succ as NodeId, i64::from(dep.lag), EdgeKind::Declared)
                    }
                    None => nodes[succ].dangling.push(dep),
                }
            }
        }

        Ok(Self { index, nodes })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in input order.
    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &TaskNode {
        &self.nodes[id as usize]
    }

    pub fn node_by_id(&self, task_id: &str) -> Option<&TaskNode> {
        self.index.get(task_id).map(|id| self.node(id))
    }

    #[inline]
    pub fn id_of(&self, task_id: &str) -> Option<NodeId> {
        self.index.get(task_id)
    }

    /// Task id string for a node id.
    pub fn name(&self, id: NodeId) -> &str {
        self.index.resolve(id).unwrap_or_default()
    }

    /// Nodes without resolved predecessors, in input order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes.iter().filter(|n| n.is_root()).map(|n| n.id).collect()
    }

    /// Nodes without successors, in input order.
    pub fn sinks(&self) -> Vec<NodeId> {
        self.nodes.iter().filter(|n| n.is_sink()).map(|n| n.id).collect()
    }

    pub fn has_dangling(&self) -> bool {
        self.nodes.iter().any(|n| !n.dangling.is_empty())
    }

    /// The closest earlier task (in input order) belonging to the same asset.
    pub fn previous_in_asset(&self, id: NodeId) -> Option<NodeId> {
        let asset = self.node(id).asset_id();
        self.nodes[..id as usize]
            .iter()
            .rev()
            .find(|n| n.asset_id() == asset)
            .map(|n| n.id)
    }

    /// A copy of this graph with one extra declared edge.
    ///
    /// Returns `None` if either endpoint is unknown.
    pub fn with_candidate(&self, predecessor_id: &str, successor_id: &str, lag: i32) -> Option<Self> {
        let pred = self.id_of(predecessor_id)?;
        let succ = self.id_of(successor_id)?;
        let mut hypothetical = self.clone();
        hypothetical.nodes[succ as usize]
            .task
            .dependencies
            .push(Dependency::finish_to_start(predecessor_id, lag));
        link(
            &mut hypothetical.nodes,
            pred,
            succ,
            i64::from(lag),
            EdgeKind::Declared,
        );
        Some(hypothetical)
    }

    /// Replace dangling references with sequential placement.
    ///
    /// A task whose declared predecessor no longer exists is linked FS/lag 0
    /// after the previous task of the same asset in input order. The task's
    /// dangling list is cleared either way; a task that is first in its asset
    /// keeps no predecessor.
    pub fn apply_sequential_fallback(&mut self) -> Vec<FallbackLink> {
        let mut links = Vec::new();
        for idx in 0..self.nodes.len() {
            if self.nodes[idx].dangling.is_empty() {
                continue;
            }
            let task = idx as NodeId;
            let replaced = std::mem::take(&mut self.nodes[idx].dangling);
            let previous = self.previous_in_asset(task);

            if let Some(prev) = previous {
                let already_linked = self.nodes[idx].predecessors.iter().any(|e| e.node == prev);
                if !already_linked {
                    link(&mut self.nodes, prev, task, 0, EdgeKind::SequentialFallback);
                }
            }
            links.push(FallbackLink {
                task,
                placed_after: previous,
                replaced,
            });
        }
        links
    }
}

/// Record an edge on both endpoints.
///
/// Successor lists stay sorted by node id so that traversal order matches
/// input order regardless of the order edges were added in.
fn link(nodes: &mut [TaskNode], pred: NodeId, succ: NodeId, lag: i64, kind: EdgeKind) {
    nodes[succ as usize].predecessors.push(Edge {
        node: pred,
        lag,
        kind,
    });
    let successors = &mut nodes[pred as usize].successors;
    let pos = successors.partition_point(|e| e.node <= succ);
    successors.insert(
        pos,
        Edge {
            node: succ,
            lag,
            kind,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_task(id: &str, duration: u32, deps: Vec<(&str, i32)>) -> Task {
        deps.into_iter()
            .fold(Task::new(id, duration, "asset-1"), |t, (dep, lag)| t.after(dep, lag))
    }

    #[test]
    fn test_build_resolves_edges_both_ways() {
        let tasks = vec![
            make_task("a", 2, vec![]),
            make_task("b", 3, vec![("a", 0)]),
            make_task("c", 1, vec![("a", -1), ("b", 2)]),
        ];
        let graph = TaskGraph::build(&tasks).unwrap();

        let a = graph.node_by_id("a").unwrap();
        assert_eq!(
            a.successors.iter().map(|e| e.node).collect::<Vec<_>>(),
            vec![1, 2]
        );
        let c = graph.node_by_id("c").unwrap();
        assert_eq!(c.predecessors.len(), 2);
        assert_eq!(c.predecessors[0].lag, -1);
        assert_eq!(c.predecessors[1].lag, 2);

        assert_eq!(graph.roots(), vec![0]);
        assert_eq!(graph.sinks(), vec![2]);
    }

    #[test]
    fn test_empty_task_list() {
        assert_eq!(
            TaskGraph::build(&[]).unwrap_err(),
            vec![GraphError::EmptyTaskList]
        );
    }

    #[test]
    fn test_duplicate_ids_and_zero_durations_are_collected() {
        let tasks = vec![
            make_task("a", 1, vec![]),
            make_task("a", 2, vec![]),
            make_task("b", 0, vec![]),
        ];
        let errors = TaskGraph::build(&tasks).unwrap_err();
        assert_eq!(
            errors,
            vec![
                GraphError::DuplicateTaskId("a".to_string()),
                GraphError::InvalidDuration("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_unknown_predecessor_is_kept_as_dangling() {
        let tasks = vec![make_task("a", 1, vec![("ghost", 0)])];
        let graph = TaskGraph::build(&tasks).unwrap();
        let a = graph.node(0);
        assert!(a.predecessors.is_empty());
        assert_eq!(a.dangling[0].predecessor_id, "ghost");
        assert!(graph.has_dangling());
    }

    #[test]
    fn test_builder_accepts_cycles() {
        let tasks = vec![make_task("a", 1, vec![("b", 0)]), make_task("b", 1, vec![("a", 0)])];
        let graph = TaskGraph::build(&tasks).unwrap();
        assert!(graph.roots().is_empty());
        assert!(graph.sinks().is_empty());
    }

    #[test]
    fn test_with_candidate_leaves_original_untouched() {
        let tasks = vec![make_task("a", 2, vec![]), make_task("b", 1, vec![])];
        let graph = TaskGraph::build(&tasks).unwrap();
        let hypothetical = graph.with_candidate("a", "b", -1).unwrap();

        assert!(graph.node(1).predecessors.is_empty());
        assert_eq!(hypothetical.node(1).predecessors[0].node, 0);
        assert_eq!(hypothetical.node(1).task.dependencies.len(), 1);
        assert!(graph.with_candidate("a", "missing", 0).is_none());
    }

    #[test]
    fn test_sequential_fallback_links_previous_task_of_same_asset() {
        let tasks = vec![
            Task::new("t1", 3, "x"),
            Task::new("other", 1, "y"),
            Task::new("t2", 3, "x").after("t1", -2),
            Task::new("c", 2, "x").after("deleted", 0),
            Task::new("lonely", 1, "z").after("deleted", 0),
        ];
        let mut graph = TaskGraph::build(&tasks).unwrap();
        let links = graph.apply_sequential_fallback();

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].task, 3);
        assert_eq!(links[0].placed_after, Some(2));
        assert_eq!(links[1].placed_after, None);

        let c = graph.node_by_id("c").unwrap();
        assert!(c.dangling.is_empty());
        assert_eq!(
            c.predecessors,
            vec![Edge {
                node: 2,
                lag: 0,
                kind: EdgeKind::SequentialFallback
            }]
        );
        assert!(!graph.has_dangling());
    }
}
