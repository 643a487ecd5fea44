//! Semantic validation of a built task graph.
//!
//! Four independent checks run against the whole graph and every violation
//! is collected:
//! 1. dangling references to unknown predecessors
//! 2. dependency cycles (reported with the full cycle path)
//! 3. overlap bounds: a negative lag must be shorter than the predecessor
//! 4. asset boundaries: both ends of a dependency share an asset
//!
//! [`DependencyValidator::validate_candidate`] answers "may I add this one
//! dependency?" by running the same edge checks and the same cycle search
//! against a copy of the graph that already contains the candidate edge.

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::graph::{EdgeKind, TaskGraph};
use crate::interner::NodeId;
use crate::log_checks;

/// Categories of validation failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationErrorKind {
    DanglingDependency,
    CircularDependency,
    OverlapExceedsDuration,
    CrossAssetDependency,
}

/// One validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub message: String,
    pub involved_task_ids: Vec<String>,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: String, involved: Vec<String>) -> Self {
        Self {
            kind,
            message,
            involved_task_ids: involved,
        }
    }
}

/// Outcome of validating a graph or a candidate dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid(Vec<ValidationError>),
}

impl Validation {
    fn from_errors(errors: Vec<ValidationError>) -> Self {
        if errors.is_empty() {
            Validation::Valid
        } else {
            Validation::Invalid(errors)
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn errors(&self) -> &[ValidationError] {
        match self {
            Validation::Valid => &[],
            Validation::Invalid(errors) => errors,
        }
    }

    pub fn into_result(self) -> Result<(), Vec<ValidationError>> {
        match self {
            Validation::Valid => Ok(()),
            Validation::Invalid(errors) => Err(errors),
        }
    }
}

/// Dependency validator.
#[derive(Clone, Debug, Default)]
pub struct DependencyValidator {
    verbosity: u8,
}

impl DependencyValidator {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    /// Run all checks against `graph`.
    pub fn validate(&self, graph: &TaskGraph) -> Validation {
        let mut errors = check_dangling(graph);

        for cycle in find_cycles(graph, None) {
            errors.push(cycle_error(graph, &cycle));
        }

        let mut overlap_errors = Vec::new();
        let mut asset_errors = Vec::new();
        for node in graph.nodes() {
            for edge in &node.predecessors {
                log_checks!(
                    self.verbosity,
                    "[validate] {} -> {} (lag {}, {:?})",
                    graph.name(edge.node),
                    node.task_id(),
                    edge.lag,
                    edge.kind
                );
                overlap_errors.extend(check_overlap(graph, edge.node, node.id, edge.lag));
                asset_errors.extend(check_asset_boundary(graph, edge.node, node.id));
            }
        }
        errors.extend(overlap_errors);
        errors.extend(asset_errors);

        log_checks!(
            self.verbosity,
            "[validate] {} tasks checked, {} problems",
            graph.len(),
            errors.len()
        );
        Validation::from_errors(errors)
    }

    /// Check whether adding `predecessor_id -> successor_id` with `lag` would
    /// keep the graph valid. Existing problems unrelated to the candidate
    /// edge are not reported.
    pub fn validate_candidate(
        &self,
        predecessor_id: &str,
        successor_id: &str,
        lag: i32,
        graph: &TaskGraph,
    ) -> Validation {
        let mut errors = Vec::new();
        for id in [predecessor_id, successor_id] {
            if graph.id_of(id).is_none() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::DanglingDependency,
                    format!(
                        "Dependency '{}' -> '{}' refers to unknown task '{}'",
                        predecessor_id, successor_id, id
                    ),
                    vec![successor_id.to_string(), predecessor_id.to_string()],
                ));
            }
        }
        let Some(hypothetical) = graph.with_candidate(predecessor_id, successor_id, lag) else {
            return Validation::from_errors(errors);
        };
        let (Some(pred), Some(succ)) = (
            hypothetical.id_of(predecessor_id),
            hypothetical.id_of(successor_id),
        ) else {
            return Validation::from_errors(errors);
        };

        log_checks!(
            self.verbosity,
            "[validate] candidate {} -> {} (lag {})",
            predecessor_id,
            successor_id,
            lag
        );

        // Seeding the search at the successor keeps it on the DFS stack for
        // the whole traversal, so any path back to the predecessor shows up
        // as a back-edge over the candidate.
        for cycle in find_cycles(&hypothetical, Some(succ)) {
            if contains_edge(&cycle, pred, succ) {
                errors.push(cycle_error(&hypothetical, &cycle));
            }
        }
        errors.extend(check_overlap(&hypothetical, pred, succ, i64::from(lag)));
        errors.extend(check_asset_boundary(&hypothetical, pred, succ));

        Validation::from_errors(errors)
    }
}

/// Validate a whole graph with logging disabled.
pub fn validate(graph: &TaskGraph) -> Validation {
    DependencyValidator::default().validate(graph)
}

/// Validate a single candidate dependency with logging disabled.
pub fn validate_candidate(
    predecessor_id: &str,
    successor_id: &str,
    lag: i32,
    graph: &TaskGraph,
) -> Validation {
    DependencyValidator::default().validate_candidate(predecessor_id, successor_id, lag, graph)
}

fn check_dangling(graph: &TaskGraph) -> Vec<ValidationError> {
    graph
        .nodes()
        .iter()
        .flat_map(|node| {
            node.dangling.iter().map(move |dep| {
                ValidationError::new(
                    ValidationErrorKind::DanglingDependency,
                    format!(
                        "Task '{}' depends on unknown task '{}'",
                        node.task_id(),
                        dep.predecessor_id
                    ),
                    vec![node.task_id().to_string(), dep.predecessor_id.clone()],
                )
            })
        })
        .collect()
}

/// Overlap must be strictly shorter than the predecessor.
fn check_overlap(
    graph: &TaskGraph,
    pred: NodeId,
    succ: NodeId,
    lag: i64,
) -> Option<ValidationError> {
    if lag >= 0 {
        return None;
    }
    let p = graph.node(pred);
    let s = graph.node(succ);
    let overlap = -lag;
    if overlap < p.duration() {
        return None;
    }
    Some(ValidationError::new(
        ValidationErrorKind::OverlapExceedsDuration,
        format!(
            "Task '{}' ({} days) overlaps predecessor '{}' ({} days) by {} days; \
             overlap must be shorter than the predecessor",
            s.task_id(),
            s.duration(),
            p.task_id(),
            p.duration(),
            overlap
        ),
        vec![p.task_id().to_string(), s.task_id().to_string()],
    ))
}

fn check_asset_boundary(graph: &TaskGraph, pred: NodeId, succ: NodeId) -> Option<ValidationError> {
    let p = graph.node(pred);
    let s = graph.node(succ);
    if p.asset_id() == s.asset_id() {
        return None;
    }
    Some(ValidationError::new(
        ValidationErrorKind::CrossAssetDependency,
        format!(
            "Task '{}' (asset '{}') depends on '{}' (asset '{}'); dependencies cannot cross assets",
            s.task_id(),
            s.asset_id(),
            p.task_id(),
            p.asset_id()
        ),
        vec![p.task_id().to_string(), s.task_id().to_string()],
    ))
}

fn cycle_error(graph: &TaskGraph, cycle: &[NodeId]) -> ValidationError {
    let names: Vec<String> = cycle.iter().map(|&id| graph.name(id).to_string()).collect();
    let mut path = names.join(" -> ");
    if let Some(first) = names.first() {
        path.push_str(" -> ");
        path.push_str(first);
    }
    let fallback_involved = cycle.iter().any(|&id| {
        graph
            .node(id)
            .predecessors
            .iter()
            .any(|e| e.kind == EdgeKind::SequentialFallback && cycle.contains(&e.node))
    });
    let suffix = if fallback_involved {
        " (includes a sequential fallback link)"
    } else {
        ""
    };
    ValidationError::new(
        ValidationErrorKind::CircularDependency,
        format!("Circular dependency: {}{}", path, suffix),
        names,
    )
}

/// Whether `pred -> succ` appears as consecutive entries of a closed cycle.
fn contains_edge(cycle: &[NodeId], pred: NodeId, succ: NodeId) -> bool {
    let n = cycle.len();
    (0..n).any(|i| cycle[i] == pred && cycle[(i + 1) % n] == succ)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Depth-first cycle search with white/gray/black coloring.
///
/// Each back-edge into the current DFS path yields one cycle, listed in
/// traversal order. Roots are visited in input order, optionally starting
/// with `first`. Cycles that are rotations of one another are reported once.
///
/// Back-edges alone can miss nodes whose cycles only close through an
/// already finished node, so every strongly connected component is then
/// checked and each member not yet named gets its shortest cycle reported.
fn find_cycles(graph: &TaskGraph, first: Option<NodeId>) -> Vec<Vec<NodeId>> {
    let n = graph.len();
    let mut color = vec![Color::White; n];
    let mut position = vec![usize::MAX; n];
    let mut path: Vec<NodeId> = Vec::new();
    let mut seen: FxHashSet<Vec<NodeId>> = FxHashSet::default();
    let mut cycles = Vec::new();

    let seeds = first
        .into_iter()
        .chain((0..n as NodeId).filter(move |&id| Some(id) != first));

    for root in seeds {
        if color[root as usize] != Color::White {
            continue;
        }
        color[root as usize] = Color::Gray;
        position[root as usize] = path.len();
        path.push(root);
        // (node, index of next successor to examine)
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let successors = &graph.node(node).successors;
            if frame.1 < successors.len() {
                let next = successors[frame.1].node;
                frame.1 += 1;
                match color[next as usize] {
                    Color::White => {
                        color[next as usize] = Color::Gray;
                        position[next as usize] = path.len();
                        path.push(next);
                        stack.push((next, 0));
                    }
                    Color::Gray => {
                        let cycle = path[position[next as usize]..].to_vec();
                        if seen.insert(canonical_rotation(&cycle)) {
                            cycles.push(cycle);
                        }
                    }
                    Color::Black => {}
                }
            } else {
                color[node as usize] = Color::Black;
                position[node as usize] = usize::MAX;
                path.pop();
                stack.pop();
            }
        }
    }

    let mut covered: FxHashSet<NodeId> = cycles.iter().flatten().copied().collect();
    for component in strongly_connected(graph) {
        if component.len() < 2 {
            continue;
        }
        let members: FxHashSet<NodeId> = component.iter().copied().collect();
        for &node in &component {
            if covered.contains(&node) {
                continue;
            }
            if let Some(cycle) = shortest_cycle_through(graph, node, &members) {
                covered.extend(cycle.iter().copied());
                if seen.insert(canonical_rotation(&cycle)) {
                    cycles.push(cycle);
                }
            }
        }
    }

    cycles
}

/// Tarjan's strongly connected components, iterative.
///
/// Members of each component are sorted by node id and components are
/// ordered by their smallest member.
fn strongly_connected(graph: &TaskGraph) -> Vec<Vec<NodeId>> {
    const UNVISITED: usize = usize::MAX;
    let n = graph.len();
    let mut index = vec![UNVISITED; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<NodeId> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    for root in 0..n as NodeId {
        if index[root as usize] != UNVISITED {
            continue;
        }
        index[root as usize] = next_index;
        low[root as usize] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root as usize] = true;
        let mut work: Vec<(NodeId, usize)> = vec![(root, 0)];

        while let Some(frame) = work.last_mut() {
            let node = frame.0;
            let successors = &graph.node(node).successors;
            if frame.1 < successors.len() {
                let next = successors[frame.1].node;
                frame.1 += 1;
                if index[next as usize] == UNVISITED {
                    index[next as usize] = next_index;
                    low[next as usize] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next as usize] = true;
                    work.push((next, 0));
                } else if on_stack[next as usize] {
                    low[node as usize] = low[node as usize].min(index[next as usize]);
                }
            } else {
                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    low[parent as usize] = low[parent as usize].min(low[node as usize]);
                }
                if low[node as usize] == index[node as usize] {
                    let mut component = Vec::new();
                    while let Some(member) = stack.pop() {
                        on_stack[member as usize] = false;
                        component.push(member);
                        if member == node {
                            break;
                        }
                    }
                    component.sort_unstable();
                    components.push(component);
                }
            }
        }
    }

    components.sort_unstable_by_key(|c| c[0]);
    components
}

/// Breadth-first search for the shortest cycle through `start` that stays
/// inside `members`. Returned starting at `start`, without repeating it.
fn shortest_cycle_through(
    graph: &TaskGraph,
    start: NodeId,
    members: &FxHashSet<NodeId>,
) -> Option<Vec<NodeId>> {
    let mut parent: FxHashMap<NodeId, NodeId> = FxHashMap::default();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for edge in &graph.node(node).successors {
            let next = edge.node;
            if !members.contains(&next) {
                continue;
            }
            if next == start {
                let mut cycle = vec![node];
                let mut current = node;
                while current != start {
                    current = *parent.get(&current)?;
                    cycle.push(current);
                }
                cycle.reverse();
                return Some(cycle);
            }
            if !parent.contains_key(&next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    None
}

fn canonical_rotation(cycle: &[NodeId]) -> Vec<NodeId> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, &id)| id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    fn make_task(id: &str, duration: u32, deps: Vec<(&str, i32)>) -> Task {
        deps.into_iter()
            .fold(Task::new(id, duration, "asset-1"), |t, (dep, lag)| t.after(dep, lag))
    }

    fn graph_of(tasks: Vec<Task>) -> TaskGraph {
        TaskGraph::build(&tasks).unwrap()
    }

    fn kinds(validation: &Validation) -> Vec<ValidationErrorKind> {
        validation.errors().iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_valid_chain() {
        let graph = graph_of(vec![
            make_task("a", 5, vec![]),
            make_task("b", 3, vec![("a", 0)]),
            make_task("c", 1, vec![("b", -2)]),
        ]);
        assert_eq!(validate(&graph), Validation::Valid);
    }

    #[test]
    fn test_cycle_reports_full_path() {
        let graph = graph_of(vec![
            make_task("a", 1, vec![("c", 0)]),
            make_task("b", 1, vec![("a", 0)]),
            make_task("c", 1, vec![("b", 0)]),
            make_task("d", 1, vec![("a", 0)]),
        ]);
        let result = validate(&graph);
        assert_eq!(kinds(&result), vec![ValidationErrorKind::CircularDependency]);
        let err = &result.errors()[0];
        assert_eq!(err.involved_task_ids, vec!["a", "b", "c"]);
        assert!(err.message.contains("a -> b -> c -> a"));
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let graph = graph_of(vec![make_task("a", 2, vec![("a", 0)])]);
        let result = validate(&graph);
        assert_eq!(kinds(&result), vec![ValidationErrorKind::CircularDependency]);
        assert_eq!(result.errors()[0].involved_task_ids, vec!["a"]);
    }

    #[test]
    fn test_two_disjoint_cycles_both_reported() {
        let graph = graph_of(vec![
            make_task("a", 1, vec![("b", 0)]),
            make_task("b", 1, vec![("a", 0)]),
            make_task("c", 1, vec![("d", 0)]),
            make_task("d", 1, vec![("c", 0)]),
        ]);
        let result = validate(&graph);
        assert_eq!(result.errors().len(), 2);
        assert_eq!(result.errors()[0].involved_task_ids, vec!["a", "b"]);
        assert_eq!(result.errors()[1].involved_task_ids, vec!["c", "d"]);
    }

    #[test]
    fn test_every_task_on_a_cycle_is_named() {
        // a <-> b, plus a -> c -> b closing a second loop through a
        let graph = graph_of(vec![
            make_task("a", 1, vec![("b", 0)]),
            make_task("b", 1, vec![("a", 0), ("c", 0)]),
            make_task("c", 1, vec![("a", 0)]),
            make_task("d", 1, vec![("c", 0)]),
        ]);
        let result = validate(&graph);
        assert_eq!(
            kinds(&result),
            vec![
                ValidationErrorKind::CircularDependency,
                ValidationErrorKind::CircularDependency
            ]
        );
        assert_eq!(result.errors()[0].involved_task_ids, vec!["a", "b"]);
        assert_eq!(result.errors()[1].involved_task_ids, vec!["c", "b", "a"]);
        assert!(result.errors()[1].message.contains("c -> b -> a -> c"));

        let named: FxHashSet<&str> = result
            .errors()
            .iter()
            .flat_map(|e| e.involved_task_ids.iter().map(String::as_str))
            .collect();
        assert!(!named.contains("d"));
        assert_eq!(named.len(), 3);
    }

    #[test]
    fn test_strongly_connected_components() {
        let graph = graph_of(vec![
            make_task("a", 1, vec![("c", 0)]),
            make_task("b", 1, vec![("a", 0)]),
            make_task("c", 1, vec![("b", 0)]),
            make_task("d", 1, vec![("c", 0)]),
        ]);
        assert_eq!(strongly_connected(&graph), vec![vec![0, 1, 2], vec![3]]);
    }

    #[test]
    fn test_overlap_must_be_shorter_than_predecessor() {
        let graph = graph_of(vec![
            make_task("a", 3, vec![]),
            make_task("b", 2, vec![("a", -5)]),
            make_task("c", 2, vec![("a", -3)]),
            make_task("d", 2, vec![("a", -2)]),
        ]);
        let result = validate(&graph);
        assert_eq!(
            kinds(&result),
            vec![
                ValidationErrorKind::OverlapExceedsDuration,
                ValidationErrorKind::OverlapExceedsDuration
            ]
        );
        let msg = &result.errors()[0].message;
        assert!(msg.contains("'b' (2 days)"));
        assert!(msg.contains("'a' (3 days)"));
        assert!(msg.contains("by 5 days"));
        assert_eq!(result.errors()[1].involved_task_ids, vec!["a", "c"]);
    }

    #[test]
    fn test_cross_asset_dependency() {
        let graph = graph_of(vec![
            Task::new("a", 1, "site-1"),
            Task::new("b", 1, "site-2").after("a", 0),
        ]);
        let result = validate(&graph);
        assert_eq!(kinds(&result), vec![ValidationErrorKind::CrossAssetDependency]);
        assert!(result.errors()[0].message.contains("site-2"));
    }

    #[test]
    fn test_all_problems_collected() {
        let graph = graph_of(vec![
            Task::new("a", 2, "x").after("ghost", 0),
            Task::new("b", 2, "x").after("a", -4).after("c", 0),
            Task::new("c", 1, "x").after("b", 0),
            Task::new("d", 1, "y").after("a", 0),
        ]);
        let result = validate(&graph);
        assert_eq!(
            kinds(&result),
            vec![
                ValidationErrorKind::DanglingDependency,
                ValidationErrorKind::CircularDependency,
                ValidationErrorKind::OverlapExceedsDuration,
                ValidationErrorKind::CrossAssetDependency,
            ]
        );
        assert_eq!(result.errors()[0].involved_task_ids, vec!["a", "ghost"]);
    }

    #[test]
    fn test_candidate_creating_cycle() {
        let graph = graph_of(vec![
            make_task("a", 1, vec![]),
            make_task("b", 1, vec![("a", 0)]),
            make_task("c", 1, vec![("b", 0)]),
        ]);
        let result = validate_candidate("c", "a", 0, &graph);
        assert_eq!(kinds(&result), vec![ValidationErrorKind::CircularDependency]);
        assert_eq!(result.errors()[0].involved_task_ids, vec!["a", "b", "c"]);

        assert!(validate_candidate("a", "c", 0, &graph).is_valid());
    }

    #[test]
    fn test_candidate_ignores_unrelated_existing_cycle() {
        let graph = graph_of(vec![
            make_task("a", 1, vec![("b", 0)]),
            make_task("b", 1, vec![("a", 0)]),
            make_task("c", 1, vec![]),
            make_task("d", 1, vec![]),
        ]);
        assert!(validate_candidate("c", "d", 0, &graph).is_valid());
    }

    #[test]
    fn test_candidate_overlap_and_asset_checks() {
        let graph = graph_of(vec![
            Task::new("a", 3, "x"),
            Task::new("b", 2, "x"),
            Task::new("c", 2, "y"),
        ]);
        assert_eq!(
            kinds(&validate_candidate("a", "b", -3, &graph)),
            vec![ValidationErrorKind::OverlapExceedsDuration]
        );
        assert!(validate_candidate("a", "b", -2, &graph).is_valid());
        assert_eq!(
            kinds(&validate_candidate("a", "c", 0, &graph)),
            vec![ValidationErrorKind::CrossAssetDependency]
        );
    }

    #[test]
    fn test_candidate_with_unknown_task() {
        let graph = graph_of(vec![make_task("a", 1, vec![])]);
        let result = validate_candidate("missing", "a", 0, &graph);
        assert_eq!(kinds(&result), vec![ValidationErrorKind::DanglingDependency]);
    }

    #[test]
    fn test_candidate_matches_full_validation() {
        let base = vec![
            Task::new("a", 3, "x"),
            Task::new("b", 2, "x").after("a", 0),
        ];
        let graph = graph_of(base.clone());
        for (pred, succ, lag) in [("b", "a", 0), ("a", "b", -3), ("a", "b", -1)] {
            let candidate = validate_candidate(pred, succ, lag, &graph);
            let mut with_edge = base.clone();
            let idx = with_edge.iter().position(|t| t.id == succ).unwrap();
            with_edge[idx] = with_edge[idx].clone().after(pred, lag);
            let full = validate(&graph_of(with_edge));
            assert_eq!(kinds(&candidate), kinds(&full), "{} -> {}", pred, succ);
        }
    }

    #[test]
    fn test_fallback_edges_take_part_in_cycle_detection() {
        // b was removed; c falls back behind a, but a already depends on c.
        let mut graph = graph_of(vec![
            make_task("a", 1, vec![("c", 0)]),
            make_task("c", 1, vec![("b", 0)]),
        ]);
        graph.apply_sequential_fallback();
        let result = validate(&graph);
        assert_eq!(kinds(&result), vec![ValidationErrorKind::CircularDependency]);
        assert!(result.errors()[0].message.contains("sequential fallback"));
    }
}
