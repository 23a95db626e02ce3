//! `WorkflowEngine::order` — deterministic topological ordering.
//!
//! Same Kahn's-algorithm shape as the teacher's `dag::validate_dag`, with
//! two generalizations the spec requires:
//! - the edge set is the step's keyed successors (`onSuccess`, `onFailure`,
//!   `conditional`) rather than a flat edge list;
//! - a cycle is not immediately fatal: if every back-edge closing a cycle
//!   originates from a `CONDITION` step, it is a legal loopback (spec
//!   §4.1) and is excluded from the acyclic ordering, but recorded so the
//!   orchestrator can enforce the workflow's runtime loop bound on it.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::EngineError;
use crate::models::{StepKind, Workflow};

/// One directed edge in the step graph, annotated with how it was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RawEdge<'a> {
    from: &'a str,
    to: &'a str,
}

/// Output of `order`: a topological traversal hint plus the set of edges
/// that are legal `CONDITION` loopbacks (excluded from the acyclic graph).
#[derive(Debug, Clone, Default)]
pub struct OrderedWorkflow {
    /// Stable topological order of step ids, ties broken by authoring
    /// order (spec §4.1).
    pub sequence: Vec<String>,
    /// Edges `(from, to)` that close a cycle but are legal because `from`
    /// is a CONDITION step. The orchestrator treats traversal across one
    /// of these edges as re-entering a "fresh logical step" counted
    /// against the workflow's loop bound.
    pub loopback_edges: HashSet<(String, String)>,
}

pub fn order(workflow: &Workflow) -> Result<OrderedWorkflow, EngineError> {
    if workflow.steps.is_empty() {
        return Err(EngineError::EmptyWorkflow);
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &workflow.steps {
        if step.id.is_empty() {
            return Err(EngineError::EmptyStepId);
        }
        if !seen_ids.insert(step.id.as_str()) {
            return Err(EngineError::DuplicateStepId(step.id.clone()));
        }
    }

    let kind_of: HashMap<&str, StepKind> =
        workflow.steps.iter().map(|s| (s.id.as_str(), s.kind)).collect();

    let mut edges: Vec<RawEdge> = Vec::new();
    for step in &workflow.steps {
        for target in step.successors.all_targets() {
            if !kind_of.contains_key(target) {
                return Err(EngineError::UnknownSuccessor {
                    from: step.id.clone(),
                    step_id: target.to_string(),
                });
            }
            edges.push(RawEdge { from: step.id.as_str(), to: target });
        }
    }

    // First pass: try a full Kahn's sort. If it succeeds, there's no cycle.
    if let Some(sequence) = kahn_sort(&workflow.steps, &edges) {
        return Ok(OrderedWorkflow { sequence, loopback_edges: HashSet::new() });
    }

    // Second pass: repeatedly find the back edges that close a cycle via
    // DFS, and only if every one of them originates from a CONDITION step,
    // drop exactly those edges and retry. This is narrower than dropping
    // every edge a CONDITION step declares: a condition's *forward*
    // branches stay in the graph used to build the ordering hint, and only
    // the genuine back-edge(s) are classified as loopbacks.
    let authoring_order: Vec<&str> = workflow.steps.iter().map(|s| s.id.as_str()).collect();
    let mut remaining = edges.clone();
    let mut loopback_edges: HashSet<(String, String)> = HashSet::new();

    loop {
        let back_edges = find_back_edges(&authoring_order, &remaining);
        if back_edges.is_empty() {
            return Err(EngineError::CycleDetected);
        }
        if back_edges
            .iter()
            .any(|e| kind_of.get(e.from) != Some(&StepKind::Condition))
        {
            return Err(EngineError::CycleDetected);
        }

        for e in &back_edges {
            loopback_edges.insert((e.from.to_string(), e.to.to_string()));
        }
        remaining.retain(|e| !back_edges.contains(e));

        if let Some(sequence) = kahn_sort(&workflow.steps, &remaining) {
            return Ok(OrderedWorkflow { sequence, loopback_edges });
        }
        // Still cyclic (e.g. independent overlapping cycles) — loop again
        // and peel off the next layer of back edges.
    }
}

/// DFS-based back-edge detection (white/gray/black coloring). A back edge
/// is one pointing at a node still "gray" (on the current DFS stack) —
/// the standard definition of a cycle-closing edge in a directed graph.
/// Returns an empty vec if `edges` is already acyclic.
fn find_back_edges<'a>(authoring_order: &[&'a str], edges: &[RawEdge<'a>]) -> Vec<RawEdge<'a>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for id in authoring_order {
        adjacency.entry(id).or_default();
    }
    for edge in edges {
        adjacency.entry(edge.from).or_default().push(edge.to);
    }

    let mut color: HashMap<&str, Color> =
        authoring_order.iter().map(|&id| (id, Color::White)).collect();
    let mut back_edges = Vec::new();

    fn visit<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        color: &mut HashMap<&'a str, Color>,
        back_edges: &mut Vec<RawEdge<'a>>,
    ) {
        color.insert(node, Color::Gray);
        if let Some(neighbours) = adjacency.get(node) {
            for &next in neighbours {
                match color.get(next).copied().unwrap_or(Color::White) {
                    Color::White => visit(next, adjacency, color, back_edges),
                    Color::Gray => back_edges.push(RawEdge { from: node, to: next }),
                    Color::Black => {}
                }
            }
        }
        color.insert(node, Color::Black);
    }

    for &id in authoring_order {
        if color.get(id).copied().unwrap_or(Color::White) == Color::White {
            visit(id, &adjacency, &mut color, &mut back_edges);
        }
    }

    back_edges
}

fn kahn_sort(steps: &[crate::models::Step], edges: &[RawEdge]) -> Option<Vec<String>> {
    // Preserve authoring order as the tie-break by seeding in that order
    // and always popping the front of the queue.
    let authoring_order: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    for id in &authoring_order {
        adjacency.entry(id).or_default();
        in_degree.entry(id).or_insert(0);
    }
    for edge in edges {
        adjacency.entry(edge.from).or_default().push(edge.to);
        *in_degree.entry(edge.to).or_insert(0) += 1;
    }

    let mut queue: VecDeque<&str> = authoring_order
        .iter()
        .copied()
        .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(authoring_order.len());
    while let Some(id) = queue.pop_front() {
        sorted.push(id.to_owned());
        if let Some(neighbours) = adjacency.get(id) {
            // Stable: visit neighbours in the order their edges were added,
            // and only enqueue newly-zero nodes in authoring order overall.
            for &n in neighbours {
                let deg = in_degree.entry(n).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(n);
                }
            }
        }
    }

    if sorted.len() == authoring_order.len() {
        Some(sorted)
    } else {
        None
    }
}
