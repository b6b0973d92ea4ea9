//! Validation and scheduling for composite building.

use crate::errors::{ComposeError, ComposeResult};
use petgraph::graph::NodeIndex;
use petgraph::visit::{depth_first_search, DfsEvent, EdgeRef, IntoNodeIdentifiers};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::types::StepGraph;

/// Check that the step graph contains no cycle between distinct steps.
///
/// A step may depend on its own outputs (a self edge), which is how a step
/// carries state forward between invocations.
pub(crate) fn ensure_acyclic(graph: &StepGraph) -> ComposeResult<()> {
    let result = depth_first_search(graph, graph.node_identifiers(), |event| match event {
        DfsEvent::BackEdge(a, b) if a != b => Err((a, b)),
        _ => Ok(()),
    });
    match result {
        Ok(()) => Ok(()),
        Err((a, b)) => Err(ComposeError::Composition(format!(
            "steps '{}' and '{}' form a dependency cycle",
            graph[b].name, graph[a].name
        ))),
    }
}

/// Topological execution order over the step graph.
///
/// Ties are broken by node index, which follows document declaration order.
/// Self edges are ignored. Callers must check acyclicity first; with no
/// cycles between distinct steps every node appears exactly once.
pub(crate) fn execution_order(graph: &StepGraph) -> Vec<NodeIndex> {
    let mut indegree = vec![0usize; graph.node_count()];
    for edge in graph.edge_references() {
        if edge.source() != edge.target() {
            indegree[edge.target().index()] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<NodeIndex>> = indegree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(index, _)| Reverse(NodeIndex::new(index)))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for edge in graph.edges_directed(node, Direction::Outgoing) {
            if edge.target() == node {
                continue;
            }
            let target = edge.target().index();
            indegree[target] -= 1;
            if indegree[target] == 0 {
                ready.push(Reverse(edge.target()));
            }
        }
    }
    order
}
