//! Dominance queries.
//!
//! `a` dominates `b` when every path from the entry of the graph to `b` passes through `a`.
//! The queries answer one pair at a time by searching backwards from `b` for a root while
//! refusing to step through `a`, which is all the local optimizer needs and requires no
//! precomputed tree. A root is the designated entry, if any, or a node without
//! predecessors; the entry stays a root even when a loop leads back into it.
//!
//! Post-dominance is dominance on the [`Reversed`] graph, where every exit (a node without
//! successors) acts as a root: `a` post-dominates `b` when every path from `b` to an exit
//! passes through `a`.

use crate::utils::graph::{NodeId, Predecessors, Reversed, RootedGraph, Successors};

/// `true` if `a` dominates `b` with respect to the entry of `graph`. Every node dominates
/// itself.
///
/// Nodes that no root reaches are vacuously dominated by everything. Out-of-range nodes are
/// dominated by nothing.
#[must_use]
pub fn dominates<G: RootedGraph>(graph: &G, a: NodeId, b: NodeId) -> bool {
    dominates_from(graph, Some(graph.entry()), a, b)
}

/// `true` if `a` dominates `b`, treating `entry` and every node without predecessors as
/// roots.
///
/// This is the form used on graphs without a single entry, such as a [`Reversed`] view.
#[must_use]
pub fn dominates_from<G: Predecessors>(
    graph: &G,
    entry: Option<NodeId>,
    a: NodeId,
    b: NodeId,
) -> bool {
    let node_count = graph.node_count();
    if a.index() >= node_count || b.index() >= node_count {
        return false;
    }
    if a == b {
        return true;
    }

    let mut visited = vec![false; node_count];
    visited[b.index()] = true;
    let mut stack = vec![b];

    while let Some(node) = stack.pop() {
        if Some(node) == entry {
            return false;
        }

        let mut has_predecessor = false;
        for pred in graph.predecessors(node) {
            has_predecessor = true;
            if pred == a || pred.index() >= node_count || visited[pred.index()] {
                continue;
            }
            visited[pred.index()] = true;
            stack.push(pred);
        }

        // Reached a root without passing through `a`
        if !has_predecessor {
            return false;
        }
    }
    true
}

/// `true` if `a` post-dominates `b`. Every node post-dominates itself.
#[must_use]
pub fn post_dominates<G: Successors + Predecessors>(graph: &G, a: NodeId, b: NodeId) -> bool {
    dominates_from(&Reversed::new(graph), None, a, b)
}
