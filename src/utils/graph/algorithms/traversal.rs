//! Graph traversal.
//!
//! All traversals keep their visited set in a local `Vec<bool>` indexed by [`NodeId`], so no
//! scratch state ever lives on the nodes themselves and any number of traversals can run over
//! the same graph at once.

use std::collections::VecDeque;

use crate::utils::graph::{NodeId, Successors};

/// Depth-first pre-order iterator.
pub struct DfsIterator<'g, G: Successors> {
    graph: &'g G,
    stack: Vec<NodeId>,
    visited: Vec<bool>,
}

impl<G: Successors> Iterator for DfsIterator<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;

        // Reverse so the first successor is visited first
        let successors: Vec<NodeId> = self.graph.successors(node).collect();
        for &succ in successors.iter().rev() {
            if let Some(seen) = self.visited.get_mut(succ.index()) {
                if !*seen {
                    *seen = true;
                    self.stack.push(succ);
                }
            }
        }
        Some(node)
    }
}

/// Visits every node reachable from `start` once, parents before children.
///
/// An out-of-range `start` yields nothing.
pub fn dfs<G: Successors>(graph: &G, start: NodeId) -> DfsIterator<'_, G> {
    let mut visited = vec![false; graph.node_count()];
    let stack = match visited.get_mut(start.index()) {
        Some(seen) => {
            *seen = true;
            vec![start]
        }
        None => Vec::new(),
    };

    DfsIterator {
        graph,
        stack,
        visited,
    }
}

/// Breadth-first iterator.
pub struct BfsIterator<'g, G: Successors> {
    graph: &'g G,
    queue: VecDeque<NodeId>,
    visited: Vec<bool>,
}

impl<G: Successors> Iterator for BfsIterator<'_, G> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.queue.pop_front()?;
        for succ in self.graph.successors(node) {
            if let Some(seen) = self.visited.get_mut(succ.index()) {
                if !*seen {
                    *seen = true;
                    self.queue.push_back(succ);
                }
            }
        }
        Some(node)
    }
}

/// Visits every node reachable from `start` once, in order of increasing distance.
pub fn bfs<G: Successors>(graph: &G, start: NodeId) -> BfsIterator<'_, G> {
    let mut visited = vec![false; graph.node_count()];
    let mut queue = VecDeque::new();
    if let Some(seen) = visited.get_mut(start.index()) {
        *seen = true;
        queue.push_back(start);
    }

    BfsIterator {
        graph,
        queue,
        visited,
    }
}

/// Nodes reachable from `start`, each after all of its descendants.
#[must_use]
pub fn postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let node_count = graph.node_count();
    if start.index() >= node_count {
        return Vec::new();
    }

    let mut visited = vec![false; node_count];
    let mut order = Vec::with_capacity(node_count);

    // Each frame holds a node and its not yet explored successors
    visited[start.index()] = true;
    let mut stack: Vec<(NodeId, std::vec::IntoIter<NodeId>)> = vec![(
        start,
        graph.successors(start).collect::<Vec<_>>().into_iter(),
    )];

    while let Some((node, pending)) = stack.last_mut() {
        match pending.find(|succ| succ.index() < node_count && !visited[succ.index()]) {
            Some(succ) => {
                visited[succ.index()] = true;
                let children = graph.successors(succ).collect::<Vec<_>>().into_iter();
                stack.push((succ, children));
            }
            None => {
                order.push(*node);
                stack.pop();
            }
        }
    }
    order
}

/// Nodes reachable from `start` in reverse postorder; every node precedes its successors
/// unless the edge closes a cycle.
#[must_use]
pub fn reverse_postorder<G: Successors>(graph: &G, start: NodeId) -> Vec<NodeId> {
    let mut order = postorder(graph, start);
    order.reverse();
    order
}

/// `true` if a path of at least one edge leads from `src` to `dst`.
///
/// A node only reaches itself through a cycle.
#[must_use]
pub fn has_path<G: Successors>(graph: &G, src: NodeId, dst: NodeId) -> bool {
    let node_count = graph.node_count();
    if src.index() >= node_count || dst.index() >= node_count {
        return false;
    }

    let mut visited = vec![false; node_count];
    let mut stack: Vec<NodeId> = graph.successors(src).collect();
    while let Some(node) = stack.pop() {
        if node == dst {
            return true;
        }
        if node.index() >= node_count || visited[node.index()] {
            continue;
        }
        visited[node.index()] = true;
        stack.extend(graph.successors(node));
    }
    false
}
