//! Trait definitions for graph abstractions.
//!
//! Algorithms in [`crate::utils::graph::algorithms`] are written against these traits, so the
//! same traversal and dominance code runs on a [`crate::ir::Routine`], on the [`Reversed`]
//! view of it, and on the small graphs used in tests.
//!
//! - [`GraphBase`] - Node count and node iteration
//! - [`Successors`] - Outgoing edges
//! - [`Predecessors`] - Incoming edges
//! - [`RootedGraph`] - A designated entry node

use crate::utils::graph::NodeId;

/// Core graph properties.
pub trait GraphBase {
    /// Upper bound (exclusive) of every node index in the graph.
    ///
    /// Implementations with holes (removed nodes) report the size of their index space, not
    /// the number of live nodes.
    fn node_count(&self) -> usize;

    /// Iterates every live node.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward edge traversal.
pub trait Successors: GraphBase {
    /// Targets of the edges leaving `node`; empty for unknown nodes.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Backward edge traversal.
pub trait Predecessors: GraphBase {
    /// Sources of the edges entering `node`; empty for unknown nodes.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Graphs with a designated entry node.
pub trait RootedGraph: Successors + Predecessors {
    /// The entry node.
    fn entry(&self) -> NodeId;
}

/// A view of a graph with every edge flipped.
///
/// Post-dominance questions are answered by running the dominance algorithms on this view.
///
/// # Examples
///
/// ```rust
/// use ironlift::prelude::*;
/// use ironlift::utils::graph::{Reversed, Successors};
///
/// let mut routine = Routine::new();
/// let a = routine.add_block();
/// let b = routine.add_block();
/// routine.add_jump(a, b)?;
///
/// let reversed = Reversed::new(&routine);
/// let succ: Vec<NodeId> = reversed.successors(b.into()).collect();
/// assert_eq!(succ, vec![NodeId::from(a)]);
/// # Ok::<(), ironlift::Error>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Reversed<'g, G> {
    graph: &'g G,
}

impl<'g, G> Reversed<'g, G> {
    /// Wraps `graph`.
    #[must_use]
    pub fn new(graph: &'g G) -> Self {
        Reversed { graph }
    }
}

impl<G: GraphBase> GraphBase for Reversed<'_, G> {
    fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.graph.node_ids()
    }
}

impl<G: Predecessors> Successors for Reversed<'_, G> {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.graph.predecessors(node)
    }
}

impl<G: Successors> Predecessors for Reversed<'_, G> {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.graph.successors(node)
    }
}
