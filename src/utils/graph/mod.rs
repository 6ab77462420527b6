//! Generic graph infrastructure.
//!
//! The control flow graph of a [`crate::ir::Routine`] implements the traits in this module
//! with blocks as nodes, which makes the algorithms in [`algorithms`] available to it without
//! copying the graph into another representation.

pub mod algorithms;
mod node;
mod traits;

pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, Reversed, RootedGraph, Successors};
