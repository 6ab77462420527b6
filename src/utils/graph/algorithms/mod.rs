//! Graph algorithms used by the IR: traversal orders, reachability and dominance.
//!
//! | Algorithm | Complexity |
//! |-----------|------------|
//! | [`dfs`], [`bfs`], [`postorder`], [`reverse_postorder`] | O(V + E) |
//! | [`has_path`] | O(V + E) |
//! | [`dominates`], [`dominates_from`], [`post_dominates`] | O(V + E) per query |

mod dominance;
mod traversal;

pub use dominance::{dominates, dominates_from, post_dominates};
pub use traversal::{bfs, dfs, has_path, postorder, reverse_postorder, BfsIterator, DfsIterator};
