//! Utility infrastructure shared across the crate.

pub mod graph;
