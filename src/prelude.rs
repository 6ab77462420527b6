//! # ironlift Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the ironlift library. Import this module to get quick access to the essential
//! types for building and optimizing lifted routines.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ironlift operations
pub use crate::Error;

/// The result type used throughout ironlift
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Graph containers and handles
pub use crate::ir::{BasicBlock, BlockId, InsnCursor, InsnId, Instruction, Routine, ValueId};

/// Operand model
pub use crate::ir::{Constant, MemoryRef, Op, Operand, Register, Type};

/// Opcode descriptors
pub use crate::ir::{Opcode, OpcodeFlags};

// ================================================================================================
// Architecture and Image
// ================================================================================================

/// Architecture description and lifting
pub use crate::arch::{lift_block, ArchRegistry, Architecture, Endianness, Lifter};

/// The loaded binary image
pub use crate::image::{Image, Section, Symbol};

// ================================================================================================
// Optimization
// ================================================================================================

/// Local passes
pub use crate::opt::{const_fold, const_load, id_fold, ins_combine, reg_move_prop};

/// Pipeline driver and its event log
pub use crate::opt::{BlockPass, EventKind, EventLog, PassScheduler, SchedulerConfig};

// ================================================================================================
// Graph Utilities
// ================================================================================================

/// Generic graph traits and algorithms
pub use crate::utils::graph::{
    algorithms::{dominates, dominates_from, post_dominates},
    NodeId, Predecessors, Reversed, RootedGraph, Successors,
};
