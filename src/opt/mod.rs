//! Local optimization passes.
//!
//! Every pass works on a single [`BasicBlock`](crate::ir::BasicBlock) and has the shape
//! `fn(&mut Routine, BlockId) -> Result<usize>`, returning the number of mutations it made.
//! Before returning, a pass runs dead code elimination over the block (and validates it in
//! debug builds), so a pass never leaves unused pure instructions behind.
//!
//! # Passes
//!
//! - [`const_fold()`] - Evaluate instructions whose operands are all literals
//! - [`id_fold()`] - Replace a value with an identical earlier one
//! - [`ins_combine()`] - Algebraic identities, cast chains and canonical operand order
//! - [`const_load()`] - Read loads from read-only image sections
//! - [`reg_move_prop()`] - Forward register writes to reads, drop dead writes
//!
//! The [`PassScheduler`] drives them to a fixpoint and records what happened in an
//! [`EventLog`].
//!
//! # Examples
//!
//! ```rust
//! use ironlift::prelude::*;
//!
//! let mut routine = Routine::new();
//! let block = routine.add_block();
//! let a = routine.push_back(block, Instruction::read_reg(Type::I32, Register::new(0, 1)))?;
//! let b = routine.push_back(block, Instruction::binop(Type::I32, Op::Add, a, Constant::I32(0)))?;
//! let write = routine.push_back(block, Instruction::write_reg(Register::new(1, 1), b, Type::I32))?;
//!
//! ironlift::opt::ins_combine(&mut routine, block)?;
//! assert_eq!(routine[write].operand(1), Some(&Operand::from(a)));
//! # Ok::<(), ironlift::Error>(())
//! ```

pub mod const_fold;
pub mod const_load;
mod events;
pub mod id_fold;
pub mod ins_combine;
pub mod reg_move_prop;
mod scheduler;
pub mod util;

pub use const_fold::const_fold;
pub use const_load::const_load;
pub use events::{Event, EventBuilder, EventKind, EventLog, EventLogIter};
pub use id_fold::id_fold;
pub use ins_combine::ins_combine;
pub use reg_move_prop::reg_move_prop;
pub use scheduler::{
    BlockPass, ConstFoldPass, ConstLoadPass, DcePass, IdFoldPass, InsCombinePass, PassScheduler,
    RegMovePropPass, SchedulerConfig,
};
