//! The intermediate representation.
//!
//! Machine code is lifted into [`Routine`]s made of [`BasicBlock`]s holding [`Instruction`]s.
//! Instructions and blocks are values; operands reference them through [`ValueId`] and every
//! such reference is tracked in a use list, so a value always knows its consumers.
//!
//! # Key Components
//!
//! - [`Type`], [`Op`], [`Constant`] - The operand model and its constant algebra
//! - [`Operand`], [`Register`], [`MemoryRef`] - Contents of operand slots
//! - [`Opcode`], [`OpcodeFlags`] - The opcode descriptor table
//! - [`Routine`] - Arena owner and home of every mutation primitive
//! - [`InsnCursor`] - Block iteration that tolerates erasure

mod block;
mod constant;
mod instruction;
mod opcodes;
mod operand;
mod ops;
mod routine;
mod types;
mod value;

pub use block::{BasicBlock, InsnCursor};
pub use constant::Constant;
pub use instruction::Instruction;
pub(crate) use instruction::OperandSlot;
pub use opcodes::{Opcode, OpcodeFlags, OpcodeInfo, TypeSlot};
pub use operand::{MemoryRef, Operand, Register};
pub use ops::{Op, OpClass};
pub use routine::{BlockDisplay, InsnDisplay, Routine};
pub use types::{Type, TypeKind};
pub use value::{BlockId, InsnId, Use, UseArena, UseId, UseIter, UseList, ValueId};
