// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # ironlift
//!
//! The intermediate representation and local optimization engine of a binary lifter.
//!
//! Machine code is translated by an architecture specific [`arch::Lifter`] into a
//! [`ir::Routine`]: a graph of [`ir::BasicBlock`]s holding typed [`ir::Instruction`]s whose
//! operands reference other instructions through tracked use lists. The [`opt`] passes then
//! simplify each block locally, folding constants, merging identical values, combining
//! instructions, reading constant memory from the loaded [`image::Image`] and forwarding
//! register moves.
//!
//! ## Features
//!
//! - **Arena based graph** - Instructions and blocks are addressed by copyable handles, every
//!   use of a value is tracked and rewired in constant time
//! - **Descriptor driven opcodes** - A static opcode table drives type checking, display and
//!   the side effect analysis of every pass
//! - **Constant algebra** - Bit exact integer and float evaluation that reports unfoldable
//!   operations instead of guessing
//! - **Parallel pipeline** - Routines are optimized independently on the rayon thread pool
//!
//! ## Quick Start
//!
//! ```rust
//! use ironlift::prelude::*;
//!
//! let mut routine = Routine::new();
//! let block = routine.add_block();
//!
//! let a = routine.push_back(block, Instruction::binop(Type::I32, Op::Add, Constant::I32(2), Constant::I32(3)))?;
//! let b = routine.push_back(block, Instruction::binop(Type::I32, Op::Mul, a, Constant::I32(1)))?;
//! let write = routine.push_back(block, Instruction::write_reg(Register::new(0, 1), b, Type::I32))?;
//!
//! PassScheduler::standard().run_on_routine(&mut routine)?;
//! assert_eq!(routine[write].const_operand(1), Some(&Constant::I32(5)));
//! assert_eq!(routine[block].len(), 1);
//! # Ok::<(), ironlift::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`ir`] - Types, constants, operands, opcodes, instructions, blocks and routines
//! - [`opt`] - The local passes, the [`opt::PassScheduler`] and its [`opt::EventLog`]
//! - [`arch`] - Architecture descriptions and the lifter interface
//! - [`image`] - The loaded binary image read by constant load promotion
//! - [`utils`] - Generic graph traversal and dominance
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! Graph integrity violations are returned as [`Error`]s; soft non-events such as an operand
//! that is not constant simply make a pass report zero mutations.
//!
//! ```rust
//! use ironlift::prelude::*;
//!
//! let mut routine = Routine::new();
//! let block = routine.add_block();
//! let value = routine.push_back(block, Instruction::undef(Type::I8))?;
//! routine.push_back(block, Instruction::write_reg(Register::new(0, 1), value, Type::I8))?;
//!
//! match routine.erase(value) {
//!     Err(Error::LingeringUses { .. }) => println!("still in use"),
//!     Err(e) => println!("Error: {}", e),
//!     Ok(()) => unreachable!(),
//! }
//! # Ok::<(), ironlift::Error>(())
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use ironlift::prelude::*;
///
/// let mut routine = Routine::new();
/// let block = routine.add_block();
/// routine.push_back(block, Instruction::trap("unreachable"))?;
/// routine.validate()?;
/// # Ok::<(), ironlift::Error>(())
/// ```
pub mod prelude;

pub mod arch;
pub mod image;

pub mod ir;

pub mod opt;

pub mod utils;

/// `ironlift` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `ironlift` Error type
pub use error::Error;
