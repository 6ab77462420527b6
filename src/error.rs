use thiserror::Error;

use crate::ir::{Type, ValueId};

macro_rules! integrity_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Integrity {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Integrity {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Soft non-events of the optimizer (an operand that is not constant, an operator that can not
/// be folded, an address outside every section) are never reported through this type; passes
/// simply report zero mutations for them. Everything in here is a defect in the graph or in a
/// collaborator and is propagated to the caller.
///
/// # Error Categories
///
/// ## Graph integrity
/// - [`Error::Integrity`] - Use-list corruption, malformed blocks, broken invariants
/// - [`Error::LingeringUses`] - Destroying a value that still has consumers
/// - [`Error::InvalidHandle`] - A stale or foreign instruction or block handle
/// - [`Error::TypeMismatch`] - An operand disagrees with its opcode descriptor
/// - [`Error::ConstexprMismatch`] - A constant-only operand slot holds a value
///
/// ## Collaborators
/// - [`Error::Lift`] - The lifter failed to translate machine code
/// - [`Error::OutOfBounds`] - A read past the end of an image
///
/// # Examples
///
/// ```rust
/// use ironlift::prelude::*;
///
/// let mut routine = Routine::new();
/// let block = routine.add_block();
/// let value = routine.push_back(block, Instruction::undef(Type::I32))?;
/// routine.push_back(block, Instruction::write_reg(Register::new(0, 1), value, Type::I32))?;
///
/// match routine.erase(value) {
///     Err(Error::LingeringUses { count, .. }) => assert_eq!(count, 1),
///     other => panic!("unexpected result {other:?}"),
/// }
/// # Ok::<(), ironlift::Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The IR graph violates one of its structural invariants.
    ///
    /// Raised by validation and by mutation primitives that detect corruption. Carries the
    /// source location where the violation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the broken invariant
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Integrity - {file}:{line}: {message}")]
    Integrity {
        /// The message to be printed for the Integrity error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A value was about to be destroyed while consumers still reference it.
    ///
    /// The graph is left untouched when this is returned.
    #[error("Destroying {value} with {count} lingering use(s)")]
    LingeringUses {
        /// The value that was to be destroyed
        value: ValueId,
        /// How many consumers still reference it
        count: usize,
    },

    /// A handle does not refer to a live instruction or block of this routine.
    #[error("Stale or foreign handle - {0}")]
    InvalidHandle(String),

    /// An operand's type does not match the type its opcode expects in that slot.
    #[error("Operand #{index} of {insn} is '{found}', expected '{expected}'")]
    TypeMismatch {
        /// Operand slot index
        index: usize,
        /// The type the opcode descriptor requires
        expected: Type,
        /// The type found in the slot
        found: Type,
        /// Rendering of the offending instruction
        insn: String,
    },

    /// An operand slot that must hold a constant holds a tracked value instead.
    #[error("Operand #{index} of {insn} must be a constant")]
    ConstexprMismatch {
        /// Operand slot index
        index: usize,
        /// Rendering of the offending instruction
        insn: String,
    },

    /// The lifter could not translate the machine code it was given.
    #[error("Lifting failed - {0}")]
    Lift(String),

    /// An out of bound access was attempted.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
