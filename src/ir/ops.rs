//! Operators selected by the `op` operand of `binop`, `unop` and `cmp`.

use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

/// Arity class of an [`Op`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    /// One operand, used by `unop`
    Unary,
    /// Two operands producing a value of the operand type, used by `binop`
    Binary,
    /// Two operands producing an `i1`, used by `cmp`
    Compare,
}

/// A numeric, bitwise or comparison operator.
///
/// Operators prefixed with `u` treat their operands as unsigned, the remaining integer
/// operators are signed where signedness matters.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumCount,
    EnumString,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Op {
    // Unary
    /// Two's complement negation
    Neg,
    /// Absolute value
    Abs,
    /// Index of the lowest set bit
    BitLsb,
    /// Index of the highest set bit
    BitMsb,
    /// Number of set bits
    BitPopcnt,
    /// Byte order reversal
    BitByteswap,
    /// Bitwise complement
    BitNot,
    /// Round towards positive infinity
    Ceil,
    /// Round towards negative infinity
    Floor,
    /// Round towards zero
    Trunc,
    /// Round half away from zero
    Round,
    /// Square root
    Sqrt,

    // Binary
    /// Wrapping addition
    Add,
    /// Wrapping subtraction
    Sub,
    /// Wrapping multiplication
    Mul,
    /// Signed division
    Div,
    /// Unsigned division
    Udiv,
    /// Signed remainder
    Rem,
    /// Unsigned remainder
    Urem,
    /// Bitwise or
    BitOr,
    /// Bitwise and
    BitAnd,
    /// Bitwise xor
    BitXor,
    /// Shift left
    BitShl,
    /// Logical shift right
    BitShr,
    /// Arithmetic shift right
    BitSar,
    /// Rotate left
    BitRol,
    /// Rotate right
    BitRor,
    /// Signed maximum
    Max,
    /// Unsigned maximum
    Umax,
    /// Signed minimum
    Min,
    /// Unsigned minimum
    Umin,

    // Compare
    /// Signed greater than
    Gt,
    /// Unsigned greater than
    Ugt,
    /// Signed less or equal
    Le,
    /// Unsigned less or equal
    Ule,
    /// Signed greater or equal
    Ge,
    /// Unsigned greater or equal
    Uge,
    /// Signed less than
    Lt,
    /// Unsigned less than
    Ult,
    /// Equal
    Eq,
    /// Not equal
    Ne,
}

impl Op {
    /// Arity class of the operator.
    #[must_use]
    pub fn class(self) -> OpClass {
        match self {
            Op::Neg
            | Op::Abs
            | Op::BitLsb
            | Op::BitMsb
            | Op::BitPopcnt
            | Op::BitByteswap
            | Op::BitNot
            | Op::Ceil
            | Op::Floor
            | Op::Trunc
            | Op::Round
            | Op::Sqrt => OpClass::Unary,
            Op::Gt
            | Op::Ugt
            | Op::Le
            | Op::Ule
            | Op::Ge
            | Op::Uge
            | Op::Lt
            | Op::Ult
            | Op::Eq
            | Op::Ne => OpClass::Compare,
            _ => OpClass::Binary,
        }
    }

    /// `true` if swapping the operands does not change the result.
    #[must_use]
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Op::Add
                | Op::Mul
                | Op::BitOr
                | Op::BitAnd
                | Op::BitXor
                | Op::Max
                | Op::Umax
                | Op::Min
                | Op::Umin
                | Op::Eq
                | Op::Ne
        )
    }

    /// The comparison that holds when this one is evaluated on equal operands.
    #[must_use]
    pub fn holds_on_equal(self) -> Option<bool> {
        match self {
            Op::Eq | Op::Ge | Op::Uge | Op::Le | Op::Ule => Some(true),
            Op::Ne | Op::Gt | Op::Ugt | Op::Lt | Op::Ult => Some(false),
            _ => None,
        }
    }
}
