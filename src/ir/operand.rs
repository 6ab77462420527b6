//! Operand slots of an instruction.

use std::fmt;

use crate::ir::{BlockId, Constant, InsnId, ValueId};

/// An architecture register, opaque to the IR.
///
/// The `id` is architecture defined and limited to 24 bits, `kind` distinguishes register
/// classes (general purpose, flags, vector, ...). Together they form the [`Register::uid`] used
/// as the key of register tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register {
    id: u32,
    kind: u8,
}

impl Register {
    /// Creates a register, truncating `id` to 24 bits.
    #[must_use]
    pub const fn new(id: u32, kind: u8) -> Self {
        Register {
            id: id & 0x00FF_FFFF,
            kind,
        }
    }

    /// Architecture defined register number.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Register class.
    #[must_use]
    pub const fn kind(&self) -> u8 {
        self.kind
    }

    /// Unique key combining id and kind.
    #[must_use]
    pub const fn uid(&self) -> u32 {
        self.id | ((self.kind as u32) << 24)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}.{}", self.kind, self.id)
    }
}

/// A memory reference `segment:[base + index * scale + displacement]`, every part optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryRef {
    /// Segment override
    pub segment: Option<Register>,
    /// Base register
    pub base: Option<Register>,
    /// Index register
    pub index: Option<Register>,
    /// Index multiplier
    pub scale: u8,
    /// Constant displacement
    pub displacement: i64,
}

impl MemoryRef {
    /// An absolute reference to `address`.
    #[must_use]
    pub fn absolute(address: u64) -> Self {
        MemoryRef {
            displacement: address as i64,
            ..MemoryRef::default()
        }
    }

    /// The address, if the reference depends on no register at all.
    #[must_use]
    pub fn absolute_address(&self) -> Option<u64> {
        if self.segment.is_none() && self.base.is_none() && self.index.is_none() {
            Some(self.displacement as u64)
        } else {
            None
        }
    }
}

impl fmt::Display for MemoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(segment) = self.segment {
            write!(f, "{segment}:")?;
        }
        write!(f, "[")?;
        let mut empty = true;
        if let Some(base) = self.base {
            write!(f, "{base}")?;
            empty = false;
        }
        if let Some(index) = self.index {
            if !empty {
                write!(f, "+")?;
            }
            write!(f, "{index}*{}", self.scale)?;
            empty = false;
        }
        if empty {
            write!(f, "{:#x}", self.displacement)?;
        } else if self.displacement < 0 {
            write!(f, "-{:#x}", self.displacement.unsigned_abs())?;
        } else if self.displacement > 0 {
            write!(f, "+{:#x}", self.displacement)?;
        }
        write!(f, "]")
    }
}

/// The content of one operand slot.
///
/// Only [`Operand::Value`] participates in use tracking; constants, registers and memory
/// references are plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Typed literal
    Const(Constant),
    /// Architecture register
    Reg(Register),
    /// Memory reference
    Mem(MemoryRef),
    /// Reference to another value of the same routine
    Value(ValueId),
}

impl Operand {
    /// `true` for constant operands.
    #[must_use]
    pub fn is_const(&self) -> bool {
        matches!(self, Operand::Const(_))
    }

    /// The literal, if this is a constant.
    #[must_use]
    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            Operand::Const(c) => Some(c),
            _ => None,
        }
    }

    /// The register, if this is a register operand.
    #[must_use]
    pub fn as_reg(&self) -> Option<Register> {
        match self {
            Operand::Reg(r) => Some(*r),
            _ => None,
        }
    }

    /// The referenced value, if any.
    #[must_use]
    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// The referenced instruction, if this operand references one.
    #[must_use]
    pub fn as_insn(&self) -> Option<InsnId> {
        match self {
            Operand::Value(ValueId::Insn(id)) => Some(*id),
            _ => None,
        }
    }
}

impl From<Constant> for Operand {
    fn from(value: Constant) -> Self {
        Operand::Const(value)
    }
}

impl From<Register> for Operand {
    fn from(value: Register) -> Self {
        Operand::Reg(value)
    }
}

impl From<MemoryRef> for Operand {
    fn from(value: MemoryRef) -> Self {
        Operand::Mem(value)
    }
}

impl From<ValueId> for Operand {
    fn from(value: ValueId) -> Self {
        Operand::Value(value)
    }
}

impl From<InsnId> for Operand {
    fn from(value: InsnId) -> Self {
        Operand::Value(ValueId::Insn(value))
    }
}

impl From<BlockId> for Operand {
    fn from(value: BlockId) -> Self {
        Operand::Value(ValueId::Block(value))
    }
}
