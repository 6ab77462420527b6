//! Semantic types carried by IR values and operands.

use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

/// Broad classification of a [`Type`], used by the constant algebra and the cast rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// IR meta types that never hold machine data (`none`, `pack`, `reg`, `op`, `label`, `str`)
    Meta,
    /// Integers of any width, including `i1` and pointers
    Integer,
    /// IEEE-754 floating point
    Float,
}

/// The type of an IR value or operand.
///
/// Besides the machine scalars, the IR uses a handful of meta types: `reg` and `op` for
/// register and operator selector operands, `label` for basic blocks used as branch targets,
/// `str` for annotation strings and `pack` for the result of instructions that produce a
/// bundle of nothing in particular (`nop`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    /// No result
    #[default]
    None,
    /// Opaque bundle
    Pack,
    /// Register operand
    Reg,
    /// Operator selector operand
    Op,
    /// Basic block label
    Label,
    /// Annotation string
    Str,
    /// Boolean
    I1,
    /// 8-bit integer
    I8,
    /// 16-bit integer
    I16,
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 128-bit integer
    I128,
    /// Single precision float
    F32,
    /// Double precision float
    F64,
    /// Machine pointer, stored as 64 bits regardless of the architecture
    Pointer,
}

impl Type {
    /// Returns the [`TypeKind`] of this type.
    #[must_use]
    pub fn kind(self) -> TypeKind {
        match self {
            Type::I1 | Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::I128 | Type::Pointer => {
                TypeKind::Integer
            }
            Type::F32 | Type::F64 => TypeKind::Float,
            _ => TypeKind::Meta,
        }
    }

    /// Width in bits, zero for meta types.
    #[must_use]
    pub fn bit_size(self) -> u32 {
        match self {
            Type::I1 => 1,
            Type::I8 => 8,
            Type::I16 => 16,
            Type::I32 | Type::F32 => 32,
            Type::I64 | Type::F64 | Type::Pointer => 64,
            Type::I128 => 128,
            _ => 0,
        }
    }

    /// Width in bytes when stored in memory; `i1` occupies a full byte.
    #[must_use]
    pub fn byte_size(self) -> usize {
        (self.bit_size() as usize).div_ceil(8)
    }

    /// `true` for integers, `i1` and pointers.
    #[must_use]
    pub fn is_integer(self) -> bool {
        self.kind() == TypeKind::Integer
    }

    /// `true` for `f32` and `f64`.
    #[must_use]
    pub fn is_float(self) -> bool {
        self.kind() == TypeKind::Float
    }

    /// `true` for types that never hold machine data.
    #[must_use]
    pub fn is_meta(self) -> bool {
        self.kind() == TypeKind::Meta
    }

    /// The signed integer type of the given width in bits, if there is one.
    #[must_use]
    pub fn integer(bits: u32) -> Option<Type> {
        match bits {
            1 => Some(Type::I1),
            8 => Some(Type::I8),
            16 => Some(Type::I16),
            32 => Some(Type::I32),
            64 => Some(Type::I64),
            128 => Some(Type::I128),
            _ => None,
        }
    }
}
