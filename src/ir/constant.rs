//! Typed literals and the constant algebra used by folding passes.
//!
//! Every operation here answers `None` when the result is not foldable: mismatched operand
//! types, operators that do not exist for a type, integer division by zero, and any meta type.
//! Callers treat `None` as "leave the instruction alone", never as an error.

use std::fmt;

use crate::{
    arch::Endianness,
    ir::{Op, OpClass, Type, TypeKind},
};

/// A typed literal operand.
///
/// Floats compare bitwise so that folding a `NaN` twice reaches a fixed point.
#[derive(Debug, Clone)]
pub enum Constant {
    /// Empty constant, left behind when a referenced value is deleted
    Void,
    /// Boolean
    I1(bool),
    /// 8-bit integer
    I8(i8),
    /// 16-bit integer
    I16(i16),
    /// 32-bit integer
    I32(i32),
    /// 64-bit integer
    I64(i64),
    /// 128-bit integer
    I128(i128),
    /// Single precision float
    F32(f32),
    /// Double precision float
    F64(f64),
    /// Machine pointer
    Pointer(u64),
    /// Operator selector of `binop`, `unop` and `cmp`
    Op(Op),
    /// Annotation or reason string
    Str(String),
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Void, Constant::Void) => true,
            (Constant::I1(a), Constant::I1(b)) => a == b,
            (Constant::I8(a), Constant::I8(b)) => a == b,
            (Constant::I16(a), Constant::I16(b)) => a == b,
            (Constant::I32(a), Constant::I32(b)) => a == b,
            (Constant::I64(a), Constant::I64(b)) => a == b,
            (Constant::I128(a), Constant::I128(b)) => a == b,
            (Constant::F32(a), Constant::F32(b)) => a.to_bits() == b.to_bits(),
            (Constant::F64(a), Constant::F64(b)) => a.to_bits() == b.to_bits(),
            (Constant::Pointer(a), Constant::Pointer(b)) => a == b,
            (Constant::Op(a), Constant::Op(b)) => a == b,
            (Constant::Str(a), Constant::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

fn mask(value: u128, width: u32) -> u128 {
    if width >= 128 {
        value
    } else {
        value & ((1u128 << width) - 1)
    }
}

fn sign_extend(value: u128, width: u32) -> i128 {
    if width >= 128 {
        value as i128
    } else {
        let shift = 128 - width;
        ((value << shift) as i128) >> shift
    }
}

fn read_uint(bytes: &[u8], endian: Endianness) -> u128 {
    match endian {
        Endianness::Little => bytes
            .iter()
            .rev()
            .fold(0u128, |acc, &b| (acc << 8) | u128::from(b)),
        Endianness::Big => bytes
            .iter()
            .fold(0u128, |acc, &b| (acc << 8) | u128::from(b)),
    }
}

macro_rules! fold_float_binary {
    ($op:expr, $a:expr, $b:expr, $ctor:path) => {
        match $op {
            Op::Add => Some($ctor($a + $b)),
            Op::Sub => Some($ctor($a - $b)),
            Op::Mul => Some($ctor($a * $b)),
            Op::Div => Some($ctor($a / $b)),
            Op::Rem => Some($ctor($a % $b)),
            Op::Max => Some($ctor($a.max($b))),
            Op::Min => Some($ctor($a.min($b))),
            Op::Gt => Some(Constant::I1($a > $b)),
            Op::Ge => Some(Constant::I1($a >= $b)),
            Op::Lt => Some(Constant::I1($a < $b)),
            Op::Le => Some(Constant::I1($a <= $b)),
            Op::Eq => Some(Constant::I1($a == $b)),
            Op::Ne => Some(Constant::I1($a != $b)),
            _ => None,
        }
    };
}

macro_rules! fold_float_unary {
    ($op:expr, $a:expr, $ctor:path) => {
        match $op {
            Op::Neg => Some($ctor(-$a)),
            Op::Abs => Some($ctor($a.abs())),
            Op::Ceil => Some($ctor($a.ceil())),
            Op::Floor => Some($ctor($a.floor())),
            Op::Trunc => Some($ctor($a.trunc())),
            Op::Round => Some($ctor($a.round())),
            Op::Sqrt => Some($ctor($a.sqrt())),
            _ => None,
        }
    };
}

impl Constant {
    /// The type of this literal.
    #[must_use]
    pub fn ty(&self) -> Type {
        match self {
            Constant::Void => Type::None,
            Constant::I1(_) => Type::I1,
            Constant::I8(_) => Type::I8,
            Constant::I16(_) => Type::I16,
            Constant::I32(_) => Type::I32,
            Constant::I64(_) => Type::I64,
            Constant::I128(_) => Type::I128,
            Constant::F32(_) => Type::F32,
            Constant::F64(_) => Type::F64,
            Constant::Pointer(_) => Type::Pointer,
            Constant::Op(_) => Type::Op,
            Constant::Str(_) => Type::Str,
        }
    }

    /// Builds an integer or pointer literal of type `ty` from `value`, truncating to the width.
    #[must_use]
    pub fn int(ty: Type, value: i128) -> Option<Constant> {
        if !ty.is_integer() {
            return None;
        }
        Constant::from_raw_bits(ty, value as u128)
    }

    /// Reinterprets the low bits of `raw` as a literal of type `ty`.
    ///
    /// Integers are truncated to their width, floats take their IEEE-754 bit pattern.
    #[must_use]
    pub fn from_raw_bits(ty: Type, raw: u128) -> Option<Constant> {
        Some(match ty {
            Type::I1 => Constant::I1(raw & 1 != 0),
            Type::I8 => Constant::I8(raw as u8 as i8),
            Type::I16 => Constant::I16(raw as u16 as i16),
            Type::I32 => Constant::I32(raw as u32 as i32),
            Type::I64 => Constant::I64(raw as u64 as i64),
            Type::I128 => Constant::I128(raw as i128),
            Type::F32 => Constant::F32(f32::from_bits(raw as u32)),
            Type::F64 => Constant::F64(f64::from_bits(raw as u64)),
            Type::Pointer => Constant::Pointer(raw as u64),
            _ => return None,
        })
    }

    /// The raw bit pattern of a machine scalar, zero-extended.
    #[must_use]
    pub fn raw_bits(&self) -> Option<u128> {
        match self {
            Constant::F32(v) => Some(u128::from(v.to_bits())),
            Constant::F64(v) => Some(u128::from(v.to_bits())),
            _ => self.bits(),
        }
    }

    /// Integer value zero-extended to 128 bits; `None` for anything that is not an integer.
    #[must_use]
    pub fn bits(&self) -> Option<u128> {
        match *self {
            Constant::I1(v) => Some(u128::from(v)),
            Constant::I8(v) => Some(u128::from(v as u8)),
            Constant::I16(v) => Some(u128::from(v as u16)),
            Constant::I32(v) => Some(u128::from(v as u32)),
            Constant::I64(v) => Some(u128::from(v as u64)),
            Constant::I128(v) => Some(v as u128),
            Constant::Pointer(v) => Some(u128::from(v)),
            _ => None,
        }
    }

    /// Integer value as an unsigned 64-bit number, truncating wider integers.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.bits().map(|v| v as u64)
    }

    /// Integer value sign-extended from its own width, truncated to 64 bits.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        let width = self.ty().bit_size();
        self.bits().map(|v| sign_extend(v, width) as i64)
    }

    /// Truth value of an `i1` or integer literal.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.bits().map(|v| v != 0)
    }

    /// `true` for the empty constant.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, Constant::Void)
    }

    /// `true` for an integer zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.bits() == Some(0)
    }

    /// `true` for an integer one.
    #[must_use]
    pub fn is_one(&self) -> bool {
        self.bits() == Some(1)
    }

    /// `true` for an integer with every bit set.
    #[must_use]
    pub fn is_all_ones(&self) -> bool {
        let width = self.ty().bit_size();
        self.bits() == Some(mask(u128::MAX, width)) && width != 0
    }

    /// Applies a binary or comparison operator with `self` as the left-hand side.
    ///
    /// Both operands must have the same type. Integer arithmetic wraps, shift and rotate
    /// amounts are taken modulo the bit width, comparisons produce `i1`.
    #[must_use]
    pub fn apply(&self, op: Op, rhs: &Constant) -> Option<Constant> {
        if op.class() == OpClass::Unary {
            return None;
        }

        let ty = self.ty();
        if rhs.ty() != ty {
            return None;
        }

        match (self, rhs) {
            (Constant::I1(a), Constant::I1(b)) => Self::apply_bool(op, *a, *b),
            (Constant::F32(a), Constant::F32(b)) => fold_float_binary!(op, *a, *b, Constant::F32),
            (Constant::F64(a), Constant::F64(b)) => fold_float_binary!(op, *a, *b, Constant::F64),
            _ if ty.is_integer() => Self::apply_int(ty, op, self.bits()?, rhs.bits()?),
            _ => None,
        }
    }

    fn apply_bool(op: Op, a: bool, b: bool) -> Option<Constant> {
        let value = match op {
            Op::Add | Op::Sub | Op::BitXor => a ^ b,
            Op::Mul | Op::BitAnd | Op::Min | Op::Umin => a && b,
            Op::BitOr | Op::Max | Op::Umax => a || b,
            Op::Div | Op::Udiv => {
                if !b {
                    return None;
                }
                a
            }
            Op::Rem | Op::Urem => {
                if !b {
                    return None;
                }
                false
            }
            // Shift amounts are taken modulo a width of one.
            Op::BitShl | Op::BitShr | Op::BitSar | Op::BitRol | Op::BitRor => a,
            Op::Gt | Op::Ugt => a && !b,
            Op::Ge | Op::Uge => a || !b,
            Op::Lt | Op::Ult => !a && b,
            Op::Le | Op::Ule => !a || b,
            Op::Eq => a == b,
            Op::Ne => a != b,
            _ => return None,
        };
        Some(Constant::I1(value))
    }

    fn apply_int(ty: Type, op: Op, a: u128, b: u128) -> Option<Constant> {
        let width = ty.bit_size();
        let (sa, sb) = (sign_extend(a, width), sign_extend(b, width));
        let amount = (b % u128::from(width)) as u32;

        let value = match op {
            Op::Add => a.wrapping_add(b),
            Op::Sub => a.wrapping_sub(b),
            Op::Mul => a.wrapping_mul(b),
            Op::Div => {
                if b == 0 {
                    return None;
                }
                sa.wrapping_div(sb) as u128
            }
            Op::Udiv => a.checked_div(b)?,
            Op::Rem => {
                if b == 0 {
                    return None;
                }
                sa.wrapping_rem(sb) as u128
            }
            Op::Urem => a.checked_rem(b)?,
            Op::BitOr => a | b,
            Op::BitAnd => a & b,
            Op::BitXor => a ^ b,
            Op::BitShl => a << amount,
            Op::BitShr => a >> amount,
            Op::BitSar => (sa >> amount) as u128,
            Op::BitRol if amount == 0 => a,
            Op::BitRol => (a << amount) | (a >> (width - amount)),
            Op::BitRor if amount == 0 => a,
            Op::BitRor => (a >> amount) | (a << (width - amount)),
            Op::Max => {
                if sa >= sb {
                    a
                } else {
                    b
                }
            }
            Op::Min => {
                if sa <= sb {
                    a
                } else {
                    b
                }
            }
            Op::Umax => a.max(b),
            Op::Umin => a.min(b),
            Op::Gt => return Some(Constant::I1(sa > sb)),
            Op::Ge => return Some(Constant::I1(sa >= sb)),
            Op::Lt => return Some(Constant::I1(sa < sb)),
            Op::Le => return Some(Constant::I1(sa <= sb)),
            Op::Ugt => return Some(Constant::I1(a > b)),
            Op::Uge => return Some(Constant::I1(a >= b)),
            Op::Ult => return Some(Constant::I1(a < b)),
            Op::Ule => return Some(Constant::I1(a <= b)),
            Op::Eq => return Some(Constant::I1(a == b)),
            Op::Ne => return Some(Constant::I1(a != b)),
            _ => return None,
        };
        Constant::from_raw_bits(ty, mask(value, width))
    }

    /// Applies a unary operator.
    ///
    /// `bit_lsb` and `bit_msb` of zero are undefined and not foldable, `bit_byteswap` requires
    /// a width that is a multiple of eight.
    #[must_use]
    pub fn apply_unary(&self, op: Op) -> Option<Constant> {
        if op.class() != OpClass::Unary {
            return None;
        }

        match *self {
            Constant::I1(v) => match op {
                Op::Neg | Op::Abs | Op::BitPopcnt | Op::BitByteswap => Some(Constant::I1(v)),
                Op::BitNot => Some(Constant::I1(!v)),
                Op::BitLsb | Op::BitMsb if v => Some(Constant::I1(false)),
                _ => None,
            },
            Constant::F32(v) => fold_float_unary!(op, v, Constant::F32),
            Constant::F64(v) => fold_float_unary!(op, v, Constant::F64),
            _ => {
                let ty = self.ty();
                let width = ty.bit_size();
                let a = self.bits()?;
                let value = match op {
                    Op::Neg => 0u128.wrapping_sub(a),
                    Op::Abs => sign_extend(a, width).wrapping_abs() as u128,
                    Op::BitNot => !a,
                    Op::BitPopcnt => u128::from(a.count_ones()),
                    Op::BitByteswap if width % 8 == 0 => a.swap_bytes() >> (128 - width),
                    Op::BitLsb if a != 0 => u128::from(a.trailing_zeros()),
                    Op::BitMsb if a != 0 => u128::from(127 - a.leading_zeros()),
                    _ => return None,
                };
                Constant::from_raw_bits(ty, mask(value, width))
            }
        }
    }

    /// Zero-extending conversion to `into`; the source integer is treated as unsigned.
    ///
    /// Narrowing truncates, an `i1` destination takes bit 0 of an integer source. Float
    /// sources convert by value.
    #[must_use]
    pub fn cast_zx(&self, into: Type) -> Option<Constant> {
        self.convert(into, false)
    }

    /// Sign-extending conversion to `into`; the source integer is treated as signed.
    #[must_use]
    pub fn cast_sx(&self, into: Type) -> Option<Constant> {
        self.convert(into, true)
    }

    fn convert(&self, into: Type, signed: bool) -> Option<Constant> {
        let from = self.ty();
        if from == into && !from.is_meta() {
            return Some(self.clone());
        }

        match (from.kind(), into.kind()) {
            (TypeKind::Integer, TypeKind::Integer) => {
                let bits = self.bits()?;
                if into == Type::I1 {
                    return Some(Constant::I1(bits & 1 != 0));
                }
                let value = if signed {
                    sign_extend(bits, from.bit_size()) as u128
                } else {
                    bits
                };
                Constant::from_raw_bits(into, value)
            }
            (TypeKind::Integer, TypeKind::Float) => {
                let bits = self.bits()?;
                let signed_value = sign_extend(bits, from.bit_size());
                match into {
                    Type::F32 if signed => Some(Constant::F32(signed_value as f32)),
                    Type::F32 => Some(Constant::F32(bits as f32)),
                    Type::F64 if signed => Some(Constant::F64(signed_value as f64)),
                    Type::F64 => Some(Constant::F64(bits as f64)),
                    _ => None,
                }
            }
            (TypeKind::Float, TypeKind::Integer) => {
                if into == Type::I1 {
                    return None;
                }
                let value = match *self {
                    Constant::F32(v) => v as i128,
                    Constant::F64(v) => v as i128,
                    _ => return None,
                };
                Constant::from_raw_bits(into, value as u128)
            }
            (TypeKind::Float, TypeKind::Float) => match (self, into) {
                (Constant::F32(v), Type::F64) => Some(Constant::F64(f64::from(*v))),
                (Constant::F64(v), Type::F32) => Some(Constant::F32(*v as f32)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Reinterprets the bit pattern as `into`; both types must be the same width.
    #[must_use]
    pub fn bitcast(&self, into: Type) -> Option<Constant> {
        let from = self.ty();
        if from.is_meta() || into.is_meta() || from.bit_size() != into.bit_size() {
            return None;
        }
        Constant::from_raw_bits(into, self.raw_bits()?)
    }

    /// Reads a literal of type `ty` from the start of `bytes`.
    ///
    /// Returns `None` for meta types or when `bytes` is shorter than the type.
    #[must_use]
    pub fn from_bytes(ty: Type, bytes: &[u8], endian: Endianness) -> Option<Constant> {
        let size = ty.byte_size();
        if size == 0 || bytes.len() < size {
            return None;
        }
        Constant::from_raw_bits(ty, read_uint(&bytes[..size], endian))
    }

    /// Reads a pointer of `width` bytes (at most 8) from the start of `bytes`.
    #[must_use]
    pub fn pointer_from_bytes(bytes: &[u8], width: usize, endian: Endianness) -> Option<Constant> {
        if width == 0 || width > 8 || bytes.len() < width {
            return None;
        }
        Some(Constant::Pointer(read_uint(&bytes[..width], endian) as u64))
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Void => write!(f, "void"),
            Constant::I1(v) => write!(f, "{v}"),
            Constant::I8(v) => write!(f, "{v}"),
            Constant::I16(v) => write!(f, "{v}"),
            Constant::I32(v) => write!(f, "{v}"),
            Constant::I64(v) => write!(f, "{v}"),
            Constant::I128(v) => write!(f, "{v}"),
            Constant::F32(v) => write!(f, "{v:?}"),
            Constant::F64(v) => write!(f, "{v:?}"),
            Constant::Pointer(v) => write!(f, "{v:#x}"),
            Constant::Op(op) => write!(f, "{op}"),
            Constant::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Constant {
    fn from(value: bool) -> Self {
        Constant::I1(value)
    }
}

impl From<i8> for Constant {
    fn from(value: i8) -> Self {
        Constant::I8(value)
    }
}

impl From<i16> for Constant {
    fn from(value: i16) -> Self {
        Constant::I16(value)
    }
}

impl From<i32> for Constant {
    fn from(value: i32) -> Self {
        Constant::I32(value)
    }
}

impl From<i64> for Constant {
    fn from(value: i64) -> Self {
        Constant::I64(value)
    }
}

impl From<f32> for Constant {
    fn from(value: f32) -> Self {
        Constant::F32(value)
    }
}

impl From<f64> for Constant {
    fn from(value: f64) -> Self {
        Constant::F64(value)
    }
}

impl From<Op> for Constant {
    fn from(value: Op) -> Self {
        Constant::Op(value)
    }
}

impl From<&str> for Constant {
    fn from(value: &str) -> Self {
        Constant::Str(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic() {
        let a = Constant::I32(2);
        let b = Constant::I32(3);
        assert_eq!(a.apply(Op::Add, &b), Some(Constant::I32(5)));
        assert_eq!(a.apply(Op::Sub, &b), Some(Constant::I32(-1)));
        assert_eq!(
            Constant::I8(127).apply(Op::Add, &Constant::I8(1)),
            Some(Constant::I8(-128))
        );
        assert_eq!(
            Constant::I32(-7).apply(Op::Div, &Constant::I32(2)),
            Some(Constant::I32(-3))
        );
        assert_eq!(
            Constant::I32(-7).apply(Op::Udiv, &Constant::I32(2)),
            Some(Constant::I32(0x7FFF_FFFC))
        );
    }

    #[test]
    fn test_not_foldable() {
        assert_eq!(Constant::I32(1).apply(Op::Div, &Constant::I32(0)), None);
        assert_eq!(Constant::I64(1).apply(Op::Urem, &Constant::I64(0)), None);
        assert_eq!(Constant::I32(1).apply(Op::Add, &Constant::I64(1)), None);
        assert_eq!(Constant::F32(1.0).apply(Op::BitXor, &Constant::F32(1.0)), None);
        assert_eq!(Constant::I32(1).apply_unary(Op::Sqrt), None);
        assert_eq!(Constant::I32(0).apply_unary(Op::BitLsb), None);
        assert_eq!(Constant::Op(Op::Add).apply(Op::Add, &Constant::Op(Op::Add)), None);
    }

    #[test]
    fn test_shifts_and_rotates() {
        assert_eq!(
            Constant::I8(1).apply(Op::BitShl, &Constant::I8(9)),
            Some(Constant::I8(2))
        );
        assert_eq!(
            Constant::I8(-128).apply(Op::BitSar, &Constant::I8(7)),
            Some(Constant::I8(-1))
        );
        assert_eq!(
            Constant::I8(-128).apply(Op::BitShr, &Constant::I8(7)),
            Some(Constant::I8(1))
        );
        assert_eq!(
            Constant::I16(0x1234).apply(Op::BitRol, &Constant::I16(4)),
            Some(Constant::I16(0x2341))
        );
        assert_eq!(
            Constant::I16(0x1234).apply(Op::BitRor, &Constant::I16(4)),
            Some(Constant::I16(0x4123))
        );
        assert_eq!(
            Constant::I128(1).apply(Op::BitRor, &Constant::I128(1)),
            Some(Constant::I128(i128::MIN))
        );
    }

    #[test]
    fn test_compares() {
        let minus_one = Constant::I32(-1);
        let one = Constant::I32(1);
        assert_eq!(minus_one.apply(Op::Lt, &one), Some(Constant::I1(true)));
        assert_eq!(minus_one.apply(Op::Ult, &one), Some(Constant::I1(false)));
        assert_eq!(one.apply(Op::Eq, &one), Some(Constant::I1(true)));
        assert_eq!(
            Constant::F64(f64::NAN).apply(Op::Eq, &Constant::F64(f64::NAN)),
            Some(Constant::I1(false))
        );
    }

    #[test]
    fn test_bool_rules() {
        let t = Constant::I1(true);
        let f = Constant::I1(false);
        assert_eq!(t.apply(Op::Add, &t), Some(Constant::I1(false)));
        assert_eq!(t.apply(Op::Mul, &f), Some(Constant::I1(false)));
        assert_eq!(t.apply(Op::Max, &f), Some(Constant::I1(true)));
        assert_eq!(t.apply(Op::Div, &f), None);
        assert_eq!(t.apply(Op::Ugt, &f), Some(Constant::I1(true)));
        assert_eq!(t.apply_unary(Op::BitNot), Some(Constant::I1(false)));
    }

    #[test]
    fn test_unary() {
        assert_eq!(Constant::I32(5).apply_unary(Op::Neg), Some(Constant::I32(-5)));
        assert_eq!(Constant::I8(-128).apply_unary(Op::Abs), Some(Constant::I8(-128)));
        assert_eq!(
            Constant::I32(0x1234_5678).apply_unary(Op::BitByteswap),
            Some(Constant::I32(0x7856_3412))
        );
        assert_eq!(Constant::I32(0x50).apply_unary(Op::BitLsb), Some(Constant::I32(4)));
        assert_eq!(Constant::I32(0x50).apply_unary(Op::BitMsb), Some(Constant::I32(6)));
        assert_eq!(Constant::I16(-1).apply_unary(Op::BitPopcnt), Some(Constant::I16(16)));
        assert_eq!(Constant::F64(2.5).apply_unary(Op::Floor), Some(Constant::F64(2.0)));
    }

    #[test]
    fn test_casts() {
        assert_eq!(Constant::I8(-1).cast_sx(Type::I32), Some(Constant::I32(-1)));
        assert_eq!(Constant::I8(-1).cast_zx(Type::I32), Some(Constant::I32(0xFF)));
        assert_eq!(Constant::I32(0x1_02).cast_zx(Type::I8), Some(Constant::I8(2)));
        assert_eq!(Constant::I32(2).cast_zx(Type::I1), Some(Constant::I1(false)));
        assert_eq!(Constant::I32(3).cast_sx(Type::I1), Some(Constant::I1(true)));
        assert_eq!(Constant::I1(true).cast_zx(Type::I16), Some(Constant::I16(1)));
        assert_eq!(Constant::I1(true).cast_sx(Type::I16), Some(Constant::I16(-1)));
        assert_eq!(Constant::I8(-2).cast_sx(Type::F64), Some(Constant::F64(-2.0)));
        assert_eq!(Constant::I8(-2).cast_zx(Type::F32), Some(Constant::F32(254.0)));
        assert_eq!(Constant::F64(-3.75).cast_sx(Type::I32), Some(Constant::I32(-3)));
        assert_eq!(Constant::F32(1.5).cast_zx(Type::F64), Some(Constant::F64(1.5)));
        assert_eq!(Constant::I32(-1).cast_zx(Type::Pointer), Some(Constant::Pointer(0xFFFF_FFFF)));
        assert_eq!(Constant::Str("x".into()).cast_zx(Type::I32), None);
    }

    #[test]
    fn test_bitcast() {
        assert_eq!(
            Constant::F32(1.0).bitcast(Type::I32),
            Some(Constant::I32(0x3F80_0000))
        );
        assert_eq!(Constant::I64(-1).bitcast(Type::Pointer), Some(Constant::Pointer(u64::MAX)));
        assert_eq!(Constant::I32(1).bitcast(Type::I64), None);
    }

    #[test]
    fn test_from_bytes() {
        let bytes = [0x78, 0x56, 0x34, 0x12, 0xAA];
        assert_eq!(
            Constant::from_bytes(Type::I32, &bytes, Endianness::Little),
            Some(Constant::I32(0x1234_5678))
        );
        assert_eq!(
            Constant::from_bytes(Type::I16, &bytes, Endianness::Big),
            Some(Constant::I16(0x7856))
        );
        assert_eq!(Constant::from_bytes(Type::I64, &bytes, Endianness::Little), None);
        assert_eq!(Constant::from_bytes(Type::Label, &bytes, Endianness::Little), None);
        assert_eq!(
            Constant::pointer_from_bytes(&bytes, 4, Endianness::Little),
            Some(Constant::Pointer(0x1234_5678))
        );
    }

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(Constant::F32(f32::NAN), Constant::F32(f32::NAN));
        assert_ne!(Constant::F64(0.0), Constant::F64(-0.0));
        assert_ne!(Constant::I32(0), Constant::I64(0));
    }

    #[test]
    fn test_predicates() {
        assert!(Constant::I8(-1).is_all_ones());
        assert!(Constant::I1(true).is_all_ones());
        assert!(!Constant::F32(0.0).is_zero());
        assert!(Constant::Pointer(0).is_zero());
        assert_eq!(Constant::int(Type::I8, 300), Some(Constant::I8(44)));
        assert_eq!(Constant::I16(-2).as_i64(), Some(-2));
        assert_eq!(Constant::I16(-2).as_u64(), Some(0xFFFE));
    }
}
