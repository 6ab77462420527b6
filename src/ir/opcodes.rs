//! The opcode descriptor table.
//!
//! Each [`Opcode`] maps to a static [`OpcodeInfo`] describing its result and operand types,
//! which operand slots must be constants, how many template types it carries and its
//! capability flags. Passes query capabilities through [`OpcodeFlags`] instead of matching on
//! individual opcodes.

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

use crate::ir::Type;

bitflags! {
    /// Capability set of an opcode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpcodeFlags: u16 {
        /// The result depends only on the operands
        const PURE = 0x0001;
        /// Executing the instruction is observable beyond its result
        const SIDE_EFFECT = 0x0002;
        /// Pure computation that may be evaluated as a constant expression
        const CONST = 0x0004;
        /// May read or write any register
        const UNKNOWN_REG_USE = 0x0008;
        /// Transfers control
        const TERMINATOR = 0x0010;
        /// Ends the basic block
        const BB_TERMINATOR = 0x0020;
        /// Carries no semantics
        const ANNOTATION = 0x0040;
    }
}

/// Where the type of a result or operand comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSlot {
    /// Always this type
    Fixed(Type),
    /// The instruction's template type at this index
    Template(usize),
    /// Anything goes
    Any,
}

/// Static description of an opcode.
#[derive(Debug)]
pub struct OpcodeInfo {
    /// Result type
    pub result: TypeSlot,
    /// Types of the fixed operand slots
    pub operands: &'static [TypeSlot],
    /// Operand slots that must hold a constant or register
    pub constexprs: &'static [usize],
    /// Type of any further operands, if the opcode is variadic
    pub variadic: Option<TypeSlot>,
    /// Number of template types
    pub templates: usize,
    /// Capability flags
    pub flags: OpcodeFlags,
}

/// Every instruction kind of the IR.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Opcode {
    /// Placeholder without semantics
    None,
    /// `T read_reg(reg)`
    ReadReg,
    /// `write_reg(reg, T value)`
    WriteReg,
    /// `T load_mem(pointer address, i64 offset)`
    LoadMem,
    /// `store_mem(pointer address, i64 offset, T value)`
    StoreMem,
    /// Undefined value of type `T`
    Undef,
    /// Poisoned value of type `T` with a reason
    Poison,
    /// Sign-extending conversion `T0 -> T1`
    CastSx,
    /// Zero-extending conversion `T0 -> T1`
    Cast,
    /// Bit reinterpretation `T0 -> T1`
    Bitcast,
    /// `T binop(op, T lhs, T rhs)`
    Binop,
    /// `T unop(op, T value)`
    Unop,
    /// `i1 cmp(op, T lhs, T rhs)`
    Cmp,
    /// Merge of incoming values, one per predecessor
    Phi,
    /// `T select(i1 cc, T if_true, T if_false)`
    Select,
    /// Call to an address outside the routine
    Xcall,
    /// Jump to an address outside the routine
    Xjmp,
    /// Jump to a block
    Jmp,
    /// Conditional jump to one of two addresses outside the routine
    Xjs,
    /// Conditional jump to one of two blocks
    Js,
    /// Return to an address
    Xret,
    /// Trap with a reason
    Trap,
    /// Neutralized instruction, erased once unused
    Nop,
    /// Execution never reaches this point
    Unreachable,
}

use TypeSlot::{Any, Fixed, Template};

const PURE_CONST: OpcodeFlags = OpcodeFlags::PURE.union(OpcodeFlags::CONST);
const BRANCH: OpcodeFlags = OpcodeFlags::SIDE_EFFECT.union(OpcodeFlags::TERMINATOR);
const EXIT: OpcodeFlags = BRANCH.union(OpcodeFlags::BB_TERMINATOR);

const fn info(
    result: TypeSlot,
    operands: &'static [TypeSlot],
    constexprs: &'static [usize],
    templates: usize,
    flags: OpcodeFlags,
) -> OpcodeInfo {
    OpcodeInfo {
        result,
        operands,
        constexprs,
        variadic: None,
        templates,
        flags,
    }
}

static OPCODES: [OpcodeInfo; Opcode::COUNT] = [
    // none
    info(Fixed(Type::None), &[], &[], 0, OpcodeFlags::ANNOTATION),
    // read_reg
    info(Template(0), &[Fixed(Type::Reg)], &[0], 1, OpcodeFlags::PURE),
    // write_reg
    info(
        Fixed(Type::None),
        &[Fixed(Type::Reg), Template(0)],
        &[0],
        1,
        OpcodeFlags::SIDE_EFFECT,
    ),
    // load_mem
    info(
        Template(0),
        &[Fixed(Type::Pointer), Fixed(Type::I64)],
        &[1],
        1,
        OpcodeFlags::PURE,
    ),
    // store_mem
    info(
        Fixed(Type::None),
        &[Fixed(Type::Pointer), Fixed(Type::I64), Template(0)],
        &[1],
        1,
        OpcodeFlags::SIDE_EFFECT,
    ),
    // undef
    info(Template(0), &[], &[], 1, PURE_CONST),
    // poison
    info(Template(0), &[Fixed(Type::Str)], &[0], 1, PURE_CONST),
    // cast_sx
    info(Template(1), &[Template(0)], &[], 2, PURE_CONST),
    // cast
    info(Template(1), &[Template(0)], &[], 2, PURE_CONST),
    // bitcast
    info(Template(1), &[Template(0)], &[], 2, PURE_CONST),
    // binop
    info(
        Template(0),
        &[Fixed(Type::Op), Template(0), Template(0)],
        &[0],
        1,
        PURE_CONST,
    ),
    // unop
    info(Template(0), &[Fixed(Type::Op), Template(0)], &[0], 1, PURE_CONST),
    // cmp
    info(
        Fixed(Type::I1),
        &[Fixed(Type::Op), Template(0), Template(0)],
        &[0],
        1,
        PURE_CONST,
    ),
    // phi
    OpcodeInfo {
        result: Template(0),
        operands: &[],
        constexprs: &[],
        variadic: Some(Template(0)),
        templates: 1,
        flags: PURE_CONST,
    },
    // select
    info(
        Template(0),
        &[Fixed(Type::I1), Template(0), Template(0)],
        &[],
        1,
        PURE_CONST,
    ),
    // xcall
    info(
        Fixed(Type::None),
        &[Fixed(Type::Pointer)],
        &[],
        0,
        OpcodeFlags::SIDE_EFFECT.union(OpcodeFlags::UNKNOWN_REG_USE),
    ),
    // xjmp
    info(Fixed(Type::None), &[Fixed(Type::Pointer)], &[], 0, EXIT),
    // jmp
    info(Fixed(Type::None), &[Fixed(Type::Label)], &[], 0, BRANCH),
    // xjs
    info(
        Fixed(Type::None),
        &[Fixed(Type::I1), Fixed(Type::Pointer), Fixed(Type::Pointer)],
        &[1, 2],
        0,
        EXIT,
    ),
    // js
    info(
        Fixed(Type::None),
        &[Fixed(Type::I1), Fixed(Type::Label), Fixed(Type::Label)],
        &[],
        0,
        BRANCH,
    ),
    // xret
    info(
        Fixed(Type::None),
        &[Fixed(Type::Pointer)],
        &[],
        0,
        EXIT.union(OpcodeFlags::UNKNOWN_REG_USE),
    ),
    // trap
    info(Fixed(Type::None), &[Fixed(Type::Str)], &[0], 0, EXIT),
    // nop
    OpcodeInfo {
        result: Fixed(Type::Pack),
        operands: &[],
        constexprs: &[],
        variadic: Some(Any),
        templates: 0,
        flags: OpcodeFlags::empty(),
    },
    // unreachable
    info(Fixed(Type::None), &[], &[], 0, EXIT),
];

impl Opcode {
    /// The static descriptor of this opcode.
    #[must_use]
    pub fn info(self) -> &'static OpcodeInfo {
        &OPCODES[self as usize]
    }

    /// Capability flags.
    #[must_use]
    pub fn flags(self) -> OpcodeFlags {
        self.info().flags
    }

    /// Observable beyond its result.
    #[must_use]
    pub fn has_side_effect(self) -> bool {
        self.flags().contains(OpcodeFlags::SIDE_EFFECT)
    }

    /// Result depends only on the operands.
    #[must_use]
    pub fn is_pure(self) -> bool {
        self.flags().contains(OpcodeFlags::PURE)
    }

    /// Constant-expression opcode.
    #[must_use]
    pub fn is_const(self) -> bool {
        self.flags().contains(OpcodeFlags::CONST)
    }

    /// May touch any register.
    #[must_use]
    pub fn has_unknown_reg_use(self) -> bool {
        self.flags().contains(OpcodeFlags::UNKNOWN_REG_USE)
    }

    /// Transfers control.
    #[must_use]
    pub fn is_terminator(self) -> bool {
        self.flags().contains(OpcodeFlags::TERMINATOR)
    }

    /// Ends the basic block.
    #[must_use]
    pub fn is_bb_terminator(self) -> bool {
        self.flags().contains(OpcodeFlags::BB_TERMINATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_table_matches_enum() {
        for opcode in Opcode::iter() {
            let info = opcode.info();
            for &index in info.constexprs {
                assert!(index < info.operands.len(), "{opcode}");
            }
            for slot in info.operands.iter().chain(std::iter::once(&info.result)) {
                if let TypeSlot::Template(i) = slot {
                    assert!(*i < info.templates, "{opcode}");
                }
            }
        }
    }

    #[test]
    fn test_capabilities() {
        assert!(Opcode::ReadReg.is_pure());
        assert!(!Opcode::ReadReg.has_side_effect());
        assert!(Opcode::WriteReg.has_side_effect());
        assert!(Opcode::Binop.is_const());
        assert!(!Opcode::LoadMem.is_const());
        assert!(Opcode::Xcall.has_unknown_reg_use());
        assert!(Opcode::Xret.has_unknown_reg_use());
        assert!(Opcode::Jmp.is_terminator());
        assert!(!Opcode::Jmp.is_bb_terminator());
        assert!(Opcode::Xjmp.is_bb_terminator());
        assert!(Opcode::Nop.flags().is_empty());
        assert_eq!(Opcode::CastSx.info().templates, 2);
    }

    #[test]
    fn test_names() {
        assert_eq!(Opcode::ReadReg.to_string(), "read_reg");
        assert_eq!(Opcode::CastSx.to_string(), "cast_sx");
    }
}
