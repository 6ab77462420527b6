//! IR instructions.
//!
//! An [`Instruction`] is created detached through one of the builder functions and only
//! becomes part of the graph once a [`crate::ir::Routine`] inserts it. From then on every
//! change to it goes through the routine, which keeps use lists and block links consistent.

use crate::ir::{
    BlockId, Constant, InsnId, MemoryRef, Op, Opcode, OpcodeInfo, Operand, Register, Type,
    TypeSlot, UseId, UseList,
};

/// One operand slot together with the use record it owns, if it references a value.
#[derive(Clone, Debug)]
pub(crate) struct OperandSlot {
    pub(crate) operand: Operand,
    pub(crate) use_id: Option<UseId>,
}

/// A single IR instruction.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub(crate) opcode: Opcode,
    pub(crate) templates: [Type; 2],
    pub(crate) slots: Vec<OperandSlot>,
    pub(crate) block: Option<BlockId>,
    pub(crate) prev: Option<InsnId>,
    pub(crate) next: Option<InsnId>,
    pub(crate) uses: UseList,
    pub(crate) name: u32,
    pub(crate) ip: Option<u64>,
}

impl Instruction {
    /// Creates a detached instruction.
    ///
    /// ## Arguments
    /// * `opcode` - The instruction kind
    /// * `templates` - Template types; unused entries are ignored
    /// * `operands` - Operand slots in descriptor order
    #[must_use]
    pub fn new(opcode: Opcode, templates: &[Type], operands: Vec<Operand>) -> Self {
        let mut types = [Type::None; 2];
        for (slot, ty) in types.iter_mut().zip(templates) {
            *slot = *ty;
        }

        Instruction {
            opcode,
            templates: types,
            slots: operands
                .into_iter()
                .map(|operand| OperandSlot {
                    operand,
                    use_id: None,
                })
                .collect(),
            block: None,
            prev: None,
            next: None,
            uses: UseList::default(),
            name: 0,
            ip: None,
        }
    }

    /// Attaches the address of the machine instruction this was lifted from.
    #[must_use]
    pub fn with_ip(mut self, ip: u64) -> Self {
        self.ip = Some(ip);
        self
    }

    /// `ty read_reg(reg)`
    #[must_use]
    pub fn read_reg(ty: Type, reg: Register) -> Self {
        Self::new(Opcode::ReadReg, &[ty], vec![Operand::Reg(reg)])
    }

    /// `write_reg(reg, value)`, with `ty` the type of `value`.
    #[must_use]
    pub fn write_reg(reg: Register, value: impl Into<Operand>, ty: Type) -> Self {
        Self::new(Opcode::WriteReg, &[ty], vec![Operand::Reg(reg), value.into()])
    }

    /// `ty load_mem(address, offset)`
    #[must_use]
    pub fn load_mem(ty: Type, address: impl Into<Operand>, offset: i64) -> Self {
        Self::new(
            Opcode::LoadMem,
            &[ty],
            vec![address.into(), Constant::I64(offset).into()],
        )
    }

    /// `store_mem(address, offset, value)`, with `ty` the type of `value`.
    #[must_use]
    pub fn store_mem(
        address: impl Into<Operand>,
        offset: i64,
        value: impl Into<Operand>,
        ty: Type,
    ) -> Self {
        Self::new(
            Opcode::StoreMem,
            &[ty],
            vec![address.into(), Constant::I64(offset).into(), value.into()],
        )
    }

    /// Undefined value of type `ty`.
    #[must_use]
    pub fn undef(ty: Type) -> Self {
        Self::new(Opcode::Undef, &[ty], Vec::new())
    }

    /// Poisoned value of type `ty`.
    #[must_use]
    pub fn poison(ty: Type, reason: &str) -> Self {
        Self::new(Opcode::Poison, &[ty], vec![Constant::from(reason).into()])
    }

    /// Zero-extending conversion `from -> to`.
    #[must_use]
    pub fn cast(from: Type, to: Type, value: impl Into<Operand>) -> Self {
        Self::new(Opcode::Cast, &[from, to], vec![value.into()])
    }

    /// Sign-extending conversion `from -> to`.
    #[must_use]
    pub fn cast_sx(from: Type, to: Type, value: impl Into<Operand>) -> Self {
        Self::new(Opcode::CastSx, &[from, to], vec![value.into()])
    }

    /// Bit reinterpretation `from -> to`.
    #[must_use]
    pub fn bitcast(from: Type, to: Type, value: impl Into<Operand>) -> Self {
        Self::new(Opcode::Bitcast, &[from, to], vec![value.into()])
    }

    /// `ty binop(op, lhs, rhs)`
    #[must_use]
    pub fn binop(ty: Type, op: Op, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        Self::new(
            Opcode::Binop,
            &[ty],
            vec![Constant::Op(op).into(), lhs.into(), rhs.into()],
        )
    }

    /// `ty unop(op, value)`
    #[must_use]
    pub fn unop(ty: Type, op: Op, value: impl Into<Operand>) -> Self {
        Self::new(
            Opcode::Unop,
            &[ty],
            vec![Constant::Op(op).into(), value.into()],
        )
    }

    /// `i1 cmp(op, lhs, rhs)` over operands of type `ty`.
    #[must_use]
    pub fn cmp(ty: Type, op: Op, lhs: impl Into<Operand>, rhs: impl Into<Operand>) -> Self {
        Self::new(
            Opcode::Cmp,
            &[ty],
            vec![Constant::Op(op).into(), lhs.into(), rhs.into()],
        )
    }

    /// `ty select(cc, if_true, if_false)`
    #[must_use]
    pub fn select(
        ty: Type,
        cc: impl Into<Operand>,
        if_true: impl Into<Operand>,
        if_false: impl Into<Operand>,
    ) -> Self {
        Self::new(
            Opcode::Select,
            &[ty],
            vec![cc.into(), if_true.into(), if_false.into()],
        )
    }

    /// Phi with one incoming value per predecessor.
    #[must_use]
    pub fn phi(ty: Type, incoming: Vec<Operand>) -> Self {
        Self::new(Opcode::Phi, &[ty], incoming)
    }

    /// Call to an external address.
    #[must_use]
    pub fn xcall(target: impl Into<Operand>) -> Self {
        Self::new(Opcode::Xcall, &[], vec![target.into()])
    }

    /// Jump to an external address.
    #[must_use]
    pub fn xjmp(target: impl Into<Operand>) -> Self {
        Self::new(Opcode::Xjmp, &[], vec![target.into()])
    }

    /// Jump to a block of the same routine.
    #[must_use]
    pub fn jmp(target: BlockId) -> Self {
        Self::new(Opcode::Jmp, &[], vec![target.into()])
    }

    /// Conditional jump to one of two blocks.
    #[must_use]
    pub fn js(cc: impl Into<Operand>, if_true: BlockId, if_false: BlockId) -> Self {
        Self::new(
            Opcode::Js,
            &[],
            vec![cc.into(), if_true.into(), if_false.into()],
        )
    }

    /// Conditional jump to one of two external addresses.
    #[must_use]
    pub fn xjs(cc: impl Into<Operand>, if_true: u64, if_false: u64) -> Self {
        Self::new(
            Opcode::Xjs,
            &[],
            vec![
                cc.into(),
                Constant::Pointer(if_true).into(),
                Constant::Pointer(if_false).into(),
            ],
        )
    }

    /// Return to an address.
    #[must_use]
    pub fn xret(target: impl Into<Operand>) -> Self {
        Self::new(Opcode::Xret, &[], vec![target.into()])
    }

    /// Trap with a reason.
    #[must_use]
    pub fn trap(reason: &str) -> Self {
        Self::new(Opcode::Trap, &[], vec![Constant::from(reason).into()])
    }

    /// Instruction that does nothing.
    #[must_use]
    pub fn nop() -> Self {
        Self::new(Opcode::Nop, &[], Vec::new())
    }

    /// Marks the end of reachable code.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::new(Opcode::Unreachable, &[], Vec::new())
    }

    /// Absolute memory reference load helper.
    #[must_use]
    pub fn load_abs(ty: Type, address: u64) -> Self {
        Self::load_mem(ty, MemoryRef::absolute(address), 0)
    }

    /// The instruction kind.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// The static descriptor of the opcode.
    #[must_use]
    pub fn info(&self) -> &'static OpcodeInfo {
        self.opcode.info()
    }

    /// Both template types; entries beyond the opcode's template count are `none`.
    #[must_use]
    pub fn templates(&self) -> [Type; 2] {
        self.templates
    }

    /// Template type at `index`, `none` if out of range.
    #[must_use]
    pub fn template(&self, index: usize) -> Type {
        self.templates.get(index).copied().unwrap_or_default()
    }

    /// Resolves a descriptor type slot against this instruction.
    #[must_use]
    pub fn resolve(&self, slot: TypeSlot) -> Option<Type> {
        match slot {
            TypeSlot::Fixed(ty) => Some(ty),
            TypeSlot::Template(i) => Some(self.template(i)),
            TypeSlot::Any => None,
        }
    }

    /// Result type.
    #[must_use]
    pub fn ty(&self) -> Type {
        self.resolve(self.info().result).unwrap_or_default()
    }

    /// Number of operand slots.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.slots.len()
    }

    /// Operand at `index`.
    #[must_use]
    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.slots.get(index).map(|s| &s.operand)
    }

    /// Constant operand at `index`.
    #[must_use]
    pub fn const_operand(&self, index: usize) -> Option<&Constant> {
        self.operand(index).and_then(Operand::as_const)
    }

    /// The operator selector of `binop`, `unop` and `cmp`.
    #[must_use]
    pub fn op(&self) -> Option<Op> {
        match (self.opcode, self.const_operand(0)) {
            (Opcode::Binop | Opcode::Unop | Opcode::Cmp, Some(Constant::Op(op))) => Some(*op),
            _ => None,
        }
    }

    /// All operands in slot order.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.slots.iter().map(|s| &s.operand)
    }

    /// The owning block, `None` while detached.
    #[must_use]
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    /// The following instruction in the block.
    #[must_use]
    pub fn next(&self) -> Option<InsnId> {
        self.next
    }

    /// The preceding instruction in the block.
    #[must_use]
    pub fn prev(&self) -> Option<InsnId> {
        self.prev
    }

    /// Number of consumers of the result.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.uses.len()
    }

    /// Per-routine display name.
    #[must_use]
    pub fn name(&self) -> u32 {
        self.name
    }

    /// Address of the originating machine instruction.
    #[must_use]
    pub fn ip(&self) -> Option<u64> {
        self.ip
    }
}
