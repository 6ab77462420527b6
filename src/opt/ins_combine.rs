//! Local instruction combination.
//!
//! Peephole rules that replace an instruction with a simpler equivalent or rewrite it into a
//! preferred form. The first matching rule wins; the scheduler's fixpoint loop takes care of
//! rules that enable each other.
//!
//! ## Integer operators
//! - `0 + x` → `x + 0` (constants move to the right of commutative operators)
//! - `x + 0`, `x - 0`, `x | 0`, `x ^ 0`, shifts and rotates by 0 → `x`
//! - `x * 1`, `x / 1`, `x & -1` → `x`
//! - `x * 0`, `x & 0`, `x % 1` → `0`, `x | -1` → `-1`
//! - `x | x`, `x & x`, `max(x, x)`, `min(x, x)` → `x`
//! - `x ^ x`, `x - x` → `0`
//! - `x - c` → `x + (-c)`
//! - `(x + c1) + c2` → `x + (c1 + c2)`
//! - `x == x` and every other comparison of a value with itself → constant
//! - `~~x`, `-(-x)`, `bswap(bswap(x))` → `x`
//!
//! ## Casts
//! - casts and bitcasts between identical types are removed
//! - `bitcast(bitcast(x))` → `bitcast(x)`
//! - integer cast chains that lose no information are shortened or removed
//!
//! ## Selects
//! - `select(c, x, x)` → `x`

use log::trace;

use crate::{
    ir::{BlockId, Constant, InsnId, Op, OpClass, Opcode, Operand, Routine, Type},
    opt::util,
    Result,
};

/// Replaces every use of `id` with `with`; returns the mutation count.
fn replace(routine: &mut Routine, id: InsnId, with: Operand) -> Result<usize> {
    if with == Operand::Value(id.into()) {
        return Ok(0);
    }
    trace!("ins_combine: {} -> {with:?}", routine.display_insn(id));
    Ok(1 + routine.replace_all_uses_with(id, with)?)
}

/// The producing instruction behind an operand, if it matches `opcode`.
fn producer(routine: &Routine, operand: Option<&Operand>, opcode: Opcode) -> Option<InsnId> {
    let id = operand?.as_insn()?;
    (routine.get_insn(id)?.opcode() == opcode).then_some(id)
}

/// Identity and absorption rules for `x op c`.
fn identity_with_constant(op: Op, x: &Operand, c: &Constant, ty: Type) -> Option<Operand> {
    let zero = || Constant::int(ty, 0).map(Operand::from);
    match op {
        Op::Add
        | Op::Sub
        | Op::BitOr
        | Op::BitXor
        | Op::BitShl
        | Op::BitShr
        | Op::BitSar
        | Op::BitRol
        | Op::BitRor
            if c.is_zero() =>
        {
            Some(x.clone())
        }
        Op::Mul | Op::Div | Op::Udiv if c.is_one() => Some(x.clone()),
        Op::BitAnd if c.is_all_ones() => Some(x.clone()),
        Op::Mul | Op::BitAnd if c.is_zero() => zero(),
        Op::Rem | Op::Urem if c.is_one() => zero(),
        Op::BitOr if c.is_all_ones() => Some(c.clone().into()),
        _ => None,
    }
}

/// Rules for `x op x`.
fn identity_with_self(op: Op, x: &Operand, ty: Type) -> Option<Operand> {
    match op {
        Op::BitOr | Op::BitAnd | Op::Max | Op::Umax | Op::Min | Op::Umin => Some(x.clone()),
        Op::BitXor | Op::Sub => Constant::int(ty, 0).map(Operand::from),
        _ => None,
    }
}

fn combine_binop(routine: &mut Routine, id: InsnId) -> Result<usize> {
    let ins = &routine[id];
    let ty = ins.template(0);
    let (Some(op), Some(lhs), Some(rhs)) = (ins.op(), ins.operand(1), ins.operand(2)) else {
        return Ok(0);
    };
    if !ty.is_integer() {
        return Ok(0);
    }
    let (lhs, rhs) = (lhs.clone(), rhs.clone());

    if op.is_commutative() && lhs.is_const() && !rhs.is_const() {
        routine.set_operand(id, 1, rhs)?;
        routine.set_operand(id, 2, lhs)?;
        return Ok(1);
    }

    if let Some(c) = rhs.as_const() {
        if let Some(with) = identity_with_constant(op, &lhs, c, ty) {
            return replace(routine, id, with);
        }
    }

    if util::is_identical(routine, &lhs, &rhs) {
        if let Some(with) = identity_with_self(op, &lhs, ty) {
            return replace(routine, id, with);
        }
    }

    let Some(c2) = rhs.as_const() else {
        return Ok(0);
    };

    if op == Op::Sub && !lhs.is_const() {
        let negated = Constant::int(ty, 0).and_then(|zero| zero.apply(Op::Sub, c2));
        if let Some(negated) = negated {
            routine.set_operand(id, 0, Constant::Op(Op::Add))?;
            routine.set_operand(id, 2, negated)?;
            return Ok(1);
        }
    }

    if op == Op::Add {
        if let Some(inner) = producer(routine, Some(&lhs), Opcode::Binop) {
            let inner = &routine[inner];
            if inner.op() == Some(Op::Add) && inner.template(0) == ty {
                let merged = inner
                    .const_operand(2)
                    .and_then(|c1| c1.apply(Op::Add, c2));
                if let (Some(x), Some(merged)) = (inner.operand(1).cloned(), merged) {
                    routine.set_operand(id, 1, x)?;
                    routine.set_operand(id, 2, merged)?;
                    return Ok(1);
                }
            }
        }
    }
    Ok(0)
}

fn combine_cmp(routine: &mut Routine, id: InsnId) -> Result<usize> {
    let ins = &routine[id];
    let (Some(op), Some(lhs), Some(rhs)) = (ins.op(), ins.operand(1), ins.operand(2)) else {
        return Ok(0);
    };
    if !ins.template(0).is_integer() {
        return Ok(0);
    }
    let (lhs, rhs) = (lhs.clone(), rhs.clone());

    if op.is_commutative() && lhs.is_const() && !rhs.is_const() {
        routine.set_operand(id, 1, rhs)?;
        routine.set_operand(id, 2, lhs)?;
        return Ok(1);
    }

    match op.holds_on_equal() {
        Some(result) if util::is_identical(routine, &lhs, &rhs) => {
            replace(routine, id, Constant::I1(result).into())
        }
        _ => Ok(0),
    }
}

fn combine_unop(routine: &mut Routine, id: InsnId) -> Result<usize> {
    let ins = &routine[id];
    let (Some(op), ty) = (ins.op(), ins.template(0)) else {
        return Ok(0);
    };
    if op.class() != OpClass::Unary || !matches!(op, Op::BitNot | Op::Neg | Op::BitByteswap) {
        return Ok(0);
    }

    let Some(inner) = producer(routine, ins.operand(1), Opcode::Unop) else {
        return Ok(0);
    };
    let inner = &routine[inner];
    if inner.op() != Some(op) || inner.template(0) != ty {
        return Ok(0);
    }
    let inner_source = inner.operand(1).cloned();
    match inner_source {
        Some(x) => replace(routine, id, x),
        None => Ok(0),
    }
}

fn combine_bitcast(routine: &mut Routine, id: InsnId) -> Result<usize> {
    let ins = &routine[id];
    let Some(source) = ins.operand(0).cloned() else {
        return Ok(0);
    };
    if ins.template(0) == ins.template(1) {
        return replace(routine, id, source);
    }

    let Some(inner) = producer(routine, Some(&source), Opcode::Bitcast) else {
        return Ok(0);
    };
    let inner = &routine[inner];
    let (Some(value), from) = (inner.operand(0).cloned(), inner.template(0)) else {
        return Ok(0);
    };
    routine.set_template(id, 0, from)?;
    routine.set_operand(id, 0, value)?;
    Ok(1)
}

fn combine_cast(routine: &mut Routine, id: InsnId) -> Result<usize> {
    let ins = &routine[id];
    let (t1, t2) = (ins.template(0), ins.template(1));
    let sign_extends = ins.opcode() == Opcode::CastSx;
    let Some(source) = ins.operand(0).cloned() else {
        return Ok(0);
    };
    if t1 == t2 {
        return replace(routine, id, source);
    }

    let inner = producer(routine, Some(&source), Opcode::Cast)
        .or_else(|| producer(routine, Some(&source), Opcode::CastSx));
    let Some(inner) = inner else {
        return Ok(0);
    };
    let inner = &routine[inner];
    let t0 = inner.template(0);
    let inner_extends = inner.opcode() == Opcode::CastSx;
    let Some(value) = inner.operand(0).cloned() else {
        return Ok(0);
    };

    if inner.template(1) != t1 || !(t0.is_integer() && t1.is_integer() && t2.is_integer()) {
        return Ok(0);
    }
    let (b0, b1, b2) = (t0.bit_size(), t1.bit_size(), t2.bit_size());

    let retarget = if b1 >= b0 {
        if b2 == b0 {
            // i16 -> i32 -> i16
            return replace(routine, id, value);
        }
        // i32 -> i64 -> i16, or i16 -> i32 -> i64 with matching extension
        b2 < b0 || (b2 >= b1 && inner_extends == sign_extends)
    } else {
        // i32 -> i16 -> i8
        b2 <= b1
    };

    if !retarget {
        return Ok(0);
    }
    routine.set_template(id, 0, t0)?;
    routine.set_operand(id, 0, value)?;
    Ok(1)
}

fn combine_select(routine: &mut Routine, id: InsnId) -> Result<usize> {
    let ins = &routine[id];
    let (Some(a), Some(b)) = (ins.operand(1), ins.operand(2)) else {
        return Ok(0);
    };
    if !util::is_identical(routine, a, b) {
        return Ok(0);
    }
    let a = a.clone();
    replace(routine, id, a)
}

/// Applies the peephole rules to every instruction of `block`; returns the mutation count.
///
/// # Errors
/// Propagates graph integrity errors.
pub fn ins_combine(routine: &mut Routine, block: BlockId) -> Result<usize> {
    let mut n = 0;
    let mut cursor = routine.cursor(block)?;

    while let Some(id) = cursor.next(routine) {
        n += match routine[id].opcode() {
            Opcode::Binop => combine_binop(routine, id)?,
            Opcode::Cmp => combine_cmp(routine, id)?,
            Opcode::Unop => combine_unop(routine, id)?,
            Opcode::Bitcast => combine_bitcast(routine, id)?,
            Opcode::Cast | Opcode::CastSx => combine_cast(routine, id)?,
            Opcode::Select => combine_select(routine, id)?,
            _ => 0,
        };
    }
    util::complete(routine, block, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Register};

    fn r(id: u32) -> Register {
        Register::new(id, 1)
    }

    /// Builds `write r9, f(read r0)` and returns the routine, block, read and write.
    fn harness(build: impl FnOnce(InsnId) -> Instruction, ty: Type) -> (Routine, BlockId, InsnId, InsnId) {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let x = routine.push_back(block, Instruction::read_reg(Type::I32, r(0))).unwrap();
        let y = routine.push_back(block, build(x)).unwrap();
        let w = routine.push_back(block, Instruction::write_reg(r(9), y, ty)).unwrap();
        (routine, block, x, w)
    }

    fn written(routine: &Routine, w: InsnId) -> Operand {
        routine[w].operand(1).cloned().unwrap()
    }

    #[test]
    fn test_identities() -> Result<()> {
        let cases: Vec<(Op, Constant, Option<Constant>)> = vec![
            (Op::Add, Constant::I32(0), None),
            (Op::BitXor, Constant::I32(0), None),
            (Op::BitShl, Constant::I32(0), None),
            (Op::Mul, Constant::I32(1), None),
            (Op::BitAnd, Constant::I32(-1), None),
            (Op::Mul, Constant::I32(0), Some(Constant::I32(0))),
            (Op::BitAnd, Constant::I32(0), Some(Constant::I32(0))),
            (Op::Urem, Constant::I32(1), Some(Constant::I32(0))),
            (Op::BitOr, Constant::I32(-1), Some(Constant::I32(-1))),
        ];

        for (op, c, expected) in cases {
            let (mut routine, block, x, w) =
                harness(|x| Instruction::binop(Type::I32, op, x, c.clone()), Type::I32);
            assert!(ins_combine(&mut routine, block)? > 0, "{op}");
            let expected = expected.map_or(Operand::from(x), Operand::from);
            assert_eq!(written(&routine, w), expected, "{op}");
            routine.validate()?;
        }
        Ok(())
    }

    #[test]
    fn test_self_rules() -> Result<()> {
        let (mut routine, block, _, w) = harness(|x| Instruction::binop(Type::I32, Op::BitXor, x, x), Type::I32);
        ins_combine(&mut routine, block)?;
        assert_eq!(written(&routine, w), Operand::from(Constant::I32(0)));
        assert_eq!(routine[block].len(), 1);

        let (mut routine, block, x, w) = harness(|x| Instruction::binop(Type::I32, Op::BitOr, x, x), Type::I32);
        ins_combine(&mut routine, block)?;
        assert_eq!(written(&routine, w), Operand::from(x));

        let (mut routine, block, _, w) = harness(|x| Instruction::cmp(Type::I32, Op::Uge, x, x), Type::I1);
        ins_combine(&mut routine, block)?;
        assert_eq!(written(&routine, w), Operand::from(Constant::I1(true)));
        routine.validate()
    }

    #[test]
    fn test_sub_becomes_add() -> Result<()> {
        let (mut routine, block, _, w) =
            harness(|x| Instruction::binop(Type::I32, Op::Sub, x, Constant::I32(5)), Type::I32);

        assert_eq!(ins_combine(&mut routine, block)?, 1);
        let sum = written(&routine, w).as_insn().unwrap();
        assert_eq!(routine[sum].op(), Some(Op::Add));
        assert_eq!(routine[sum].const_operand(2), Some(&Constant::I32(-5)));
        routine.validate()
    }

    #[test]
    fn test_constant_chains_merge() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let x = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        let a = routine.push_back(block, Instruction::binop(Type::I32, Op::Add, x, Constant::I32(3)))?;
        let b = routine.push_back(block, Instruction::binop(Type::I32, Op::Add, Constant::I32(4), a))?;
        routine.push_back(block, Instruction::write_reg(r(1), b, Type::I32))?;

        // Swap, then merge; the inner add dies.
        assert!(ins_combine(&mut routine, block)? > 0);
        while ins_combine(&mut routine, block)? > 0 {}
        assert_eq!(routine[b].operand(1), Some(&Operand::from(x)));
        assert_eq!(routine[b].const_operand(2), Some(&Constant::I32(7)));
        assert!(routine.get_insn(a).is_none());
        routine.validate()
    }

    #[test]
    fn test_double_negation() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let x = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        let a = routine.push_back(block, Instruction::unop(Type::I32, Op::BitNot, x))?;
        let b = routine.push_back(block, Instruction::unop(Type::I32, Op::BitNot, a))?;
        let w = routine.push_back(block, Instruction::write_reg(r(1), b, Type::I32))?;

        ins_combine(&mut routine, block)?;
        assert_eq!(written(&routine, w), Operand::from(x));
        assert_eq!(routine[block].len(), 2);
        routine.validate()
    }

    #[test]
    fn test_cast_rules() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let x = routine.push_back(block, Instruction::read_reg(Type::I16, r(0)))?;

        // i16 -> i32 -> i16 collapses to the source
        let wide = routine.push_back(block, Instruction::cast_sx(Type::I16, Type::I32, x))?;
        let back = routine.push_back(block, Instruction::cast(Type::I32, Type::I16, wide))?;
        let w1 = routine.push_back(block, Instruction::write_reg(r(1), back, Type::I16))?;

        // i16 -sx-> i32 -sx-> i64 becomes i16 -sx-> i64
        let wider = routine.push_back(block, Instruction::cast_sx(Type::I32, Type::I64, wide))?;
        routine.push_back(block, Instruction::write_reg(r(2), wider, Type::I64))?;

        // same-type casts vanish
        let same = routine.push_back(block, Instruction::bitcast(Type::I16, Type::I16, x))?;
        let w3 = routine.push_back(block, Instruction::write_reg(r(3), same, Type::I16))?;

        ins_combine(&mut routine, block)?;
        assert_eq!(written(&routine, w1), Operand::from(x));
        assert_eq!(written(&routine, w3), Operand::from(x));
        assert_eq!(routine[wider].templates(), [Type::I16, Type::I64]);
        assert_eq!(routine[wider].operand(0), Some(&Operand::from(x)));
        assert!(routine.get_insn(wide).is_none());
        routine.validate()
    }

    #[test]
    fn test_mixed_extension_is_kept() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let x = routine.push_back(block, Instruction::read_reg(Type::I16, r(0)))?;
        let wide = routine.push_back(block, Instruction::cast_sx(Type::I16, Type::I32, x))?;
        let wider = routine.push_back(block, Instruction::cast(Type::I32, Type::I64, wide))?;
        routine.push_back(block, Instruction::write_reg(r(2), wider, Type::I64))?;

        assert_eq!(ins_combine(&mut routine, block)?, 0);
        Ok(())
    }

    #[test]
    fn test_bitcast_chain() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let x = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        let f = routine.push_back(block, Instruction::bitcast(Type::I32, Type::F32, x))?;
        let back = routine.push_back(block, Instruction::bitcast(Type::F32, Type::I32, f))?;
        let w = routine.push_back(block, Instruction::write_reg(r(1), back, Type::I32))?;

        while ins_combine(&mut routine, block)? > 0 {}
        assert_eq!(written(&routine, w), Operand::from(x));
        assert_eq!(routine[block].len(), 2);
        routine.validate()
    }

    #[test]
    fn test_select_identical_arms() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let c = routine.push_back(block, Instruction::read_reg(Type::I1, r(0)))?;
        let x = routine.push_back(block, Instruction::read_reg(Type::I32, r(1)))?;
        let sel = routine.push_back(block, Instruction::select(Type::I32, c, x, x))?;
        let w = routine.push_back(block, Instruction::write_reg(r(2), sel, Type::I32))?;

        assert!(ins_combine(&mut routine, block)? > 0);
        assert_eq!(written(&routine, w), Operand::from(x));
        assert!(routine.get_insn(c).is_none());
        assert_eq!(ins_combine(&mut routine, block)?, 0);
        routine.validate()
    }
}
