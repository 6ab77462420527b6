//! Local constant folding.
//!
//! Evaluates instructions whose inputs are all literals and points their consumers at the
//! result:
//!
//! - `binop` / `cmp` / `unop` through the constant algebra of [`Constant`]
//! - `cast` / `cast_sx` with a literal source, converted to the destination template type
//! - `bitcast` with a literal source, reinterpreted bit for bit
//! - `select` with a literal condition, replaced by the chosen arm
//!
//! Anything the algebra reports as not foldable is left alone.

use log::trace;

use crate::{
    ir::{BlockId, Constant, InsnId, Opcode, Operand, Routine},
    opt::util,
    Result,
};

/// Computes the replacement for `id`, if it folds.
fn fold(routine: &Routine, id: InsnId) -> Option<Operand> {
    let ins = &routine[id];
    let folded = match ins.opcode() {
        Opcode::Binop | Opcode::Cmp => {
            let op = ins.op()?;
            let lhs = ins.const_operand(1)?;
            let rhs = ins.const_operand(2)?;
            lhs.apply(op, rhs)?
        }
        Opcode::Unop => {
            let op = ins.op()?;
            ins.const_operand(1)?.apply_unary(op)?
        }
        Opcode::Cast => ins.const_operand(0)?.cast_zx(ins.template(1))?,
        Opcode::CastSx => ins.const_operand(0)?.cast_sx(ins.template(1))?,
        Opcode::Bitcast => ins.const_operand(0)?.bitcast(ins.template(1))?,
        Opcode::Select => {
            let cc = ins.const_operand(0)?.as_bool()?;
            let chosen = ins.operand(if cc { 1 } else { 2 })?;
            if *chosen == Operand::Value(id.into()) {
                return None;
            }
            return Some(chosen.clone());
        }
        _ => return None,
    };

    // Malformed input could disagree with the declared result type.
    (folded.ty() == ins.ty() && !matches!(folded, Constant::Void)).then(|| folded.into())
}

/// Folds every constant-input instruction of `block`; returns the mutation count.
///
/// # Errors
/// Propagates graph integrity errors.
pub fn const_fold(routine: &mut Routine, block: BlockId) -> Result<usize> {
    let mut n = 0;
    let mut cursor = routine.cursor(block)?;

    while let Some(id) = cursor.next(routine) {
        let Some(result) = fold(routine, id) else {
            continue;
        };
        trace!("const_fold: {} -> {result:?}", routine.display_insn(id));
        n += 1 + routine.replace_all_uses_with(id, result)?;
    }
    util::complete(routine, block, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Op, Register, Type};

    fn r(id: u32) -> Register {
        Register::new(id, 1)
    }

    #[test]
    fn test_fold_binop() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let sum = routine.push_back(
            block,
            Instruction::binop(Type::I32, Op::Add, Constant::I32(2), Constant::I32(3)),
        )?;
        let write = routine.push_back(block, Instruction::write_reg(r(0), sum, Type::I32))?;

        assert_eq!(const_fold(&mut routine, block)?, 3);
        assert_eq!(routine[write].const_operand(1), Some(&Constant::I32(5)));
        assert_eq!(routine[block].len(), 1);
        assert_eq!(const_fold(&mut routine, block)?, 0);
        routine.validate()
    }

    #[test]
    fn test_fold_chain() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let a = routine.push_back(
            block,
            Instruction::binop(Type::I64, Op::Mul, Constant::I64(6), Constant::I64(7)),
        )?;
        let b = routine.push_back(block, Instruction::unop(Type::I64, Op::Neg, a))?;
        let c = routine.push_back(block, Instruction::cmp(Type::I64, Op::Lt, b, Constant::I64(0)))?;
        let write = routine.push_back(block, Instruction::write_reg(r(0), c, Type::I1))?;

        const_fold(&mut routine, block)?;
        assert_eq!(routine[write].const_operand(1), Some(&Constant::I1(true)));
        assert_eq!(routine[block].len(), 1);
        routine.validate()
    }

    #[test]
    fn test_fold_casts() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let sx = routine.push_back(block, Instruction::cast_sx(Type::I8, Type::I32, Constant::I8(-1)))?;
        let zx = routine.push_back(block, Instruction::cast(Type::I8, Type::I32, Constant::I8(-1)))?;
        let w1 = routine.push_back(block, Instruction::write_reg(r(0), sx, Type::I32))?;
        let w2 = routine.push_back(block, Instruction::write_reg(r(1), zx, Type::I32))?;

        const_fold(&mut routine, block)?;
        assert_eq!(routine[w1].const_operand(1), Some(&Constant::I32(-1)));
        assert_eq!(routine[w2].const_operand(1), Some(&Constant::I32(0xFF)));
        routine.validate()
    }

    #[test]
    fn test_fold_bitcast() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let bits = routine.push_back(block, Instruction::bitcast(Type::F32, Type::I32, Constant::F32(1.0)))?;
        let w = routine.push_back(block, Instruction::write_reg(r(0), bits, Type::I32))?;

        assert_eq!(const_fold(&mut routine, block)?, 3);
        assert_eq!(routine[w].const_operand(1), Some(&Constant::I32(0x3F80_0000)));
        assert_eq!(routine[block].len(), 1);
        routine.validate()
    }

    #[test]
    fn test_fold_select() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let a = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        let b = routine.push_back(block, Instruction::read_reg(Type::I32, r(1)))?;
        let sel = routine.push_back(block, Instruction::select(Type::I32, Constant::I1(true), a, b))?;
        let write = routine.push_back(block, Instruction::write_reg(r(2), sel, Type::I32))?;

        const_fold(&mut routine, block)?;
        assert_eq!(routine[write].operand(1), Some(&Operand::from(a)));
        assert!(routine.get_insn(b).is_none());
        assert!(routine.get_insn(sel).is_none());
        routine.validate()
    }

    #[test]
    fn test_not_foldable_is_kept() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let div = routine.push_back(
            block,
            Instruction::binop(Type::I32, Op::Div, Constant::I32(1), Constant::I32(0)),
        )?;
        routine.push_back(block, Instruction::write_reg(r(0), div, Type::I32))?;

        assert_eq!(const_fold(&mut routine, block)?, 0);
        assert_eq!(routine[block].len(), 2);
        Ok(())
    }
}
