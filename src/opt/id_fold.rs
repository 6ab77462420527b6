//! Local identical value folding.
//!
//! Walking the block backwards, each instruction is compared with the instructions before it.
//! The first structurally identical one (see [`util::is_identical_value`]) takes over all of
//! its consumers. The backward search gives up at a side-effecting instruction unless the
//! instruction being folded is a constant expression, whose value can not be changed by
//! anything in between.

use log::trace;

use crate::{
    ir::{BlockId, InsnId, Routine},
    opt::util,
    Result,
};

fn find_identical(routine: &Routine, id: InsnId) -> Result<Option<InsnId>> {
    let is_const = routine[id].opcode().is_const();
    let mut earlier = routine.rcursor_before(id)?;

    while let Some(candidate) = earlier.next(routine) {
        if util::is_identical_value(routine, id.into(), candidate.into()) {
            return Ok(Some(candidate));
        }
        if routine[candidate].opcode().has_side_effect() && !is_const {
            break;
        }
    }
    Ok(None)
}

/// Folds duplicated values of `block`; returns the mutation count.
///
/// # Errors
/// Propagates graph integrity errors.
pub fn id_fold(routine: &mut Routine, block: BlockId) -> Result<usize> {
    let mut n = 0;
    let mut cursor = routine.rcursor(block)?;

    while let Some(id) = cursor.next(routine) {
        if routine[id].use_count() == 0 {
            continue;
        }
        if let Some(with) = find_identical(routine, id)? {
            trace!(
                "id_fold: {} -> {}",
                routine.display_insn(id),
                routine.display_insn(with)
            );
            n += 1 + routine.replace_all_uses_with(id, with)?;
        }
    }
    util::complete(routine, block, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constant, Instruction, Op, Operand, Register, Type};

    fn r(id: u32) -> Register {
        Register::new(id, 1)
    }

    #[test]
    fn test_fold_duplicate_reads() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let a = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        let b = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        let sum = routine.push_back(block, Instruction::binop(Type::I32, Op::Add, a, b))?;
        routine.push_back(block, Instruction::write_reg(r(1), sum, Type::I32))?;

        assert_eq!(id_fold(&mut routine, block)?, 3);
        assert_eq!(routine[sum].operand(2), Some(&Operand::from(a)));
        assert!(routine.get_insn(b).is_none());
        assert_eq!(id_fold(&mut routine, block)?, 0);
        routine.validate()
    }

    #[test]
    fn test_side_effect_blocks_search() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let a = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        routine.push_back(block, Instruction::write_reg(r(0), Constant::I32(1), Type::I32))?;
        let b = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        routine.push_back(block, Instruction::write_reg(r(1), a, Type::I32))?;
        routine.push_back(block, Instruction::write_reg(r(2), b, Type::I32))?;

        assert_eq!(id_fold(&mut routine, block)?, 0);
        assert_eq!(routine.use_count(b), 1);
        Ok(())
    }

    #[test]
    fn test_constant_expressions_cross_side_effects() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let x = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        let a = routine.push_back(block, Instruction::unop(Type::I32, Op::BitNot, x))?;
        routine.push_back(block, Instruction::write_reg(r(3), Constant::I32(1), Type::I32))?;
        let b = routine.push_back(block, Instruction::unop(Type::I32, Op::BitNot, x))?;
        routine.push_back(block, Instruction::write_reg(r(1), a, Type::I32))?;
        let w = routine.push_back(block, Instruction::write_reg(r(2), b, Type::I32))?;

        assert_eq!(id_fold(&mut routine, block)?, 3);
        assert_eq!(routine[w].operand(1), Some(&Operand::from(a)));
        routine.validate()
    }
}
