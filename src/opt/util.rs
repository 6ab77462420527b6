//! Helpers shared by the local passes.

use crate::{
    ir::{BlockId, Operand, Routine, ValueId},
    Result,
};

/// Checks two operands for structural equality.
///
/// Constants, registers and memory references compare by value. Values are identical if they
/// are the same value, or if both are pure side-effect free instructions with the same opcode,
/// template types and pairwise identical operands.
#[must_use]
pub fn is_identical(routine: &Routine, a: &Operand, b: &Operand) -> bool {
    let mut stack = Vec::new();
    operands_identical(routine, a, b, &mut stack)
}

/// Checks two values for structural equality, see [`is_identical`].
#[must_use]
pub fn is_identical_value(routine: &Routine, a: ValueId, b: ValueId) -> bool {
    let mut stack = Vec::new();
    values_identical(routine, a, b, &mut stack)
}

fn operands_identical(
    routine: &Routine,
    a: &Operand,
    b: &Operand,
    stack: &mut Vec<(ValueId, ValueId)>,
) -> bool {
    match (a, b) {
        (Operand::Value(a), Operand::Value(b)) => values_identical(routine, *a, *b, stack),
        (Operand::Value(_), _) | (_, Operand::Value(_)) => false,
        _ => a == b,
    }
}

fn values_identical(
    routine: &Routine,
    a: ValueId,
    b: ValueId,
    stack: &mut Vec<(ValueId, ValueId)>,
) -> bool {
    if a == b {
        return true;
    }
    if routine.value_type(a) != routine.value_type(b) {
        return false;
    }

    // A pair already under comparison is assumed equal; this cuts cycles through phis.
    if stack.contains(&(a, b)) {
        return true;
    }

    let (ValueId::Insn(ai), ValueId::Insn(bi)) = (a, b) else {
        return false;
    };
    let (Some(ia), Some(ib)) = (routine.get_insn(ai), routine.get_insn(bi)) else {
        return false;
    };

    if ia.opcode() != ib.opcode()
        || ia.templates() != ib.templates()
        || ia.operand_count() != ib.operand_count()
    {
        return false;
    }
    let opcode = ia.opcode();
    if opcode.has_side_effect() || !opcode.is_pure() {
        return false;
    }

    stack.push((a, b));
    let identical = ia
        .operands()
        .zip(ib.operands())
        .all(|(x, y)| operands_identical(routine, x, y, stack));
    stack.pop();
    identical
}

/// Removes unused side-effect free instructions from `block`, walking backwards so chains of
/// dead values disappear in one sweep.
///
/// # Errors
/// Propagates graph integrity errors.
pub fn local_dce(routine: &mut Routine, block: BlockId) -> Result<usize> {
    routine.rerase_if(block, |r, id| {
        let ins = &r[id];
        ins.use_count() == 0 && !ins.opcode().has_side_effect()
    })
}

/// Finishes a pass over `block` that performed `n` mutations.
///
/// When something changed the block is validated (debug builds only) and cleaned with
/// [`local_dce`]; the number of removed instructions is added to the count.
///
/// # Errors
/// Returns the validation failure or a graph integrity error.
pub fn complete(routine: &mut Routine, block: BlockId, n: usize) -> Result<usize> {
    if n == 0 {
        return Ok(0);
    }

    #[cfg(debug_assertions)]
    routine.validate_block(block)?;

    Ok(n + local_dce(routine, block)?)
}
