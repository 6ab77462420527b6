//! Local register move propagation.
//!
//! Tracks, per register, the last instruction in the block that produced its value: either a
//! `write_reg` or the first `read_reg` of a register not written yet. Later reads are forwarded
//! to the produced value, and a write that is overwritten before anything could observe it is
//! removed. Opcodes with unknown register use (calls, returns) forget everything.

use std::collections::HashMap;

use log::trace;

use crate::{
    ir::{BlockId, InsnId, Instruction, Opcode, Operand, Routine},
    opt::util,
    Result,
};

#[derive(Clone, Copy, Debug)]
struct Producer {
    insn: InsnId,
    /// `true` for a `write_reg`, `false` for a `read_reg` remembered for deduplication.
    write: bool,
}

/// Forwards `read` to the value its register holds according to `producer`.
fn forward(routine: &mut Routine, read: InsnId, producer: Producer) -> Result<usize> {
    let (value, ty) = if producer.write {
        let write = &routine[producer.insn];
        match write.operand(1) {
            Some(value) => (value.clone(), write.template(0)),
            None => return Ok(0),
        }
    } else {
        (Operand::from(producer.insn), routine[producer.insn].ty())
    };

    let read_ty = routine[read].ty();
    trace!("reg_move_prop: {} <- {value:?}", routine.display_insn(read));
    if ty == read_ty {
        let n = 1 + routine.replace_all_uses_with(read, value)?;
        routine.set_opcode(read, Opcode::Nop)?;
        Ok(n)
    } else {
        let cast = routine.insert_before(read, Instruction::bitcast(ty, read_ty, value))?;
        Ok(1 + routine.replace_all_uses_with(read, cast)?)
    }
}

/// Propagates register moves within `block`; returns the mutation count.
///
/// # Errors
/// Propagates graph integrity errors.
pub fn reg_move_prop(routine: &mut Routine, block: BlockId) -> Result<usize> {
    let mut n = 0;
    let mut producers: HashMap<u32, Producer> = HashMap::new();
    let mut cursor = routine.cursor(block)?;

    while let Some(id) = cursor.next(routine) {
        let ins = &routine[id];
        match ins.opcode() {
            Opcode::WriteReg => {
                let Some(reg) = ins.operand(0).and_then(Operand::as_reg) else {
                    continue;
                };
                let previous = producers.insert(reg.uid(), Producer { insn: id, write: true });
                if let Some(previous) = previous.filter(|p| p.write) {
                    trace!("reg_move_prop: dead {}", routine.display_insn(previous.insn));
                    routine.erase(previous.insn)?;
                    n += 1;
                }
            }
            Opcode::ReadReg => {
                let Some(reg) = ins.operand(0).and_then(Operand::as_reg) else {
                    continue;
                };
                match producers.get(&reg.uid()).copied() {
                    Some(producer) => n += forward(routine, id, producer)?,
                    None => {
                        producers.insert(reg.uid(), Producer { insn: id, write: false });
                    }
                }
            }
            opcode if opcode.has_unknown_reg_use() => producers.clear(),
            _ => {}
        }
    }
    util::complete(routine, block, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constant, Op, Register, Type};

    fn r(id: u32) -> Register {
        Register::new(id, 1)
    }

    #[test]
    fn test_forward_write_to_read() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        routine.push_back(block, Instruction::write_reg(r(0), Constant::I32(7), Type::I32))?;
        let read = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        let w = routine.push_back(block, Instruction::write_reg(r(1), read, Type::I32))?;

        assert!(reg_move_prop(&mut routine, block)? > 0);
        assert_eq!(routine[w].const_operand(1), Some(&Constant::I32(7)));
        assert!(routine.get_insn(read).is_none());
        assert_eq!(routine[block].len(), 2);
        assert_eq!(reg_move_prop(&mut routine, block)?, 0);
        routine.validate()
    }

    #[test]
    fn test_dedup_reads() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let a = routine.push_back(block, Instruction::read_reg(Type::I64, r(0)))?;
        let b = routine.push_back(block, Instruction::read_reg(Type::I64, r(0)))?;
        let sum = routine.push_back(block, Instruction::binop(Type::I64, Op::Add, a, b))?;
        routine.push_back(block, Instruction::write_reg(r(1), sum, Type::I64))?;

        reg_move_prop(&mut routine, block)?;
        assert_eq!(routine[sum].operand(1), routine[sum].operand(2));
        assert!(routine.get_insn(b).is_none());
        routine.validate()
    }

    #[test]
    fn test_dead_write_elimination() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let first = routine.push_back(block, Instruction::write_reg(r(0), Constant::I32(1), Type::I32))?;
        let second = routine.push_back(block, Instruction::write_reg(r(0), Constant::I32(2), Type::I32))?;

        assert_eq!(reg_move_prop(&mut routine, block)?, 1);
        assert!(routine.get_insn(first).is_none());
        assert!(routine.get_insn(second).is_some());
        routine.validate()
    }

    #[test]
    fn test_type_mismatch_inserts_bitcast() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let value = routine.push_back(block, Instruction::read_reg(Type::F32, r(5)))?;
        routine.push_back(block, Instruction::write_reg(r(0), value, Type::F32))?;
        let read = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        let w = routine.push_back(block, Instruction::write_reg(r(1), read, Type::I32))?;

        reg_move_prop(&mut routine, block)?;
        let cast = routine[w].operand(1).and_then(Operand::as_insn).unwrap();
        assert_eq!(routine[cast].opcode(), Opcode::Bitcast);
        assert_eq!(routine[cast].templates(), [Type::F32, Type::I32]);
        assert_eq!(routine[cast].operand(0), Some(&Operand::from(value)));
        assert!(routine.get_insn(read).is_none());
        routine.validate()
    }

    #[test]
    fn test_narrow_write_wide_read() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        let value = routine.push_back(block, Instruction::read_reg(Type::I32, r(5)))?;
        let write = routine.push_back(block, Instruction::write_reg(r(0), value, Type::I32))?;
        let read = routine.push_back(block, Instruction::read_reg(Type::I64, r(0)))?;
        let w = routine.push_back(block, Instruction::write_reg(r(1), read, Type::I64))?;

        // The cast lands right before the read it replaces
        let producer = Producer { insn: write, write: true };
        assert_eq!(forward(&mut routine, read, producer)?, 2);
        let cast = routine[read].prev().unwrap();
        assert_eq!(routine[cast].opcode(), Opcode::Bitcast);
        assert_eq!(routine[cast].templates(), [Type::I32, Type::I64]);
        assert_eq!(routine[cast].prev(), Some(write));
        assert_eq!(routine[w].operand(1), Some(&Operand::from(cast)));
        routine.validate()?;

        let mut routine = Routine::new();
        let block = routine.add_block();
        let value = routine.push_back(block, Instruction::read_reg(Type::I32, r(5)))?;
        routine.push_back(block, Instruction::write_reg(r(0), value, Type::I32))?;
        let read = routine.push_back(block, Instruction::read_reg(Type::I64, r(0)))?;
        let w = routine.push_back(block, Instruction::write_reg(r(1), read, Type::I64))?;

        reg_move_prop(&mut routine, block)?;
        let casts: Vec<InsnId> = routine
            .iter_insns(block)
            .filter(|&id| routine[id].opcode() == Opcode::Bitcast)
            .collect();
        assert_eq!(casts.len(), 1);
        assert_eq!(routine[w].prev(), Some(casts[0]));
        assert_eq!(routine[w].operand(1), Some(&Operand::from(casts[0])));
        assert_eq!(routine[casts[0]].operand(0), Some(&Operand::from(value)));
        assert!(routine.get_insn(read).is_none());
        routine.validate()
    }

    #[test]
    fn test_unknown_register_use_clears_state() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();
        routine.push_back(block, Instruction::write_reg(r(0), Constant::I32(1), Type::I32))?;
        routine.push_back(block, Instruction::xcall(Constant::Pointer(0x1000)))?;
        let read = routine.push_back(block, Instruction::read_reg(Type::I32, r(0)))?;
        routine.push_back(block, Instruction::write_reg(r(0), read, Type::I32))?;

        assert_eq!(reg_move_prop(&mut routine, block)?, 0);
        assert_eq!(routine[block].len(), 4);
        Ok(())
    }
}
