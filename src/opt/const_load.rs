//! Promotion of loads from read-only image memory to constants.
//!
//! A `load_mem` whose address is known (a pointer or integer literal plus the constant offset,
//! or an absolute memory reference) is resolved against the routine's [`Image`]. If the address
//! falls into a non-writable section, the bytes are read and every consumer of the load gets
//! the literal instead. Ranges touching a symbol the loader may rewrite are left alone.

use log::trace;

use crate::{
    arch::Endianness,
    image::Image,
    ir::{BlockId, Constant, InsnId, Opcode, Operand, Routine, Type},
    opt::util,
    Result,
};

/// The virtual address a load reads from, if it is constant.
fn load_address(routine: &Routine, id: InsnId) -> Option<u64> {
    let ins = &routine[id];
    if ins.opcode() != Opcode::LoadMem {
        return None;
    }

    let offset = ins.const_operand(1).and_then(Constant::as_i64).unwrap_or(0);
    let base = match ins.operand(0)? {
        Operand::Const(c) => c.as_u64()?,
        Operand::Mem(mem) => mem.absolute_address()?,
        _ => return None,
    };
    Some(base.wrapping_add(offset as u64))
}

/// Reads the literal a load of type `ty` would observe at `address`.
fn read_constant(routine: &Routine, image: &Image, ty: Type, address: u64) -> Option<Constant> {
    let rva = address.checked_sub(image.base_address())?;
    let section = image.find_section(rva)?;
    if section.writable {
        return None;
    }
    let data = image.slice(rva);

    let (value, size) = if ty == Type::Pointer {
        let arch = routine.arch()?;
        let width = (arch.pointer_width() / 8) as usize;
        (
            Constant::pointer_from_bytes(data, width, arch.byte_order())?,
            width,
        )
    } else {
        let endian = routine.arch().map_or(Endianness::Little, |a| a.byte_order());
        (Constant::from_bytes(ty, data, endian)?, ty.byte_size())
    };

    if image.is_read_only_ignored(rva, size) {
        trace!("const_load: {address:#x} may be patched by the loader");
        return None;
    }
    Some(value)
}

/// Replaces loads from constant memory in `block`; returns the mutation count.
///
/// Without an image nothing happens; pointer-typed loads additionally need an architecture.
///
/// # Errors
/// Propagates graph integrity errors.
pub fn const_load(routine: &mut Routine, block: BlockId) -> Result<usize> {
    let Some(image) = routine.image().cloned() else {
        return Ok(0);
    };

    let mut n = 0;
    let mut cursor = routine.cursor(block)?;
    while let Some(id) = cursor.next(routine) {
        let Some(address) = load_address(routine, id) else {
            continue;
        };
        let ty = routine[id].ty();
        if let Some(value) = read_constant(routine, &image, ty, address) {
            trace!("const_load: {} -> {value}", routine.display_insn(id));
            n += routine.replace_all_uses_with(id, value)?;
        }
    }
    util::complete(routine, block, n)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        arch::Architecture,
        image::{Section, Symbol},
        ir::{Instruction, Register},
    };

    struct Arch32;

    impl Architecture for Arch32 {
        fn name(&self) -> &str {
            "test32"
        }

        fn pointer_width(&self) -> u32 {
            32
        }

        fn byte_order(&self) -> Endianness {
            Endianness::Little
        }

        fn stack_register(&self) -> Register {
            Register::new(4, 1)
        }
    }

    const BASE: u64 = 0x40_0000;

    fn image() -> Arc<Image> {
        let mut data = vec![0u8; 0x300];
        data[0x100..0x108].copy_from_slice(&[0x78, 0x56, 0x34, 0x12, 0xEF, 0xCD, 0xAB, 0x89]);
        data[0x200..0x204].copy_from_slice(&[1, 2, 3, 4]);
        let mut image = Image::new(BASE, data);
        image.add_section(Section::new(".rdata", 0x100, 0x200));
        image.add_section(Section::new(".data", 0x200, 0x300).writable());
        image.add_symbol(Symbol::new("__imp_patched", 0x104, true));
        Arc::new(image)
    }

    fn load(routine: &mut Routine, ins: Instruction, ty: Type) -> Result<(BlockId, InsnId)> {
        let block = routine.add_block();
        let value = routine.push_back(block, ins)?;
        let write = routine.push_back(block, Instruction::write_reg(Register::new(0, 1), value, ty))?;
        Ok((block, write))
    }

    #[test]
    fn test_load_from_read_only() -> Result<()> {
        let mut routine = Routine::with_image(image(), None);
        let (block, write) = load(
            &mut routine,
            Instruction::load_mem(Type::I32, Constant::Pointer(BASE + 0x100), 0),
            Type::I32,
        )?;

        assert_eq!(const_load(&mut routine, block)?, 2);
        assert_eq!(routine[write].const_operand(1), Some(&Constant::I32(0x1234_5678)));
        assert_eq!(routine[block].len(), 1);
        routine.validate()
    }

    #[test]
    fn test_absolute_reference_with_offset() -> Result<()> {
        let mut routine = Routine::with_image(image(), None);
        let (block, write) = load(
            &mut routine,
            Instruction::load_mem(Type::I16, crate::ir::MemoryRef::absolute(BASE + 0xF0), 0x10),
            Type::I16,
        )?;

        const_load(&mut routine, block)?;
        assert_eq!(routine[write].const_operand(1), Some(&Constant::I16(0x5678)));
        routine.validate()
    }

    #[test]
    fn test_writable_and_unmapped_are_skipped() -> Result<()> {
        let mut routine = Routine::with_image(image(), None);
        let (writable, _) = load(
            &mut routine,
            Instruction::load_abs(Type::I32, BASE + 0x200),
            Type::I32,
        )?;
        let (unmapped, _) = load(
            &mut routine,
            Instruction::load_abs(Type::I32, BASE + 0x10),
            Type::I32,
        )?;
        let (below_base, _) = load(&mut routine, Instruction::load_abs(Type::I32, 0x10), Type::I32)?;

        assert_eq!(const_load(&mut routine, writable)?, 0);
        assert_eq!(const_load(&mut routine, unmapped)?, 0);
        assert_eq!(const_load(&mut routine, below_base)?, 0);
        Ok(())
    }

    #[test]
    fn test_read_only_ignore_excludes_range() -> Result<()> {
        let mut routine = Routine::with_image(image(), None);
        let (block, _) = load(
            &mut routine,
            Instruction::load_abs(Type::I64, BASE + 0x100),
            Type::I64,
        )?;
        assert_eq!(const_load(&mut routine, block)?, 0);

        let (block, _) = load(
            &mut routine,
            Instruction::load_abs(Type::I32, BASE + 0x104),
            Type::I32,
        )?;
        assert_eq!(const_load(&mut routine, block)?, 0);
        Ok(())
    }

    #[test]
    fn test_pointer_needs_architecture() -> Result<()> {
        let mut routine = Routine::with_image(image(), None);
        let (block, _) = load(
            &mut routine,
            Instruction::load_abs(Type::Pointer, BASE + 0x100),
            Type::Pointer,
        )?;
        assert_eq!(const_load(&mut routine, block)?, 0);

        routine.set_arch(Arc::new(Arch32));
        let write = routine[block].last().unwrap();
        assert_eq!(const_load(&mut routine, block)?, 2);
        assert_eq!(routine[write].const_operand(1), Some(&Constant::Pointer(0x1234_5678)));
        routine.validate()
    }

    #[test]
    fn test_without_image() -> Result<()> {
        let mut routine = Routine::new();
        let (block, _) = load(
            &mut routine,
            Instruction::load_abs(Type::I32, BASE + 0x100),
            Type::I32,
        )?;
        assert_eq!(const_load(&mut routine, block)?, 0);
        Ok(())
    }
}
