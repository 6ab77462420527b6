//! Architecture descriptions and the lifting capability.
//!
//! The IR core never decodes machine code itself. An [`Architecture`] describes the properties
//! the optimizer depends on (pointer width, byte order, register names) and a [`Lifter`]
//! translates one machine instruction at a time into IR. [`lift_block`] drives a lifter over a
//! byte range until the block is terminated.
//!
//! Architectures are looked up by name through an explicit [`ArchRegistry`] that the embedding
//! application constructs once and shares.

use std::{fmt, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use log::{debug, warn};

use crate::{
    ir::{BlockId, Instruction, Register, Routine, Type},
    Error, Result,
};

/// Byte order of multi-byte values in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    /// Least significant byte first
    #[default]
    Little,
    /// Most significant byte first
    Big,
}

/// Properties of a machine architecture consumed by the IR and its passes.
pub trait Architecture: Send + Sync {
    /// Unique name, used as the registry key.
    fn name(&self) -> &str;

    /// Width of a pointer in bits.
    fn pointer_width(&self) -> u32;

    /// Byte order of memory accesses.
    fn byte_order(&self) -> Endianness;

    /// The stack pointer register.
    fn stack_register(&self) -> Register;

    /// Human readable name of `reg`, if the architecture knows it.
    fn register_name(&self, reg: Register) -> Option<String> {
        let _ = reg;
        None
    }

    /// Integer type with the width of a pointer.
    fn pointer_type(&self) -> Type {
        match self.pointer_width() {
            32 => Type::I32,
            16 => Type::I16,
            _ => Type::I64,
        }
    }
}

impl fmt::Debug for dyn Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Architecture")
            .field("name", &self.name())
            .field("pointer_width", &self.pointer_width())
            .finish()
    }
}

/// Translates machine code into IR.
pub trait Lifter: Send + Sync {
    /// Appends the IR of the machine instruction at the start of `data` to `block`.
    ///
    /// ## Arguments
    /// * `routine` - The routine owning `block`
    /// * `block` - The block to append to
    /// * `data` - Machine code starting at `ip`
    /// * `ip` - Address of the instruction
    ///
    /// # Errors
    /// Returns [`Error::Lift`] if the instruction can not be decoded or translated.
    fn lift(&self, routine: &mut Routine, block: BlockId, data: &[u8], ip: u64) -> Result<usize>;
}

/// Lifts machine instructions from `data` into `block` until the block is terminated or the
/// data runs out, and returns the number of bytes consumed.
///
/// A lifter failure ends the block with a `trap` describing the failure instead of failing the
/// whole routine. The block's address range is updated as instructions are consumed.
///
/// # Errors
/// Propagates graph errors raised while appending to the block.
pub fn lift_block(
    lifter: &dyn Lifter,
    routine: &mut Routine,
    block: BlockId,
    data: &[u8],
    ip: u64,
) -> Result<usize> {
    let mut offset = 0;
    routine.set_block_range(block, ip, Some(ip))?;

    while offset < data.len() {
        let va = ip + offset as u64;
        let length = match lifter.lift(routine, block, &data[offset..], va) {
            Ok(0) => Err(Error::Lift(format!("no progress at {va:#x}"))),
            other => other,
        };

        let length = match length {
            Ok(length) => length,
            Err(error) => {
                warn!("lifting stopped at {va:#x}: {error}");
                routine.push_back(
                    block,
                    Instruction::trap(&format!("lifter error: {error}")).with_ip(va),
                )?;
                break;
            }
        };

        offset += length;
        routine.set_block_range(block, ip, Some(ip + offset as u64))?;

        let terminated = routine[block]
            .last()
            .is_some_and(|last| routine[last].opcode().is_terminator());
        if terminated {
            break;
        }
    }

    debug!("lifted {offset} byte(s) at {ip:#x} into {block}");
    Ok(offset)
}

/// Registry of known architectures, keyed by [`Architecture::name`].
///
/// Safe to share between threads; registration and lookup never block each other for long.
#[derive(Default)]
pub struct ArchRegistry {
    entries: DashMap<String, Arc<dyn Architecture>>,
}

impl ArchRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        ArchRegistry::default()
    }

    /// Registers `arch`. Returns `false` if the name is empty or already taken.
    pub fn register(&self, arch: Arc<dyn Architecture>) -> bool {
        let name = arch.name().to_string();
        if name.is_empty() {
            return false;
        }
        match self.entries.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(arch);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Looks up an architecture by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<Arc<dyn Architecture>> {
        self.entries.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Names of every registered architecture, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered architectures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Constant, Opcode};

    struct Toy {
        name: &'static str,
        width: u32,
    }

    impl Architecture for Toy {
        fn name(&self) -> &str {
            self.name
        }

        fn pointer_width(&self) -> u32 {
            self.width
        }

        fn byte_order(&self) -> Endianness {
            Endianness::Little
        }

        fn stack_register(&self) -> Register {
            Register::new(4, 1)
        }
    }

    // 0x90: nop, 0xC3: ret, anything else fails
    struct ToyLifter;

    impl Lifter for ToyLifter {
        fn lift(&self, routine: &mut Routine, block: BlockId, data: &[u8], ip: u64) -> Result<usize> {
            match data.first() {
                Some(0x90) => {
                    routine.push_back(block, Instruction::nop().with_ip(ip))?;
                    Ok(1)
                }
                Some(0xC3) => {
                    routine.push_back(block, Instruction::xret(Constant::Pointer(0)).with_ip(ip))?;
                    Ok(1)
                }
                _ => Err(Error::Lift(format!("undefined opcode at {ip:#x}"))),
            }
        }
    }

    #[test]
    fn test_registry() {
        let registry = ArchRegistry::new();
        assert!(registry.register(Arc::new(Toy { name: "toy64", width: 64 })));
        assert!(registry.register(Arc::new(Toy { name: "toy32", width: 32 })));
        assert!(!registry.register(Arc::new(Toy { name: "toy64", width: 16 })));
        assert!(!registry.register(Arc::new(Toy { name: "", width: 64 })));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["toy32".to_string(), "toy64".to_string()]);
        let arch = registry.find("toy32").unwrap();
        assert_eq!(arch.pointer_type(), Type::I32);
        assert!(registry.find("arm").is_none());
    }

    #[test]
    fn test_registry_concurrent_duplicates() {
        use rayon::prelude::*;

        let registry = ArchRegistry::new();
        let winners: Vec<u32> = (1..=64u32)
            .into_par_iter()
            .filter(|&width| registry.register(Arc::new(Toy { name: "toy", width })))
            .collect();

        assert_eq!(winners.len(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("toy").unwrap().pointer_width(), winners[0]);
    }

    #[test]
    fn test_lift_until_terminator() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();

        let consumed = lift_block(&ToyLifter, &mut routine, block, &[0x90, 0x90, 0xC3, 0x90], 0x1000)?;
        assert_eq!(consumed, 3);
        assert_eq!(routine[block].len(), 3);
        assert_eq!(routine[block].ip(), Some(0x1000));
        assert_eq!(routine[block].end_ip(), Some(0x1003));
        routine.validate()
    }

    #[test]
    fn test_lift_failure_traps() -> Result<()> {
        let mut routine = Routine::new();
        let block = routine.add_block();

        let consumed = lift_block(&ToyLifter, &mut routine, block, &[0x90, 0xFF], 0x2000)?;
        assert_eq!(consumed, 1);

        let last = routine[block].last().unwrap();
        assert_eq!(routine[last].opcode(), Opcode::Trap);
        assert_eq!(routine[last].ip(), Some(0x2001));
        routine.validate()
    }
}
