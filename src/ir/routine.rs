//! The routine: arena owner of blocks, instructions and use records.
//!
//! All graph mutation is expressed as methods on [`Routine`] so that operand slots, use lists
//! and the intrusive instruction lists can never drift apart. Handles ([`InsnId`],
//! [`BlockId`]) stay valid until the element is erased; using a stale handle yields
//! [`crate::Error::InvalidHandle`] from the fallible accessors and a panic from indexing.
//!
//! # Examples
//!
//! ```rust
//! use ironlift::prelude::*;
//!
//! let mut routine = Routine::new();
//! let block = routine.add_block();
//!
//! let sum = routine.push_back(
//!     block,
//!     Instruction::binop(Type::I32, Op::Add, Constant::I32(2), Constant::I32(3)),
//! )?;
//! routine.push_back(block, Instruction::write_reg(Register::new(0, 1), sum, Type::I32))?;
//!
//! assert_eq!(routine.use_count(sum), 1);
//! routine.validate()?;
//! # Ok::<(), ironlift::Error>(())
//! ```

use std::{fmt, ops::Index, sync::Arc};

use log::trace;

use crate::{
    arch::Architecture,
    image::Image,
    ir::{
        BasicBlock, BlockId, Constant, InsnCursor, InsnId, Instruction, Opcode, Operand,
        OperandSlot, Type, TypeSlot, UseArena, UseId, UseList, ValueId,
    },
    utils::graph::{
        algorithms::reverse_postorder, GraphBase, NodeId, Predecessors, RootedGraph, Successors,
    },
    Error, Result,
};

/// A lifted routine.
///
/// The entry block is the first block in layout order. The routine optionally references the
/// [`Image`] it was lifted from and the [`Architecture`] of its code, both shared read-only.
///
/// Instruction and block handles are never reused: erasing leaves an empty arena slot, so a
/// stale handle keeps resolving to nothing instead of to a newer value. The arenas therefore
/// grow with every instruction ever created, including those a pass inserts and later
/// removes; drop the routine (or rebuild it) to reclaim the slots.
#[derive(Clone, Default)]
pub struct Routine {
    insns: Vec<Option<Instruction>>,
    blocks: Vec<Option<BasicBlock>>,
    uses: UseArena,
    order: Vec<BlockId>,
    image: Option<Arc<Image>>,
    arch: Option<Arc<dyn Architecture>>,
    ip: Option<u64>,
    next_insn_name: u32,
    next_block_name: u32,
}

impl Routine {
    /// Creates an empty routine.
    #[must_use]
    pub fn new() -> Self {
        Routine::default()
    }

    /// Creates an empty routine lifted from `image`.
    #[must_use]
    pub fn with_image(image: Arc<Image>, arch: Option<Arc<dyn Architecture>>) -> Self {
        Routine {
            image: Some(image),
            arch,
            ..Routine::default()
        }
    }

    /// The image the routine was lifted from.
    #[must_use]
    pub fn image(&self) -> Option<&Arc<Image>> {
        self.image.as_ref()
    }

    /// Sets the image the routine was lifted from.
    pub fn set_image(&mut self, image: Arc<Image>) {
        self.image = Some(image);
    }

    /// The architecture of the routine's code.
    #[must_use]
    pub fn arch(&self) -> Option<&Arc<dyn Architecture>> {
        self.arch.as_ref()
    }

    /// Sets the architecture of the routine's code.
    pub fn set_arch(&mut self, arch: Arc<dyn Architecture>) {
        self.arch = Some(arch);
    }

    /// Entry address.
    #[must_use]
    pub fn ip(&self) -> Option<u64> {
        self.ip
    }

    /// Sets the entry address.
    pub fn set_ip(&mut self, ip: u64) {
        self.ip = Some(ip);
    }

    // Lookup

    /// Looks up a live instruction.
    #[must_use]
    pub fn get_insn(&self, id: InsnId) -> Option<&Instruction> {
        self.insns.get(id.index()).and_then(Option::as_ref)
    }

    /// Looks up a live instruction, failing on stale handles.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] if `id` does not refer to a live instruction.
    pub fn insn(&self, id: InsnId) -> Result<&Instruction> {
        self.get_insn(id)
            .ok_or_else(|| Error::InvalidHandle(id.to_string()))
    }

    fn insn_mut(&mut self, id: InsnId) -> Result<&mut Instruction> {
        self.insns
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::InvalidHandle(id.to_string()))
    }

    /// Looks up a live block.
    #[must_use]
    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index()).and_then(Option::as_ref)
    }

    /// Looks up a live block, failing on stale handles.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] if `id` does not refer to a live block.
    pub fn block(&self, id: BlockId) -> Result<&BasicBlock> {
        self.get_block(id)
            .ok_or_else(|| Error::InvalidHandle(id.to_string()))
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut BasicBlock> {
        self.blocks
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::InvalidHandle(id.to_string()))
    }

    /// The entry block.
    #[must_use]
    pub fn entry_block(&self) -> Option<BlockId> {
        self.order.first().copied()
    }

    /// All blocks in layout order.
    #[must_use]
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.order.clone()
    }

    /// Number of live blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.order.len()
    }

    /// Number of live instructions.
    #[must_use]
    pub fn insn_count(&self) -> usize {
        self.insns.iter().filter(|i| i.is_some()).count()
    }

    /// `true` if `value` refers to a live instruction or block.
    #[must_use]
    pub fn contains_value(&self, value: ValueId) -> bool {
        match value {
            ValueId::Insn(id) => self.get_insn(id).is_some(),
            ValueId::Block(id) => self.get_block(id).is_some(),
        }
    }

    /// Result type of a value; blocks are labels.
    #[must_use]
    pub fn value_type(&self, value: ValueId) -> Type {
        match value {
            ValueId::Insn(id) => self.get_insn(id).map(Instruction::ty).unwrap_or_default(),
            ValueId::Block(_) => Type::Label,
        }
    }

    /// Type of an operand in the context of this routine.
    #[must_use]
    pub fn operand_type(&self, operand: &Operand) -> Type {
        match operand {
            Operand::Const(c) => c.ty(),
            Operand::Reg(_) => Type::Reg,
            Operand::Mem(_) => Type::Pointer,
            Operand::Value(v) => self.value_type(*v),
        }
    }

    fn use_list(&self, value: ValueId) -> Option<&UseList> {
        match value {
            ValueId::Insn(id) => self.get_insn(id).map(|i| &i.uses),
            ValueId::Block(id) => self.get_block(id).map(|b| &b.uses),
        }
    }

    /// Number of consumers of `value`.
    #[must_use]
    pub fn use_count(&self, value: impl Into<ValueId>) -> usize {
        self.use_list(value.into()).map_or(0, UseList::len)
    }

    /// The `(user, slot)` pairs consuming `value`, in insertion order.
    pub fn uses(&self, value: impl Into<ValueId>) -> impl Iterator<Item = (InsnId, usize)> + '_ {
        self.use_list(value.into())
            .into_iter()
            .flat_map(move |list| self.uses.iter(list))
            .map(|(_, u)| (u.user, u.slot))
    }

    /// Read-only walk over the instructions of `block`.
    pub fn iter_insns(&self, block: BlockId) -> impl Iterator<Item = InsnId> + '_ {
        std::iter::successors(self.get_block(block).and_then(|b| b.first), move |id| {
            self.get_insn(*id).and_then(|i| i.next)
        })
    }

    /// Forward cursor over `block` that tolerates erasing the current instruction.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] for a stale block.
    pub fn cursor(&self, block: BlockId) -> Result<InsnCursor> {
        self.block(block)?;
        Ok(InsnCursor::new(block, false))
    }

    /// Reverse cursor over `block` that tolerates erasing the current instruction.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] for a stale block.
    pub fn rcursor(&self, block: BlockId) -> Result<InsnCursor> {
        self.block(block)?;
        Ok(InsnCursor::new(block, true))
    }

    /// Reverse cursor over the instructions preceding `at` in its block.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] for a stale instruction, [`Error::Integrity`] for a
    /// detached one.
    pub fn rcursor_before(&self, at: InsnId) -> Result<InsnCursor> {
        let block = self
            .insn(at)?
            .block
            .ok_or_else(|| integrity_error!("{at} is not part of a block"))?;
        Ok(InsnCursor::positioned(self, block, at, true))
    }

    // Use tracking

    fn link_use(&mut self, value: ValueId, user: InsnId, slot: usize) -> Result<UseId> {
        let list = match value {
            ValueId::Insn(id) => self
                .insns
                .get_mut(id.index())
                .and_then(Option::as_mut)
                .map(|i| &mut i.uses),
            ValueId::Block(id) => self
                .blocks
                .get_mut(id.index())
                .and_then(Option::as_mut)
                .map(|b| &mut b.uses),
        };
        let list = list.ok_or_else(|| Error::InvalidHandle(value.to_string()))?;
        Ok(self.uses.link(list, value, user, slot))
    }

    fn unlink_use(&mut self, value: ValueId, use_id: UseId) -> Result<()> {
        let list = match value {
            ValueId::Insn(id) => self
                .insns
                .get_mut(id.index())
                .and_then(Option::as_mut)
                .map(|i| &mut i.uses),
            ValueId::Block(id) => self
                .blocks
                .get_mut(id.index())
                .and_then(Option::as_mut)
                .map(|b| &mut b.uses),
        };
        let list = list.ok_or_else(|| integrity_error!("use of destroyed value {value}"))?;
        self.uses
            .unlink(list, use_id)
            .map(|_| ())
            .ok_or_else(|| integrity_error!("{use_id:?} is not linked to {value}"))
    }

    fn release_operand(&mut self, insn: InsnId, index: usize) -> Result<()> {
        let slot = self
            .insn(insn)?
            .slots
            .get(index)
            .ok_or_else(|| integrity_error!("{insn} has no operand #{index}"))?;

        if let (Operand::Value(value), Some(use_id)) = (&slot.operand, slot.use_id) {
            let value = *value;
            self.unlink_use(value, use_id)?;
            self.insn_mut(insn)?.slots[index].use_id = None;
        }
        Ok(())
    }

    /// Rewrites operand `index` of `insn`, moving its use from the old value to the new one.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] if `insn` or a referenced value is stale and
    /// [`Error::Integrity`] if the slot does not exist.
    pub fn set_operand(
        &mut self,
        insn: InsnId,
        index: usize,
        operand: impl Into<Operand>,
    ) -> Result<()> {
        let operand = operand.into();
        if let Operand::Value(value) = operand {
            if !self.contains_value(value) {
                return Err(Error::InvalidHandle(value.to_string()));
            }
        }

        self.release_operand(insn, index)?;
        let use_id = match operand {
            Operand::Value(value) => Some(self.link_use(value, insn, index)?),
            _ => None,
        };

        let slot = &mut self.insn_mut(insn)?.slots[index];
        slot.operand = operand;
        slot.use_id = use_id;
        Ok(())
    }

    /// Appends an operand to `insn` and returns its index.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] for stale handles.
    pub fn push_operand(&mut self, insn: InsnId, operand: impl Into<Operand>) -> Result<usize> {
        let operand = operand.into();
        if let Operand::Value(value) = operand {
            if !self.contains_value(value) {
                return Err(Error::InvalidHandle(value.to_string()));
            }
        }

        let ins = self.insn_mut(insn)?;
        ins.slots.push(OperandSlot {
            operand: Operand::Const(Constant::Void),
            use_id: None,
        });
        let index = ins.slots.len() - 1;
        self.set_operand(insn, index, operand)?;
        Ok(index)
    }

    /// Removes operand `index` from `insn`, shifting the following operands down.
    ///
    /// # Errors
    /// Returns [`Error::Integrity`] if the slot does not exist.
    pub fn remove_operand(&mut self, insn: InsnId, index: usize) -> Result<Operand> {
        self.release_operand(insn, index)?;
        let ins = self.insn_mut(insn)?;
        let removed = ins.slots.remove(index);
        let moved: Vec<(usize, UseId)> = ins
            .slots
            .iter()
            .enumerate()
            .skip(index)
            .filter_map(|(i, s)| s.use_id.map(|u| (i, u)))
            .collect();
        for (slot, use_id) in moved {
            self.uses.set_slot(use_id, slot);
        }
        Ok(removed.operand)
    }

    /// Changes the opcode of `insn` in place, keeping its operands.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] for a stale instruction.
    pub fn set_opcode(&mut self, insn: InsnId, opcode: Opcode) -> Result<()> {
        self.insn_mut(insn)?.opcode = opcode;
        Ok(())
    }

    /// Changes template type `index` (0 or 1) of `insn`.
    ///
    /// # Errors
    /// Returns [`Error::Integrity`] for an index past the second template.
    pub fn set_template(&mut self, insn: InsnId, index: usize, ty: Type) -> Result<()> {
        let ins = self.insn_mut(insn)?;
        let slot = ins
            .templates
            .get_mut(index)
            .ok_or_else(|| integrity_error!("template index {index} out of range"))?;
        *slot = ty;
        Ok(())
    }

    /// Points every consumer of `value` at `with` instead and returns how many were rewritten.
    ///
    /// Replacing a value with itself is a no-op.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] if either side is stale.
    pub fn replace_all_uses_with(
        &mut self,
        value: impl Into<ValueId>,
        with: impl Into<Operand>,
    ) -> Result<usize> {
        let value = value.into();
        let with = with.into();
        if with == Operand::Value(value) {
            return Ok(0);
        }
        if let Operand::Value(target) = with {
            if !self.contains_value(target) {
                return Err(Error::InvalidHandle(target.to_string()));
            }
        }

        let mut cursor = self
            .use_list(value)
            .ok_or_else(|| Error::InvalidHandle(value.to_string()))?
            .head();

        let mut count = 0;
        while let Some(use_id) = cursor {
            let record = *self
                .uses
                .get(use_id)
                .ok_or_else(|| integrity_error!("broken use list of {value}"))?;
            cursor = self.uses.next(use_id);
            self.set_operand(record.user, record.slot, with.clone())?;
            count += 1;
        }
        Ok(count)
    }

    // Instruction placement

    fn link_insn(
        &mut self,
        block: BlockId,
        prev: Option<InsnId>,
        next: Option<InsnId>,
        mut ins: Instruction,
    ) -> Result<InsnId> {
        for slot in &ins.slots {
            if let Operand::Value(value) = slot.operand {
                if !self.contains_value(value) {
                    return Err(Error::InvalidHandle(value.to_string()));
                }
            }
        }

        let id = InsnId::new(self.insns.len());
        let values: Vec<(usize, ValueId)> = ins
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.operand.as_value().map(|v| (i, v)))
            .collect();

        if ins.ip.is_none() {
            ins.ip = prev.and_then(|p| self.get_insn(p)).and_then(|p| p.ip);
        }
        ins.block = Some(block);
        ins.prev = prev;
        ins.next = next;
        ins.uses = UseList::default();
        ins.name = self.next_insn_name;
        for slot in &mut ins.slots {
            slot.use_id = None;
        }
        self.next_insn_name += 1;
        self.insns.push(Some(ins));

        for (slot, value) in values {
            let use_id = self.link_use(value, id, slot)?;
            self.insn_mut(id)?.slots[slot].use_id = Some(use_id);
        }

        match prev {
            Some(p) => self.insn_mut(p)?.next = Some(id),
            None => self.block_mut(block)?.first = Some(id),
        }
        match next {
            Some(n) => self.insn_mut(n)?.prev = Some(id),
            None => self.block_mut(block)?.last = Some(id),
        }
        self.block_mut(block)?.len += 1;
        Ok(id)
    }

    fn placement(&self, at: InsnId) -> Result<(BlockId, &Instruction)> {
        let ins = self.insn(at)?;
        let block = ins
            .block
            .ok_or_else(|| integrity_error!("{at} is not part of a block"))?;
        Ok((block, ins))
    }

    /// Appends `ins` to `block`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] if the block or a referenced value is stale.
    pub fn push_back(&mut self, block: BlockId, ins: Instruction) -> Result<InsnId> {
        let last = self.block(block)?.last;
        self.link_insn(block, last, None, ins)
    }

    /// Prepends `ins` to `block`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] if the block or a referenced value is stale.
    pub fn push_front(&mut self, block: BlockId, ins: Instruction) -> Result<InsnId> {
        let first = self.block(block)?.first;
        self.link_insn(block, None, first, ins)
    }

    /// Inserts `ins` immediately before `at`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] if `at` or a referenced value is stale.
    pub fn insert_before(&mut self, at: InsnId, ins: Instruction) -> Result<InsnId> {
        let (block, at_ins) = self.placement(at)?;
        let prev = at_ins.prev;
        self.link_insn(block, prev, Some(at), ins)
    }

    /// Inserts `ins` immediately after `at`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] if `at` or a referenced value is stale.
    pub fn insert_after(&mut self, at: InsnId, ins: Instruction) -> Result<InsnId> {
        let (block, at_ins) = self.placement(at)?;
        let next = at_ins.next;
        self.link_insn(block, Some(at), next, ins)
    }

    fn unlink_insn(&mut self, id: InsnId) -> Result<()> {
        let ins = self.insn(id)?;
        let (block, prev, next) = (ins.block, ins.prev, ins.next);
        let Some(block) = block else {
            return Ok(());
        };

        match prev {
            Some(p) => self.insn_mut(p)?.next = next,
            None => self.block_mut(block)?.first = next,
        }
        match next {
            Some(n) => self.insn_mut(n)?.prev = prev,
            None => self.block_mut(block)?.last = prev,
        }
        self.block_mut(block)?.len -= 1;

        let ins = self.insn_mut(id)?;
        ins.block = None;
        ins.prev = None;
        ins.next = None;
        Ok(())
    }

    /// Unlinks `id` from its block, releases its operands and destroys it.
    ///
    /// Uses of the instruction by itself do not count as consumers.
    ///
    /// # Errors
    /// Returns [`Error::LingeringUses`] without modifying anything if another instruction still
    /// consumes the result.
    pub fn erase(&mut self, id: InsnId) -> Result<()> {
        let ins = self.insn(id)?;
        let lingering = self
            .uses
            .iter(&ins.uses)
            .filter(|(_, u)| u.user != id)
            .count();
        if lingering > 0 {
            return Err(Error::LingeringUses {
                value: id.into(),
                count: lingering,
            });
        }

        for index in 0..ins.operand_count() {
            self.release_operand(id, index)?;
        }
        self.unlink_insn(id)?;
        self.insns[id.index()] = None;
        Ok(())
    }

    /// Erases every instruction of `block` matching `pred`, walking forward.
    ///
    /// # Errors
    /// Propagates the first failing [`Routine::erase`].
    pub fn erase_if<F>(&mut self, block: BlockId, mut pred: F) -> Result<usize>
    where
        F: FnMut(&Routine, InsnId) -> bool,
    {
        let mut cursor = self.cursor(block)?;
        let mut erased = 0;
        while let Some(id) = cursor.next(self) {
            if pred(self, id) {
                self.erase(id)?;
                erased += 1;
            }
        }
        Ok(erased)
    }

    /// Erases every instruction of `block` matching `pred`, walking backward.
    ///
    /// # Errors
    /// Propagates the first failing [`Routine::erase`].
    pub fn rerase_if<F>(&mut self, block: BlockId, mut pred: F) -> Result<usize>
    where
        F: FnMut(&Routine, InsnId) -> bool,
    {
        let mut cursor = self.rcursor(block)?;
        let mut erased = 0;
        while let Some(id) = cursor.next(self) {
            if pred(self, id) {
                self.erase(id)?;
                erased += 1;
            }
        }
        Ok(erased)
    }

    // Blocks and edges

    /// Appends a new empty block to the layout.
    pub fn add_block(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(Some(BasicBlock {
            name: self.next_block_name,
            ..BasicBlock::default()
        }));
        self.next_block_name += 1;
        self.order.push(id);
        id
    }

    /// Sets the address range of `block`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] for a stale block.
    pub fn set_block_range(&mut self, block: BlockId, ip: u64, end_ip: Option<u64>) -> Result<()> {
        let b = self.block_mut(block)?;
        b.ip = Some(ip);
        b.end_ip = end_ip;
        Ok(())
    }

    /// Deletes an unconnected block together with its instructions.
    ///
    /// Consumers outside the block are pointed at the empty constant.
    ///
    /// # Errors
    /// Returns [`Error::Integrity`] if the block still has edges.
    pub fn del_block(&mut self, block: BlockId) -> Result<()> {
        let b = self.block(block)?;
        if !b.successors.is_empty() || !b.predecessors.is_empty() {
            return Err(integrity_error!("deleting {block} while it still has edges"));
        }

        let insns: Vec<InsnId> = self.iter_insns(block).collect();
        for &id in &insns {
            self.replace_all_uses_with(id, Constant::Void)?;
        }
        for &id in insns.iter().rev() {
            self.erase(id)?;
        }
        self.replace_all_uses_with(block, Constant::Void)?;

        self.order.retain(|&b| b != block);
        self.blocks[block.index()] = None;
        trace!("deleted {block}");
        Ok(())
    }

    /// Adds the edge `from -> to`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHandle`] for stale blocks.
    pub fn add_jump(&mut self, from: BlockId, to: BlockId) -> Result<()> {
        self.block(to)?;
        self.block_mut(from)?.successors.push(to);
        self.block_mut(to)?.predecessors.push(from);
        Ok(())
    }

    /// Removes one edge `from -> to`.
    ///
    /// With `fix_phi` the incoming operand of every leading `phi` of `to` that corresponds to
    /// `from` is removed as well.
    ///
    /// # Errors
    /// Returns [`Error::Integrity`] if there is no such edge.
    pub fn del_jump(&mut self, from: BlockId, to: BlockId, fix_phi: bool) -> Result<()> {
        let pred_pos = self
            .block(to)?
            .predecessors
            .iter()
            .position(|&p| p == from)
            .ok_or_else(|| integrity_error!("{from} is not a predecessor of {to}"))?;
        let succ_pos = self
            .block(from)?
            .successors
            .iter()
            .position(|&s| s == to)
            .ok_or_else(|| integrity_error!("{to} is not a successor of {from}"))?;

        if fix_phi {
            let phis: Vec<InsnId> = self
                .iter_insns(to)
                .take_while(|&id| self[id].opcode() == Opcode::Phi)
                .collect();
            for phi in phis {
                if pred_pos < self[phi].operand_count() {
                    self.remove_operand(phi, pred_pos)?;
                }
            }
        }

        self.block_mut(to)?.predecessors.remove(pred_pos);
        self.block_mut(from)?.successors.remove(succ_pos);
        Ok(())
    }

    /// Splits `block` before `at`, moving `at` and everything after it into a new block that
    /// takes over the outgoing edges. Returns the block now holding `at`.
    ///
    /// # Errors
    /// Returns [`Error::Integrity`] if `at` is not part of `block`.
    pub fn split(&mut self, block: BlockId, at: InsnId) -> Result<BlockId> {
        let ins = self.insn(at)?;
        if ins.block != Some(block) {
            return Err(integrity_error!("{at} is not part of {block}"));
        }
        let (prev, at_ip) = (ins.prev, ins.ip);
        let Some(prev) = prev else {
            return Ok(block);
        };

        let moved: Vec<InsnId> = std::iter::successors(Some(at), |id| {
            self.get_insn(*id).and_then(|i| i.next)
        })
        .collect();

        let new = self.add_block();
        self.order.pop();
        let position = self
            .order
            .iter()
            .position(|&b| b == block)
            .map_or(self.order.len(), |p| p + 1);
        self.order.insert(position, new);

        for &id in &moved {
            self.insn_mut(id)?.block = Some(new);
        }
        self.insn_mut(at)?.prev = None;
        self.insn_mut(prev)?.next = None;

        let old = self.block_mut(block)?;
        let last = old.last;
        let end_ip = old.end_ip;
        old.last = Some(prev);
        old.len -= moved.len();
        old.end_ip = at_ip;
        let successors = std::mem::take(&mut old.successors);

        for &succ in &successors {
            for p in self.block_mut(succ)?.predecessors.iter_mut() {
                if *p == block {
                    *p = new;
                }
            }
        }

        let fresh = self.block_mut(new)?;
        fresh.first = Some(at);
        fresh.last = last;
        fresh.len = moved.len();
        fresh.ip = at_ip;
        fresh.end_ip = end_ip;
        fresh.successors = successors;

        trace!("split {block} at {at} into {new}");
        Ok(new)
    }

    /// Reorders the block layout in reverse postorder from the entry, unreachable blocks last,
    /// and renames the blocks to match.
    pub fn topological_sort(&mut self) {
        let Some(entry) = self.entry_block() else {
            return;
        };

        let mut order: Vec<BlockId> = reverse_postorder(&*self, entry.into())
            .into_iter()
            .map(BlockId::from)
            .collect();
        let mut seen = vec![false; self.blocks.len()];
        for block in &order {
            seen[block.index()] = true;
        }
        order.extend(self.order.iter().copied().filter(|b| !seen[b.index()]));

        self.order = order;
        self.rename_blocks();
    }

    /// Renumbers instructions in layout order.
    pub fn rename_insns(&mut self) {
        let mut name = 0;
        for block in self.order.clone() {
            let ids: Vec<InsnId> = self.iter_insns(block).collect();
            for id in ids {
                if let Some(Some(ins)) = self.insns.get_mut(id.index()) {
                    ins.name = name;
                    name += 1;
                }
            }
        }
        self.next_insn_name = name;
    }

    /// Renumbers blocks in layout order.
    pub fn rename_blocks(&mut self) {
        for (name, block) in self.order.iter().enumerate() {
            if let Some(Some(b)) = self.blocks.get_mut(block.index()) {
                b.name = name as u32;
            }
        }
        self.next_block_name = self.order.len() as u32;
    }

    // Validation

    /// Checks operand count, operand types and constant-only slots of `id`.
    ///
    /// # Errors
    /// Returns [`Error::Integrity`], [`Error::TypeMismatch`] or [`Error::ConstexprMismatch`].
    pub fn validate_insn(&self, id: InsnId) -> Result<()> {
        let ins = self.insn(id)?;
        let info = ins.info();
        let fixed = info.operands.len();
        let count = ins.operand_count();

        if count < fixed || (info.variadic.is_none() && count != fixed) {
            return Err(integrity_error!(
                "{} has {count} operand(s), expected {fixed}",
                self.display_insn(id)
            ));
        }

        for (index, operand) in ins.operands().enumerate() {
            let slot = if index < fixed {
                info.operands[index]
            } else {
                info.variadic.unwrap_or(TypeSlot::Any)
            };
            let Some(expected) = ins.resolve(slot) else {
                continue;
            };
            let found = self.operand_type(operand);
            if found != expected {
                return Err(Error::TypeMismatch {
                    index,
                    expected,
                    found,
                    insn: self.display_insn(id).to_string(),
                });
            }
        }

        for &index in info.constexprs {
            if matches!(ins.operand(index), Some(Operand::Value(_))) {
                return Err(Error::ConstexprMismatch {
                    index,
                    insn: self.display_insn(id).to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_links(&self, block: BlockId) -> Result<()> {
        let b = self.block(block)?;
        let mut prev = None;
        let mut count = 0;
        let mut cursor = b.first;

        while let Some(id) = cursor {
            let ins = self.insn(id)?;
            if ins.block != Some(block) || ins.prev != prev {
                return Err(integrity_error!("{id} is linked into {block} inconsistently"));
            }
            count += 1;
            if count > b.len {
                return Err(integrity_error!("{block} holds more than {} instructions", b.len));
            }
            prev = Some(id);
            cursor = ins.next;
        }

        if count != b.len || b.last != prev {
            return Err(integrity_error!("{block} length or tail is out of sync"));
        }
        Ok(())
    }

    fn validate_use_list(&self, value: ValueId, list: &UseList) -> Result<()> {
        let mut count = 0;
        for (use_id, record) in self.uses.iter(list) {
            if record.value != value {
                return Err(integrity_error!("{use_id:?} on list of {value} names {}", record.value));
            }
            let slot = self
                .get_insn(record.user)
                .and_then(|i| i.slots.get(record.slot))
                .ok_or_else(|| integrity_error!("{use_id:?} of {value} has no operand slot"))?;
            if slot.use_id != Some(use_id) || slot.operand != Operand::Value(value) {
                return Err(integrity_error!(
                    "operand #{} of {} does not hold {value}",
                    record.slot,
                    record.user
                ));
            }
            count += 1;
            if count > list.len() {
                return Err(integrity_error!("use list of {value} is cyclic"));
            }
        }

        if count != list.len() {
            return Err(integrity_error!(
                "use list of {value} has {count} entries, expected {}",
                list.len()
            ));
        }
        Ok(())
    }

    /// Validates the instruction list and every instruction of `block`.
    ///
    /// # Errors
    /// Returns the first violation found.
    pub fn validate_block(&self, block: BlockId) -> Result<()> {
        self.validate_links(block)?;
        for id in self.iter_insns(block) {
            self.validate_insn(id)?;
        }
        Ok(())
    }

    /// Validates the whole routine: block links, operand types and use-list soundness.
    ///
    /// Every tracked operand slot must own exactly one use record on the list of the value it
    /// references, and every use record must be owned by such a slot.
    ///
    /// # Errors
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<()> {
        let mut tracked = 0;

        for (index, entry) in self.insns.iter().enumerate() {
            let Some(ins) = entry else {
                continue;
            };
            let id = InsnId::new(index);
            match ins.block {
                Some(block) if self.get_block(block).is_some() => {}
                _ => return Err(integrity_error!("{id} is alive outside of any block")),
            }
            self.validate_insn(id)?;

            for (slot, s) in ins.slots.iter().enumerate() {
                match (&s.operand, s.use_id) {
                    (Operand::Value(value), Some(use_id)) => {
                        let record = self
                            .uses
                            .get(use_id)
                            .ok_or_else(|| integrity_error!("operand #{slot} of {id} has a freed use"))?;
                        if record.value != *value || record.user != id || record.slot != slot {
                            return Err(integrity_error!("operand #{slot} of {id} owns a foreign use"));
                        }
                        if !self.contains_value(*value) {
                            return Err(integrity_error!("operand #{slot} of {id} dangles"));
                        }
                        tracked += 1;
                    }
                    (Operand::Value(_), None) => {
                        return Err(integrity_error!("operand #{slot} of {id} is untracked"));
                    }
                    (_, Some(_)) => {
                        return Err(integrity_error!("operand #{slot} of {id} owns a stale use"));
                    }
                    _ => {}
                }
            }
            self.validate_use_list(id.into(), &ins.uses)?;
        }

        for &block in &self.order {
            self.validate_links(block)?;
            self.validate_use_list(block.into(), &self.block(block)?.uses)?;
        }

        if tracked != self.uses.live() {
            return Err(integrity_error!(
                "{} use records for {tracked} tracked operands",
                self.uses.live()
            ));
        }
        Ok(())
    }

    // Display

    /// Pretty printer for one instruction.
    #[must_use]
    pub fn display_insn(&self, id: InsnId) -> InsnDisplay<'_> {
        InsnDisplay { routine: self, id }
    }

    /// Pretty printer for one block.
    #[must_use]
    pub fn display_block(&self, id: BlockId) -> BlockDisplay<'_> {
        BlockDisplay { routine: self, id }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, operand: &Operand) -> fmt::Result {
        match operand {
            Operand::Const(c) => write!(f, "{c}"),
            Operand::Reg(reg) => match self.arch.as_ref().and_then(|a| a.register_name(*reg)) {
                Some(name) => write!(f, "{name}"),
                None => write!(f, "{reg}"),
            },
            Operand::Mem(mem) => write!(f, "{mem}"),
            Operand::Value(ValueId::Insn(id)) => match self.get_insn(*id) {
                Some(ins) => write!(f, "%{}", ins.name),
                None => write!(f, "%?"),
            },
            Operand::Value(ValueId::Block(id)) => match self.get_block(*id) {
                Some(block) => write!(f, "${:x}", block.name),
                None => write!(f, "$?"),
            },
        }
    }
}

impl Index<InsnId> for Routine {
    type Output = Instruction;

    fn index(&self, id: InsnId) -> &Instruction {
        match self.get_insn(id) {
            Some(ins) => ins,
            None => panic!("use of stale instruction handle {id}"),
        }
    }
}

impl Index<BlockId> for Routine {
    type Output = BasicBlock;

    fn index(&self, id: BlockId) -> &BasicBlock {
        match self.get_block(id) {
            Some(block) => block,
            None => panic!("use of stale block handle {id}"),
        }
    }
}

/// Renders one instruction as `%name = opcode.T0.T1 operand, ...`.
pub struct InsnDisplay<'a> {
    routine: &'a Routine,
    id: InsnId,
}

impl fmt::Display for InsnDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(ins) = self.routine.get_insn(self.id) else {
            return write!(f, "<erased {}>", self.id);
        };

        if !matches!(ins.ty(), Type::None | Type::Pack) {
            write!(f, "%{} = ", ins.name)?;
        }
        write!(f, "{}", ins.opcode)?;
        for ty in ins.templates.iter().take(ins.info().templates) {
            write!(f, ".{ty}")?;
        }
        for (index, operand) in ins.operands().enumerate() {
            f.write_str(if index == 0 { " " } else { ", " })?;
            self.routine.fmt_operand(f, operand)?;
        }
        Ok(())
    }
}

/// Renders one block with its label and instructions.
pub struct BlockDisplay<'a> {
    routine: &'a Routine,
    id: BlockId,
}

impl fmt::Display for BlockDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(block) = self.routine.get_block(self.id) else {
            return write!(f, "<deleted {}>", self.id);
        };

        write!(f, "${:x}:", block.name)?;
        for id in self.routine.iter_insns(self.id) {
            write!(f, "\n\t{}", self.routine.display_insn(id))?;
        }
        Ok(())
    }
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            Some(ip) => write!(f, "routine sub_{ip:x}")?,
            None => write!(f, "routine")?,
        }
        for &block in &self.order {
            write!(f, "\n{}", self.display_block(block))?;
        }
        Ok(())
    }
}

impl GraphBase for Routine {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        self.order.iter().map(|&b| NodeId::from(b))
    }
}

impl Successors for Routine {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.get_block(node.into())
            .map_or(&[][..], |b| b.successors.as_slice())
            .iter()
            .map(|&b| NodeId::from(b))
    }
}

impl Predecessors for Routine {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.get_block(node.into())
            .map_or(&[][..], |b| b.predecessors.as_slice())
            .iter()
            .map(|&b| NodeId::from(b))
    }
}

impl RootedGraph for Routine {
    fn entry(&self) -> NodeId {
        self.entry_block().map_or(NodeId::new(0), NodeId::from)
    }
}
