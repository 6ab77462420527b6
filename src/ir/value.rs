//! Value handles and the use-list engine.
//!
//! Every reference from an operand slot to a value is recorded as a [`Use`] in the routine's
//! [`UseArena`]. The uses of one value form an intrusive doubly-linked list rooted in the
//! value's [`UseList`], so a consumer can unlink itself in constant time and the producer can
//! enumerate or rewrite all of its consumers without scanning the routine.
//!
//! The arena is owned by [`crate::ir::Routine`]; all mutation goes through the routine, which
//! keeps the operand slots and the lists in sync.

use std::fmt;

use crate::utils::graph::NodeId;

/// Handle of an instruction inside its routine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsnId(u32);

impl InsnId {
    /// Creates a handle from a raw arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        InsnId(index as u32)
    }

    /// The raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for InsnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InsnId({})", self.0)
    }
}

impl fmt::Display for InsnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insn#{}", self.0)
    }
}

/// Handle of a basic block inside its routine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    /// Creates a handle from a raw arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        BlockId(index as u32)
    }

    /// The raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

impl From<BlockId> for NodeId {
    fn from(value: BlockId) -> Self {
        NodeId::new(value.index())
    }
}

impl From<NodeId> for BlockId {
    fn from(value: NodeId) -> Self {
        BlockId::new(value.index())
    }
}

/// Anything that produces a result other instructions can consume.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ValueId {
    /// The result of an instruction
    Insn(InsnId),
    /// A basic block, consumed as a branch label
    Block(BlockId),
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueId::Insn(id) => write!(f, "{id}"),
            ValueId::Block(id) => write!(f, "{id}"),
        }
    }
}

impl From<InsnId> for ValueId {
    fn from(value: InsnId) -> Self {
        ValueId::Insn(value)
    }
}

impl From<BlockId> for ValueId {
    fn from(value: BlockId) -> Self {
        ValueId::Block(value)
    }
}

/// Handle of a use record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct UseId(u32);

impl UseId {
    /// The raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One consumer of a value: operand `slot` of instruction `user` reads `value`.
#[derive(Clone, Copy, Debug)]
pub struct Use {
    /// The consumed value
    pub value: ValueId,
    /// The consuming instruction
    pub user: InsnId,
    /// Operand index inside `user`
    pub slot: usize,
    prev: Option<UseId>,
    next: Option<UseId>,
}

/// Head of the intrusive list of uses of one value.
#[derive(Clone, Debug, Default)]
pub struct UseList {
    head: Option<UseId>,
    tail: Option<UseId>,
    len: usize,
}

impl UseList {
    /// Number of consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if nothing consumes the value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// First use in insertion order.
    #[must_use]
    pub fn head(&self) -> Option<UseId> {
        self.head
    }
}

/// Storage for every [`Use`] of a routine, with slot reuse.
#[derive(Clone, Debug, Default)]
pub struct UseArena {
    slots: Vec<Option<Use>>,
    free: Vec<UseId>,
}

impl UseArena {
    /// Number of live use records.
    #[must_use]
    pub fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Looks up a live use record.
    #[must_use]
    pub fn get(&self, id: UseId) -> Option<&Use> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// The use following `id` in its value's list.
    #[must_use]
    pub fn next(&self, id: UseId) -> Option<UseId> {
        self.get(id).and_then(|u| u.next)
    }

    /// Appends a new use of `value` by `user` at operand `slot` to `list`.
    pub(crate) fn link(
        &mut self,
        list: &mut UseList,
        value: ValueId,
        user: InsnId,
        slot: usize,
    ) -> UseId {
        let record = Use {
            value,
            user,
            slot,
            prev: list.tail,
            next: None,
        };

        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id.index()] = Some(record);
                id
            }
            None => {
                self.slots.push(Some(record));
                UseId((self.slots.len() - 1) as u32)
            }
        };

        match list.tail {
            Some(tail) => {
                if let Some(Some(t)) = self.slots.get_mut(tail.index()) {
                    t.next = Some(id);
                }
            }
            None => list.head = Some(id),
        }
        list.tail = Some(id);
        list.len += 1;
        id
    }

    /// Removes `id` from `list` and frees its record.
    ///
    /// Returns `None` if `id` is not live.
    pub(crate) fn unlink(&mut self, list: &mut UseList, id: UseId) -> Option<Use> {
        let record = self.slots.get_mut(id.index())?.take()?;

        match record.prev {
            Some(prev) => {
                if let Some(Some(p)) = self.slots.get_mut(prev.index()) {
                    p.next = record.next;
                }
            }
            None => list.head = record.next,
        }
        match record.next {
            Some(next) => {
                if let Some(Some(n)) = self.slots.get_mut(next.index()) {
                    n.prev = record.prev;
                }
            }
            None => list.tail = record.prev,
        }

        list.len -= 1;
        self.free.push(id);
        Some(record)
    }

    /// Updates the operand index stored in a use after its slot moved.
    pub(crate) fn set_slot(&mut self, id: UseId, slot: usize) {
        if let Some(Some(record)) = self.slots.get_mut(id.index()) {
            record.slot = slot;
        }
    }

    /// Iterates the uses of `list` in insertion order.
    pub fn iter<'a>(&'a self, list: &UseList) -> UseIter<'a> {
        UseIter {
            arena: self,
            next: list.head,
        }
    }
}

/// Iterator over the uses of one value.
pub struct UseIter<'a> {
    arena: &'a UseArena,
    next: Option<UseId>,
}

impl<'a> Iterator for UseIter<'a> {
    type Item = (UseId, &'a Use);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let record = self.arena.get(id)?;
        self.next = record.next;
        Some((id, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value() -> ValueId {
        ValueId::Insn(InsnId::new(0))
    }

    #[test]
    fn test_link_order() {
        let mut arena = UseArena::default();
        let mut list = UseList::default();

        for slot in 0..3 {
            arena.link(&mut list, value(), InsnId::new(1), slot);
        }

        assert_eq!(list.len(), 3);
        let slots: Vec<usize> = arena.iter(&list).map(|(_, u)| u.slot).collect();
        assert_eq!(slots, vec![0, 1, 2]);
    }

    #[test]
    fn test_unlink_middle_head_tail() {
        let mut arena = UseArena::default();
        let mut list = UseList::default();

        let a = arena.link(&mut list, value(), InsnId::new(1), 0);
        let b = arena.link(&mut list, value(), InsnId::new(2), 0);
        let c = arena.link(&mut list, value(), InsnId::new(3), 0);

        assert!(arena.unlink(&mut list, b).is_some());
        let users: Vec<InsnId> = arena.iter(&list).map(|(_, u)| u.user).collect();
        assert_eq!(users, vec![InsnId::new(1), InsnId::new(3)]);

        assert!(arena.unlink(&mut list, a).is_some());
        assert!(arena.unlink(&mut list, c).is_some());
        assert!(list.is_empty());
        assert_eq!(list.head(), None);
        assert_eq!(arena.live(), 0);

        // Double unlink is rejected
        assert!(arena.unlink(&mut list, c).is_none());
    }

    #[test]
    fn test_slot_reuse() {
        let mut arena = UseArena::default();
        let mut list = UseList::default();

        let a = arena.link(&mut list, value(), InsnId::new(1), 0);
        arena.unlink(&mut list, a);
        let b = arena.link(&mut list, value(), InsnId::new(2), 4);

        assert_eq!(a, b);
        assert_eq!(arena.get(b).map(|u| u.slot), Some(4));
    }
}
