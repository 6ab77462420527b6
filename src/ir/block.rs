//! Basic blocks and instruction cursors.

use crate::ir::{BlockId, InsnId, Routine, UseList};

/// A straight-line sequence of instructions with control flow edges.
///
/// The instruction order is an intrusive list threaded through the instructions themselves;
/// the block only stores both ends. Edges are kept in both directions and may contain
/// duplicates, one per branch operand.
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub(crate) first: Option<InsnId>,
    pub(crate) last: Option<InsnId>,
    pub(crate) len: usize,
    pub(crate) successors: Vec<BlockId>,
    pub(crate) predecessors: Vec<BlockId>,
    pub(crate) uses: UseList,
    pub(crate) name: u32,
    pub(crate) ip: Option<u64>,
    pub(crate) end_ip: Option<u64>,
}

impl BasicBlock {
    /// First instruction.
    #[must_use]
    pub fn first(&self) -> Option<InsnId> {
        self.first
    }

    /// Last instruction.
    #[must_use]
    pub fn last(&self) -> Option<InsnId> {
        self.last
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` if the block holds no instruction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Blocks control may flow to.
    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    /// Blocks control may flow from.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    /// Number of instructions referencing this block as a label.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.uses.len()
    }

    /// Per-routine display name.
    #[must_use]
    pub fn name(&self) -> u32 {
        self.name
    }

    /// Address of the first machine instruction.
    #[must_use]
    pub fn ip(&self) -> Option<u64> {
        self.ip
    }

    /// Address past the last machine instruction.
    #[must_use]
    pub fn end_ip(&self) -> Option<u64> {
        self.end_ip
    }
}

/// Walks the instructions of one block without borrowing the routine.
///
/// The cursor holds only handles, so the routine can be mutated between steps. Erasing the
/// instruction last returned is safe; the cursor continues with the element that followed
/// it. Instructions inserted after the current element are visited.
#[derive(Clone, Debug)]
pub struct InsnCursor {
    block: BlockId,
    current: Option<InsnId>,
    lookahead: Option<InsnId>,
    started: bool,
    reverse: bool,
}

impl InsnCursor {
    pub(crate) fn new(block: BlockId, reverse: bool) -> Self {
        InsnCursor {
            block,
            current: None,
            lookahead: None,
            started: false,
            reverse,
        }
    }

    /// A cursor positioned on `at`; the first call to `next` yields its neighbour.
    pub(crate) fn positioned(routine: &Routine, block: BlockId, at: InsnId, reverse: bool) -> Self {
        let mut cursor = InsnCursor::new(block, reverse);
        cursor.started = true;
        cursor.current = Some(at);
        cursor.lookahead = cursor.step(routine, at);
        cursor
    }

    fn step(&self, routine: &Routine, from: InsnId) -> Option<InsnId> {
        let ins = routine.get_insn(from)?;
        if self.reverse {
            ins.prev
        } else {
            ins.next
        }
    }

    fn is_member(&self, routine: &Routine, id: InsnId) -> bool {
        routine
            .get_insn(id)
            .is_some_and(|ins| ins.block == Some(self.block))
    }

    /// Advances and returns the next instruction, or `None` at the end of the block.
    pub fn next(&mut self, routine: &Routine) -> Option<InsnId> {
        let candidate = match self.current {
            None if !self.started => {
                self.started = true;
                let block = routine.get_block(self.block)?;
                if self.reverse {
                    block.last
                } else {
                    block.first
                }
            }
            None => return None,
            Some(current) if self.is_member(routine, current) => self.step(routine, current),
            Some(_) => self.lookahead,
        };

        let candidate = candidate.filter(|&id| self.is_member(routine, id));
        self.current = candidate;
        self.lookahead = candidate.and_then(|id| self.step(routine, id));
        candidate
    }
}
