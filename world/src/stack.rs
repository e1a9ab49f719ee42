//! A single column of blocks and its structural operations.

use std::{collections::VecDeque, fmt};

use blocks_world_core::{Block, Predicate, StackId};

use crate::StackError;

/// Ordered column of blocks: free blocks on top of locked blocks.
#[derive(Clone, Debug)]
pub struct Stack {
    id: StackId,
    /// Unlocked blocks, topmost first.
    free: VecDeque<Block>,
    /// Locked blocks, topmost locked first. They never move again.
    locked: VecDeque<Block>,
}

impl Stack {
    pub(crate) fn singleton(id: StackId, base: Block) -> Self {
        Self {
            id,
            free: VecDeque::from([base]),
            locked: VecDeque::new(),
        }
    }

    pub(crate) fn from_blocks(id: StackId, free: Vec<Block>, locked: Vec<Block>) -> Self {
        Self {
            id,
            free: free.into(),
            locked: locked.into(),
        }
    }

    /// Stable identifier assigned by the world.
    #[must_use]
    pub const fn id(&self) -> StackId {
        self.id
    }

    fn sane(&self) -> Result<(), StackError> {
        if self.free.is_empty() && self.locked.is_empty() {
            return Err(StackError::Empty { stack: self.id });
        }
        Ok(())
    }

    /// Blocks of the stack, topmost first.
    pub fn blocks(&self) -> impl DoubleEndedIterator<Item = Block> + '_ {
        self.free.iter().chain(self.locked.iter()).copied()
    }

    /// Blocks of the stack, bottom first.
    pub fn blocks_bottom_up(&self) -> impl Iterator<Item = Block> + '_ {
        self.blocks().rev()
    }

    /// Total number of blocks, free and locked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.free.len() + self.locked.len()
    }

    /// Reports whether the stack holds no blocks; never true inside a world.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reports whether the stack consists of exactly one block.
    #[must_use]
    pub fn is_single(&self) -> bool {
        self.len() == 1
    }

    /// Reports whether the block is part of this stack.
    #[must_use]
    pub fn contains(&self, block: Block) -> bool {
        self.blocks().any(|candidate| candidate == block)
    }

    /// Topmost block, free or locked.
    #[must_use]
    pub fn top(&self) -> Option<Block> {
        self.blocks().next()
    }

    /// Block resting on the table.
    #[must_use]
    pub fn bottom(&self) -> Option<Block> {
        self.blocks().next_back()
    }

    /// Reports whether nothing rests on the block.
    #[must_use]
    pub fn is_clear(&self, block: Block) -> bool {
        self.top() == Some(block)
    }

    /// Reports whether the block rests directly on the table.
    #[must_use]
    pub fn is_on_table(&self, block: Block) -> bool {
        self.bottom() == Some(block)
    }

    /// Reports whether the block is locked in this stack.
    #[must_use]
    pub fn is_locked(&self, block: Block) -> bool {
        self.locked.contains(&block)
    }

    /// Reports whether the topmost block is locked, leaving nothing movable.
    #[must_use]
    pub fn is_top_locked(&self) -> bool {
        self.free.is_empty() && !self.locked.is_empty()
    }

    /// Reports whether `upper` rests directly on `lower`.
    pub fn is_on(&self, upper: Block, lower: Block) -> Result<bool, StackError> {
        self.ensure_contains(upper)?;
        self.ensure_contains(lower)?;
        Ok(self.below(upper)? == Some(lower))
    }

    /// Block immediately above the provided one, if any.
    pub fn above(&self, block: Block) -> Result<Option<Block>, StackError> {
        self.ensure_contains(block)?;
        let mut above = None;
        for candidate in self.blocks() {
            if candidate == block {
                return Ok(above);
            }
            above = Some(candidate);
        }
        Ok(None)
    }

    /// Block immediately below the provided one; `None` means the table.
    pub fn below(&self, block: Block) -> Result<Option<Block>, StackError> {
        self.ensure_contains(block)?;
        Ok(self
            .blocks()
            .skip_while(|candidate| *candidate != block)
            .nth(1))
    }

    /// Facts describing the stack: `CLEAR` for the top, `ON` for each pair and
    /// `ONTABLE` for the bottom.
    #[must_use]
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = Vec::with_capacity(self.len() + 1);
        let mut above: Option<Block> = None;
        for block in self.blocks() {
            match above {
                None => predicates.push(Predicate::Clear { block }),
                Some(upper) => predicates.push(Predicate::On {
                    block: upper,
                    below: block,
                }),
            }
            above = Some(block);
        }
        if let Some(block) = above {
            predicates.push(Predicate::OnTable { block });
        }
        predicates
    }

    /// Removes the topmost free block, which must rest on `from`.
    pub(crate) fn unstack(&mut self, block: Block, from: Block) -> Result<Block, StackError> {
        self.sane()?;
        let Some(top) = self.free.front().copied() else {
            return Err(StackError::AllLocked { stack: self.id });
        };
        if top != block {
            return Err(StackError::NotTopmost { block });
        }
        if self.is_single() {
            return Err(StackError::OnTable { block });
        }
        if self.blocks().nth(1) != Some(from) {
            return Err(StackError::NotOver { block, below: from });
        }
        Ok(self.free.pop_front().unwrap_or(block))
    }

    /// Pushes `block` onto the stack, whose topmost block must be `onto`.
    pub(crate) fn stack(&mut self, block: Block, onto: Block) -> Result<(), StackError> {
        self.sane()?;
        if !self.is_clear(onto) {
            return Err(StackError::NotClear { block: onto });
        }
        self.free.push_front(block);
        Ok(())
    }

    /// Locks the block; it must rest on the table or on a locked block.
    pub(crate) fn lock(&mut self, block: Block) -> Result<(), StackError> {
        self.sane()?;
        self.ensure_contains(block)?;
        if self.is_locked(block) {
            return Err(StackError::AlreadyLocked { block });
        }
        let below = self.below(block)?;
        if below.is_some_and(|below| !self.is_locked(below)) {
            return Err(StackError::BelowNotLocked { block });
        }
        // The lockable block is always the lowest free one.
        let _ = self.free.pop_back();
        self.locked.push_front(block);
        Ok(())
    }

    fn ensure_contains(&self, block: Block) -> Result<(), StackError> {
        if self.contains(block) {
            Ok(())
        } else {
            Err(StackError::NotInStack { block })
        }
    }
}

impl PartialEq for Stack {
    /// Stacks are equal when they hold the same blocks in the same lock state.
    fn eq(&self, other: &Self) -> bool {
        self.free == other.free && self.locked == other.locked
    }
}

impl Eq for Stack {}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, block) in self.blocks().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            if self.is_locked(block) {
                write!(f, "{{{block}}}")?;
            } else {
                write!(f, "{block}")?;
            }
        }
        write!(f, "]")
    }
}
