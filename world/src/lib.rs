#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state for the blocks-world simulation.
//!
//! A [`World`] owns an ordered list of [`Stack`] values together with the set
//! of every block that ever existed in it. Stacks are created and destroyed as
//! blocks are picked up and put down, but a stack inside a world is never
//! empty and a block sits in at most one stack at a time.

use std::collections::BTreeSet;

use blocks_world_core::{Block, Predicate, StackId};
use thiserror::Error;

mod format;
mod stack;

pub use format::{render, Annotations, FormatError};
pub use stack::Stack;

/// Structural legality failures raised by a single [`Stack`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum StackError {
    /// The stack holds no blocks at all.
    #[error("stack {stack:?} contains no blocks")]
    Empty {
        /// Offending stack.
        stack: StackId,
    },
    /// Every block in the stack is locked.
    #[error("all blocks in stack {stack:?} are locked")]
    AllLocked {
        /// Offending stack.
        stack: StackId,
    },
    /// The block is not the topmost free block.
    #[error("block [{block}] is not the topmost block of this stack")]
    NotTopmost {
        /// Offending block.
        block: Block,
    },
    /// The block is directly on the table and must be picked up instead.
    #[error("block [{block}] is directly on the table; use pick-up")]
    OnTable {
        /// Offending block.
        block: Block,
    },
    /// The block does not rest on the named block.
    #[error("block [{block}] is not over [{below}]")]
    NotOver {
        /// Block that was to be lifted.
        block: Block,
        /// Block it was claimed to rest on.
        below: Block,
    },
    /// The target block is not at the top of the stack.
    #[error("block [{block}] is not the topmost block of this stack")]
    NotClear {
        /// Offending block.
        block: Block,
    },
    /// The block is already locked.
    #[error("block [{block}] is already locked")]
    AlreadyLocked {
        /// Offending block.
        block: Block,
    },
    /// The block beneath is not locked yet.
    #[error("the block under [{block}] is not locked")]
    BelowNotLocked {
        /// Offending block.
        block: Block,
    },
    /// The block is not part of the stack.
    #[error("block [{block}] is not in this stack")]
    NotInStack {
        /// Offending block.
        block: Block,
    },
}

/// Failures raised by [`World`] operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The block was never part of this world.
    #[error("block [{block}] has never existed in this world")]
    NeverExisted {
        /// Offending block.
        block: Block,
    },
    /// The block exists but is not currently placed in any stack.
    #[error("block [{block}] is not currently in any stack")]
    NotPlaced {
        /// Offending block.
        block: Block,
    },
    /// The block is already placed in a stack.
    #[error("block [{block}] is already in a stack")]
    AlreadyPlaced {
        /// Offending block.
        block: Block,
    },
    /// The block shares its stack with other blocks.
    #[error("block [{block}] is not in a single-block stack")]
    NotSingle {
        /// Offending block.
        block: Block,
    },
    /// The block is locked and cannot move.
    #[error("block [{block}] is locked")]
    Locked {
        /// Offending block.
        block: Block,
    },
    /// No stack carries the provided identifier.
    #[error("stack {stack:?} does not exist")]
    UnknownStack {
        /// Offending identifier.
        stack: StackId,
    },
    /// The owning stack rejected the operation.
    #[error(transparent)]
    Stack(#[from] StackError),
}

/// Represents the authoritative blocks-world state.
///
/// Cloning deep-copies every stack, free and locked blocks alike, so a clone
/// can be mutated without affecting the original.
#[derive(Clone, Debug)]
pub struct World {
    stacks: Vec<Stack>,
    all_blocks: BTreeSet<Block>,
    next_stack_id: u32,
}

impl World {
    /// Parses a world from the text grid format.
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        format::parse(text)
    }

    fn empty() -> Self {
        Self {
            stacks: Vec::new(),
            all_blocks: BTreeSet::new(),
            next_stack_id: 0,
        }
    }

    fn allocate_id(&mut self) -> StackId {
        let id = StackId::new(self.next_stack_id);
        self.next_stack_id = self.next_stack_id.saturating_add(1);
        id
    }

    /// Stacks in world order.
    #[must_use]
    pub fn stacks(&self) -> &[Stack] {
        &self.stacks
    }

    /// Every block that ever existed in this world.
    #[must_use]
    pub fn all_blocks(&self) -> &BTreeSet<Block> {
        &self.all_blocks
    }

    /// Reports whether the block was ever part of this world.
    #[must_use]
    pub fn exists(&self, block: Block) -> bool {
        self.all_blocks.contains(&block)
    }

    /// Reports whether the block currently sits in any stack.
    #[must_use]
    pub fn contains(&self, block: Block) -> bool {
        self.stacks.iter().any(|stack| stack.contains(block))
    }

    /// Looks up a stack by identifier.
    #[must_use]
    pub fn stack_by_id(&self, id: StackId) -> Option<&Stack> {
        self.stacks.iter().find(|stack| stack.id() == id)
    }

    /// Position of the stack in world order.
    #[must_use]
    pub fn position(&self, id: StackId) -> Option<usize> {
        self.stacks.iter().position(|stack| stack.id() == id)
    }

    /// Stack currently holding the block.
    pub fn get_stack(&self, block: Block) -> Result<&Stack, WorldError> {
        let index = self.index_of(block)?;
        Ok(&self.stacks[index])
    }

    fn index_of(&self, block: Block) -> Result<usize, WorldError> {
        if !self.exists(block) {
            return Err(WorldError::NeverExisted { block });
        }
        self.stacks
            .iter()
            .position(|stack| stack.contains(block))
            .ok_or(WorldError::NotPlaced { block })
    }

    fn ensure_unplaced(&self, block: Block) -> Result<(), WorldError> {
        if !self.exists(block) {
            return Err(WorldError::NeverExisted { block });
        }
        if self.contains(block) {
            return Err(WorldError::AlreadyPlaced { block });
        }
        Ok(())
    }

    /// Lifts a block that sits alone on the table, removing its stack.
    pub fn pick_up(&mut self, block: Block) -> Result<Block, WorldError> {
        let index = self.index_of(block)?;
        let stack = &self.stacks[index];
        if !stack.is_single() {
            return Err(WorldError::NotSingle { block });
        }
        if stack.is_locked(block) {
            return Err(WorldError::Locked { block });
        }
        let _ = self.stacks.remove(index);
        Ok(block)
    }

    /// Puts the block down as a new single-block stack.
    ///
    /// The stack is inserted at the position of `before`, or appended when no
    /// position is given.
    pub fn put_down(
        &mut self,
        block: Block,
        before: Option<StackId>,
    ) -> Result<StackId, WorldError> {
        self.ensure_unplaced(block)?;
        let index = match before {
            Some(stack) => self
                .position(stack)
                .ok_or(WorldError::UnknownStack { stack })?,
            None => self.stacks.len(),
        };
        let id = self.allocate_id();
        self.stacks.insert(index, Stack::singleton(id, block));
        Ok(id)
    }

    /// Stacks a loose block on top of `onto`.
    pub fn stack(&mut self, block: Block, onto: Block) -> Result<(), WorldError> {
        self.ensure_unplaced(block)?;
        let index = self.index_of(onto)?;
        self.stacks[index].stack(block, onto)?;
        Ok(())
    }

    /// Lifts `block` off `from`, returning the lifted block.
    pub fn unstack(&mut self, block: Block, from: Block) -> Result<Block, WorldError> {
        let index = self.index_of(block)?;
        Ok(self.stacks[index].unstack(block, from)?)
    }

    /// Locks the block in place.
    pub fn lock(&mut self, block: Block) -> Result<(), WorldError> {
        let index = self.index_of(block)?;
        self.stacks[index].lock(block)?;
        Ok(())
    }

    /// Reports whether the block rests directly on the table.
    pub fn is_on_table(&self, block: Block) -> Result<bool, WorldError> {
        Ok(self.get_stack(block)?.is_on_table(block))
    }

    /// The state of the world as first-order facts, stack by stack.
    #[must_use]
    pub fn predicates(&self) -> Vec<Predicate> {
        self.stacks.iter().flat_map(Stack::predicates).collect()
    }
}

impl std::fmt::Display for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&render(self, 3, &Annotations::default(), true))
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::collections::BTreeSet;

    use blocks_world_core::{Block, StackId};

    use super::World;

    /// Constraints used when selecting stacks.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StackFilter {
        /// Allows stacks made of a single block.
        pub allow_single: bool,
        /// Allows stacks whose topmost block is locked.
        pub allow_locked_top: bool,
    }

    /// Identifiers of the stacks, in world order, that nobody observes and that pass the filter.
    #[must_use]
    pub fn unobserved_stacks(
        world: &World,
        observed: &BTreeSet<StackId>,
        filter: StackFilter,
    ) -> Vec<StackId> {
        world
            .stacks()
            .iter()
            .filter(|stack| !observed.contains(&stack.id()))
            .filter(|stack| filter.allow_single || !stack.is_single())
            .filter(|stack| filter.allow_locked_top || !stack.is_top_locked())
            .map(|stack| stack.id())
            .collect()
    }

    /// Topmost block of the identified stack.
    #[must_use]
    pub fn top_block(world: &World, stack: StackId) -> Option<Block> {
        world.stack_by_id(stack).and_then(|stack| stack.top())
    }

    /// Blocks that exist in the world but sit in no stack.
    #[must_use]
    pub fn loose_blocks(world: &World) -> Vec<Block> {
        world
            .all_blocks()
            .iter()
            .copied()
            .filter(|block| !world.contains(*block))
            .collect()
    }

    /// Partition of the world into columns, bottom first, ignoring order and identifiers.
    #[must_use]
    pub fn partition(world: &World) -> BTreeSet<Vec<Block>> {
        world
            .stacks()
            .iter()
            .map(|stack| stack.blocks_bottom_up().collect())
            .collect()
    }
}
