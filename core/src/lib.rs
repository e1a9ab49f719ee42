#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the blocks-world simulation.
//!
//! This crate defines the vocabulary that connects agents, the authoritative
//! world and the environment's step engine. Agents observe a perception and
//! answer with a [`PlanUpdate`]; the environment merges it into the agent's
//! [`Plan`], executes the front [`Action`] against the world and records
//! [`Event`] values describing what happened, so runs can be replayed and
//! compared deterministically.

use std::fmt;

use serde::{Deserialize, Serialize};

mod action;
mod plan;

pub use action::{Action, ParseActionError};
pub use plan::{Plan, PlanUpdate, UpdateSummary};

/// Character denoting an empty (level, column) slot in the world-state format.
pub const EMPTY_SPACE: char = '.';

/// Immutable identity token for one block; two blocks are equal iff labels match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Block(char);

impl Block {
    /// Creates a block with the provided label.
    #[must_use]
    pub const fn new(label: char) -> Self {
        Self(label)
    }

    /// Retrieves the block's label.
    #[must_use]
    pub const fn label(&self) -> char {
        self.0
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier the world assigns to every stack it creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StackId(u32);

impl StackId {
    /// Creates a stack identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Addressable label of a station, the observation point of one stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationLabel(char);

impl StationLabel {
    /// Label handed to the first station of a world.
    pub const FIRST: StationLabel = StationLabel('0');

    /// Creates a station label from its character.
    #[must_use]
    pub const fn new(label: char) -> Self {
        Self(label)
    }

    /// Retrieves the label character.
    #[must_use]
    pub const fn label(&self) -> char {
        self.0
    }

    /// Label that follows this one in character order, if any.
    #[must_use]
    pub fn successor(&self) -> Option<StationLabel> {
        let mut code = u32::from(self.0);
        loop {
            code = code.checked_add(1)?;
            if code > u32::from(char::MAX) {
                return None;
            }
            if let Some(next) = char::from_u32(code) {
                return Some(Self(next));
            }
        }
    }
}

impl fmt::Display for StationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of an agent inside one environment, in join order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates an agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// First-order fact describing relative block placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Predicate {
    /// The agent holds nothing.
    ArmEmpty,
    /// The agent holds the block.
    Hold {
        /// Held block.
        block: Block,
    },
    /// The block rests directly on another block.
    On {
        /// Upper block.
        block: Block,
        /// Block immediately beneath.
        below: Block,
    },
    /// The block rests directly on the table.
    OnTable {
        /// Bottom block of a stack.
        block: Block,
    },
    /// Nothing rests on the block.
    Clear {
        /// Topmost block of a stack.
        block: Block,
    },
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArmEmpty => write!(f, "ARMEMPTY"),
            Self::Hold { block } => write!(f, "HOLD({block})"),
            Self::On { block, below } => write!(f, "ON({block},{below})"),
            Self::OnTable { block } => write!(f, "ONTABLE({block})"),
            Self::Clear { block } => write!(f, "CLEAR({block})"),
        }
    }
}

/// World edit applied by a stochastic perturbation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerturbationEdit {
    /// A top block was moved into the hidden stash.
    Stashed {
        /// Block that left the world.
        block: Block,
    },
    /// A stashed block was placed on top of a stack.
    Unstashed {
        /// Block that returned to the world.
        block: Block,
        /// Block that received it.
        onto: Block,
    },
    /// A top block was put down as a new single-block stack.
    Dropped {
        /// Block that was put down.
        block: Block,
    },
    /// A top block was moved onto another stack.
    Teleported {
        /// Block that moved.
        block: Block,
        /// Block that received it.
        onto: Block,
    },
}

/// Events recorded by the environment while running a cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// An agent answered its perception with a plan update.
    PlanUpdated {
        /// Agent that responded.
        agent: AgentId,
        /// Update returned by the agent.
        update: PlanUpdate,
    },
    /// An agent's action passed the world-legality checks and was applied.
    ActionPerformed {
        /// Acting agent.
        agent: AgentId,
        /// Action that was applied.
        action: Action,
    },
    /// An agent's action was illegal in the current world and left it unchanged.
    ActionFailed {
        /// Acting agent.
        agent: AgentId,
        /// Action that failed.
        action: Action,
    },
    /// The conflict policy postponed an agent's action to a later cycle.
    ActionDeferred {
        /// Agent whose action was postponed.
        agent: AgentId,
        /// Action that stays queued.
        action: Action,
    },
    /// An agent moved to another station, or lost its station.
    AgentRelocated {
        /// Relocated agent.
        agent: AgentId,
        /// Station the agent left.
        from: Option<StationLabel>,
        /// Station the agent arrived at.
        to: Option<StationLabel>,
    },
    /// A station appeared alongside a new stack.
    StationCreated {
        /// Label of the new station.
        station: StationLabel,
        /// Stack observed from the station.
        stack: StackId,
    },
    /// A station disappeared together with its stack.
    StationRemoved {
        /// Label of the removed station.
        station: StationLabel,
        /// Stack that no longer exists.
        stack: StackId,
    },
    /// The perturbation engine edited an unobserved part of the world.
    Perturbed {
        /// Edit that was applied.
        edit: PerturbationEdit,
    },
    /// Every agent signalled completion in the same cycle.
    AllAgentsCompleted,
}
