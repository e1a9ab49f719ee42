//! Fatal protocol failures raised while stepping the environment.

use blocks_world_core::{Action, AgentId, Block, StationLabel};
use blocks_world_world::WorldError;
use thiserror::Error;

/// Fatal defects in an agent or in the environment itself.
///
/// World-legality failures never surface here; they only flip the agent's
/// previous-action flag.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The action needs a held block the agent does not hold.
    #[error("agent {agent:?} requested {action} while holding {holding:?}")]
    HoldingMismatch {
        /// Offending agent.
        agent: AgentId,
        /// Requested action.
        action: Action,
        /// Block the agent actually holds.
        holding: Option<Block>,
    },
    /// The action needs an empty arm but the agent holds a block.
    #[error("agent {agent:?} requested {action} while already holding [{holding}]")]
    AlreadyHolding {
        /// Offending agent.
        agent: AgentId,
        /// Requested action.
        action: Action,
        /// Block the agent holds.
        holding: Block,
    },
    /// An agent sits at a station that no longer exists.
    #[error("station {station} does not exist")]
    UnknownStation {
        /// Missing station.
        station: StationLabel,
    },
    /// Stations and stacks no longer correspond one to one.
    #[error("{stations} stations registered for {stacks} stacks")]
    StationsMisaligned {
        /// Number of registered stations.
        stations: usize,
        /// Number of stacks in the world.
        stacks: usize,
    },
    /// Every station label is already in use.
    #[error("no unused station label is left")]
    StationLabelsExhausted,
    /// The conflict policy answered with the wrong number of resolutions.
    #[error("conflict policy returned {found} resolutions for {expected} candidates")]
    ResolutionMismatch {
        /// Number of candidates offered.
        expected: usize,
        /// Number of resolutions returned.
        found: usize,
    },
    /// The world rejected an action that passed every legality check.
    #[error("world rejected a checked action")]
    World(#[from] WorldError),
}
