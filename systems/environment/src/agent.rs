//! Agent contract and the per-agent state owned by the environment.

use std::fmt;

use blocks_world_core::{Action, AgentId, Block, Plan, PlanUpdate, Predicate, StationLabel};
use blocks_world_world::{Stack, World};

/// Decision maker driven by the environment once per cycle.
pub trait Agent {
    /// Display name used in renderings and logs.
    fn name(&self) -> &str;

    /// Answers the agent's current perception with a plan update.
    fn respond(&mut self, perception: &Perception) -> PlanUpdate;

    /// Free-form diagnostics about the agent's internal state.
    fn status(&self) -> String {
        String::new()
    }
}

/// Read-only snapshot handed to an agent before it decides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Perception {
    /// Copy of the stack observed from the agent's station.
    pub visible_stack: Option<Stack>,
    /// Station the agent occupies.
    pub station: Option<StationLabel>,
    /// Block the agent holds.
    pub holding: Option<Block>,
    /// Whether the action attempted last cycle succeeded.
    pub previous_action_succeeded: bool,
    /// Actions still queued, in execution order.
    pub remaining_plan: Vec<Action>,
}

impl Perception {
    /// Facts the agent can observe: the visible stack and its own arm.
    #[must_use]
    pub fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = self
            .visible_stack
            .as_ref()
            .map(Stack::predicates)
            .unwrap_or_default();
        predicates.push(match self.holding {
            Some(block) => Predicate::Hold { block },
            None => Predicate::ArmEmpty,
        });
        predicates
    }
}

/// Run state of one agent. Only the environment mutates it.
pub struct AgentData {
    pub(crate) id: AgentId,
    pub(crate) agent: Box<dyn Agent>,
    pub(crate) holding: Option<Block>,
    pub(crate) station: Option<StationLabel>,
    pub(crate) plan: Plan,
    pub(crate) desired: World,
    pub(crate) previous_action_succeeded: bool,
}

impl AgentData {
    pub(crate) fn new(
        id: AgentId,
        agent: Box<dyn Agent>,
        desired: World,
        station: Option<StationLabel>,
    ) -> Self {
        Self {
            id,
            agent,
            holding: None,
            station,
            plan: Plan::new(),
            desired,
            previous_action_succeeded: true,
        }
    }

    /// Identifier assigned when the agent joined.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Display name of the agent.
    #[must_use]
    pub fn name(&self) -> &str {
        self.agent.name()
    }

    /// Block the agent holds.
    #[must_use]
    pub const fn holding(&self) -> Option<Block> {
        self.holding
    }

    /// Station the agent occupies; `None` once the world has no stacks left to observe.
    #[must_use]
    pub const fn station(&self) -> Option<StationLabel> {
        self.station
    }

    /// Queued plan.
    #[must_use]
    pub const fn plan(&self) -> &Plan {
        &self.plan
    }

    /// World state the agent is trying to reach.
    #[must_use]
    pub const fn desired_state(&self) -> &World {
        &self.desired
    }

    /// Whether the last attempted action succeeded.
    #[must_use]
    pub const fn previous_action_succeeded(&self) -> bool {
        self.previous_action_succeeded
    }

    /// Diagnostics reported by the agent.
    #[must_use]
    pub fn status(&self) -> String {
        self.agent.status()
    }
}

impl fmt::Debug for AgentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentData")
            .field("id", &self.id)
            .field("name", &self.agent.name())
            .field("holding", &self.holding)
            .field("station", &self.station)
            .field("plan", &self.plan)
            .field("previous_action_succeeded", &self.previous_action_succeeded)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for AgentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent {} at ", self.name())?;
        match self.station {
            Some(station) => write!(f, "{station}")?,
            None => write!(f, "no station")?,
        }
        write!(f, " holds: ")?;
        match self.holding {
            Some(block) => write!(f, "{block}")?,
            None => write!(f, "nothing")?,
        }
        let outcome = if self.previous_action_succeeded {
            "OK"
        } else {
            "failed"
        };
        write!(
            f,
            "; prev action: {outcome}; plan ({}): {}",
            self.plan.len(),
            self.plan
        )?;
        let status = self.status();
        if !status.is_empty() {
            write!(f, "; {status}")?;
        }
        Ok(())
    }
}
