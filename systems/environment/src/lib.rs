#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Turn-based step engine binding a world to agents positioned at stations.
//!
//! Every cycle the optional [`Perturbation`] edits unobserved stacks, each
//! agent perceives and answers with a plan update, the [`ConflictPolicy`]
//! vets the chosen actions and the environment applies them to the world in
//! agent order. Legality failures are recorded on the agent; protocol defects
//! abort the run with a [`ProtocolError`].

use std::{collections::BTreeSet, fmt};

use blocks_world_core::{Action, AgentId, Event, StackId, StationLabel};
use blocks_world_world::{render, Annotations, World};
use tracing::{debug, info, warn};

mod agent;
mod error;
mod policy;
mod scripted;
mod stations;

pub use agent::{Agent, AgentData, Perception};
pub use error::ProtocolError;
pub use policy::{
    Candidate, ConflictPolicy, FirstComeFirstServed, PassThrough, Perturbation, Resolution,
};
pub use scripted::ScriptedAgent;
pub use stations::Stations;

const CELL_WIDTH: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Performed,
    Completed,
    Failed,
}

/// Authoritative simulation state and the per-cycle protocol over it.
pub struct Environment {
    world: World,
    stations: Stations,
    agents: Vec<AgentData>,
    perturbation: Option<Box<dyn Perturbation>>,
    conflict_policy: Box<dyn ConflictPolicy>,
    cycle: u64,
}

impl Environment {
    /// Creates an environment over the world, one station per stack.
    pub fn new(world: World) -> Result<Self, ProtocolError> {
        let stations = Stations::for_world(&world)?;
        Ok(Self {
            world,
            stations,
            agents: Vec::new(),
            perturbation: None,
            conflict_policy: Box::new(PassThrough),
            cycle: 0,
        })
    }

    /// Runs the perturbation once at the start of every cycle.
    #[must_use]
    pub fn with_perturbation(mut self, perturbation: Box<dyn Perturbation>) -> Self {
        self.perturbation = Some(perturbation);
        self
    }

    /// Replaces the default [`PassThrough`] conflict policy.
    #[must_use]
    pub fn with_conflict_policy(mut self, policy: Box<dyn ConflictPolicy>) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Adds an agent at the requested station, or at the first station when
    /// no placement is given or the requested one does not exist.
    pub fn add_agent(
        &mut self,
        agent: Box<dyn Agent>,
        desired: World,
        placement: Option<StationLabel>,
    ) -> AgentId {
        let station = match placement {
            Some(station) if self.stations.contains(station) => Some(station),
            Some(station) => {
                warn!(%station, agent = agent.name(), "requested station does not exist");
                self.stations.first(&self.world)
            }
            None => self.stations.first(&self.world),
        };
        let id = AgentId::new(u32::try_from(self.agents.len()).unwrap_or(u32::MAX));
        self.agents.push(AgentData::new(id, agent, desired, station));
        id
    }

    /// Current world state.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Station registry.
    #[must_use]
    pub const fn stations(&self) -> &Stations {
        &self.stations
    }

    /// Agents in join order.
    #[must_use]
    pub fn agents(&self) -> &[AgentData] {
        &self.agents
    }

    /// Looks up an agent by identifier.
    #[must_use]
    pub fn agent(&self, id: AgentId) -> Option<&AgentData> {
        self.agents.iter().find(|data| data.id == id)
    }

    /// Number of completed cycles.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Runs one cycle; returns `true` when every agent signalled completion.
    pub fn step(&mut self) -> Result<bool, ProtocolError> {
        let mut events = Vec::new();
        self.step_with_events(&mut events)
    }

    /// Runs one cycle, appending everything that happened to `out_events`.
    pub fn step_with_events(&mut self, out_events: &mut Vec<Event>) -> Result<bool, ProtocolError> {
        if let Some(perturbation) = self.perturbation.as_mut() {
            let observed = observed_stacks(&self.stations, &self.agents);
            perturbation.perturb(&mut self.world, &observed, out_events)?;
            self.stations.reconcile(&self.world, out_events)?;
        }
        self.stations.verify(&self.world)?;

        let mut candidates = Vec::with_capacity(self.agents.len());
        for index in 0..self.agents.len() {
            let perception = self.perceive(index)?;
            let data = &mut self.agents[index];
            let update = data.agent.respond(&perception);
            debug!(agent = data.agent.name(), %update, "plan update");
            out_events.push(Event::PlanUpdated {
                agent: data.id,
                update: update.clone(),
            });

            let summary = data.plan.apply(update);
            if summary.clamped {
                warn!(
                    agent = data.agent.name(),
                    removed = summary.removed,
                    "cannot remove every action of the existing plan"
                );
            }
            let _ = data.plan.strip_leading_markers();

            let action = data.plan.current_action();
            preflight(data, action)?;
            data.previous_action_succeeded = true;
            candidates.push(Candidate {
                agent: data.id,
                station: data.station,
                action,
            });
        }

        let resolutions = self.conflict_policy.resolve(&candidates);
        if resolutions.len() != candidates.len() {
            return Err(ProtocolError::ResolutionMismatch {
                expected: candidates.len(),
                found: resolutions.len(),
            });
        }

        let mut completed = 0;
        for (index, (candidate, resolution)) in candidates.iter().zip(resolutions).enumerate() {
            let (action, consumes) = match resolution {
                Resolution::Proceed => (candidate.action, true),
                Resolution::Replace(action) => {
                    preflight(&self.agents[index], action)?;
                    (action, false)
                }
                Resolution::Defer => {
                    self.agents[index].previous_action_succeeded = false;
                    out_events.push(Event::ActionDeferred {
                        agent: candidate.agent,
                        action: candidate.action,
                    });
                    continue;
                }
            };

            let outcome = self.execute(index, action, out_events)?;
            if outcome == Outcome::Completed {
                completed += 1;
            }
            if consumes && outcome != Outcome::Failed {
                let _ = self.agents[index].plan.consume_front();
            }
        }

        self.cycle += 1;
        let finished = completed == self.agents.len();
        if finished {
            info!(cycle = self.cycle, "all agents completed");
            out_events.push(Event::AllAgentsCompleted);
        }
        Ok(finished)
    }

    fn perceive(&self, index: usize) -> Result<Perception, ProtocolError> {
        let data = &self.agents[index];
        let visible_stack = match data.station {
            Some(station) => {
                let stack = self
                    .stations
                    .stack_of(station)
                    .ok_or(ProtocolError::UnknownStation { station })?;
                self.world.stack_by_id(stack).cloned()
            }
            None => None,
        };
        Ok(Perception {
            visible_stack,
            station: data.station,
            holding: data.holding,
            previous_action_succeeded: data.previous_action_succeeded,
            remaining_plan: data.plan.to_vec(),
        })
    }

    fn is_legal(&self, index: usize, action: Action) -> bool {
        let visible = self.agents[index]
            .station
            .and_then(|station| self.stations.stack_of(station))
            .and_then(|stack| self.world.stack_by_id(stack));
        match action {
            Action::PickUp { block } => visible.is_some_and(|stack| {
                stack.is_single() && stack.contains(block) && !stack.is_locked(block)
            }),
            Action::Unstack { block, from } => visible.is_some_and(|stack| {
                stack.contains(block)
                    && stack.is_clear(block)
                    && !stack.is_locked(block)
                    && stack.below(block) == Ok(Some(from))
            }),
            Action::Stack { onto, .. } => {
                visible.is_some_and(|stack| stack.contains(onto) && stack.is_clear(onto))
            }
            Action::Lock { block } => visible.is_some_and(|stack| {
                stack.contains(block)
                    && !stack.is_locked(block)
                    && match stack.below(block) {
                        Ok(None) => true,
                        Ok(Some(below)) => stack.is_locked(below),
                        Err(_) => false,
                    }
            }),
            Action::GoToStation { station } => self.stations.contains(station),
            Action::PutDown { .. }
            | Action::NextStation
            | Action::Idle
            | Action::Planned
            | Action::Marker
            | Action::AgentCompleted => true,
        }
    }

    fn execute(
        &mut self,
        index: usize,
        action: Action,
        out_events: &mut Vec<Event>,
    ) -> Result<Outcome, ProtocolError> {
        let agent = self.agents[index].id;
        if !self.is_legal(index, action) {
            debug!(agent = self.agents[index].name(), %action, "action failed");
            self.agents[index].previous_action_succeeded = false;
            out_events.push(Event::ActionFailed { agent, action });
            return Ok(Outcome::Failed);
        }

        let station = self.agents[index].station;
        let mut outcome = Outcome::Performed;
        match action {
            Action::PickUp { block } => {
                let next = station
                    .and_then(|current| self.stations.next_after(&self.world, current))
                    .filter(|next| Some(*next) != station);
                for other in 0..self.agents.len() {
                    if self.agents[other].station == station {
                        self.relocate(other, next, out_events);
                    }
                }
                self.agents[index].holding = Some(self.world.pick_up(block)?);
                self.stations.reconcile(&self.world, out_events)?;
            }
            Action::PutDown { block } => {
                let before = station.and_then(|current| self.stations.stack_of(current));
                let created = self.world.put_down(block, before)?;
                self.agents[index].holding = None;
                self.stations.reconcile(&self.world, out_events)?;
                let arrived = self.stations.label_of(created);
                self.relocate(index, arrived, out_events);
            }
            Action::Unstack { block, from } => {
                self.agents[index].holding = Some(self.world.unstack(block, from)?);
            }
            Action::Stack { block, onto } => {
                self.world.stack(block, onto)?;
                self.agents[index].holding = None;
            }
            Action::Lock { block } => self.world.lock(block)?,
            Action::GoToStation { station: target } => {
                self.relocate(index, Some(target), out_events);
            }
            Action::NextStation => {
                let target = match station {
                    Some(current) => self.stations.next_after(&self.world, current),
                    None => self.stations.first(&self.world),
                };
                self.relocate(index, target, out_events);
            }
            Action::AgentCompleted => outcome = Outcome::Completed,
            Action::Idle | Action::Planned | Action::Marker => {}
        }

        debug!(agent = self.agents[index].name(), %action, "action performed");
        out_events.push(Event::ActionPerformed { agent, action });
        Ok(outcome)
    }

    fn relocate(&mut self, index: usize, to: Option<StationLabel>, out_events: &mut Vec<Event>) {
        let data = &mut self.agents[index];
        if data.station == to {
            return;
        }
        out_events.push(Event::AgentRelocated {
            agent: data.id,
            from: data.station,
            to,
        });
        data.station = to;
    }
}

fn preflight(data: &AgentData, action: Action) -> Result<(), ProtocolError> {
    if let Some(required) = action.required_holding() {
        if data.holding != Some(required) {
            return Err(ProtocolError::HoldingMismatch {
                agent: data.id,
                action,
                holding: data.holding,
            });
        }
    }
    if action.requires_empty_arm() {
        if let Some(holding) = data.holding {
            return Err(ProtocolError::AlreadyHolding {
                agent: data.id,
                action,
                holding,
            });
        }
    }
    Ok(())
}

fn observed_stacks(stations: &Stations, agents: &[AgentData]) -> BTreeSet<StackId> {
    agents
        .iter()
        .filter_map(|data| data.station)
        .filter_map(|station| stations.stack_of(station))
        .collect()
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("world", &self.world)
            .field("stations", &self.stations)
            .field("agents", &self.agents)
            .field("perturbation", &self.perturbation)
            .field("conflict_policy", &self.conflict_policy)
            .field("cycle", &self.cycle)
            .finish()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut annotations = Annotations::default();
        for data in &self.agents {
            let Some(stack) = data.station.and_then(|station| self.stations.stack_of(station))
            else {
                continue;
            };
            let held = data.holding.map(|block| block.to_string()).unwrap_or_default();
            let lines = annotations.above.entry(stack).or_default();
            lines.push(format!(" {}", data.name()));
            lines.push(format!(" <{held}>"));
        }
        for stack in self.world.stacks() {
            if let Some(station) = self.stations.label_of(stack.id()) {
                let _ = annotations
                    .below
                    .insert(stack.id(), vec!["=".repeat(CELL_WIDTH - 1), format!(" {station}")]);
            }
        }

        f.write_str(&render(&self.world, CELL_WIDTH, &annotations, false))?;
        for data in &self.agents {
            writeln!(f, "{data}")?;
        }
        if let Some(description) = self.perturbation.as_ref().and_then(|p| p.describe()) {
            writeln!(f, "{description}")?;
        }
        Ok(())
    }
}
