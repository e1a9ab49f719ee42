//! Pluggable strategies the step engine consults every cycle.

use std::{collections::BTreeSet, fmt};

use blocks_world_core::{Action, AgentId, Event, StackId, StationLabel};
use blocks_world_world::{World, WorldError};

/// Action an agent chose this cycle, offered to the conflict policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    /// Agent that chose the action.
    pub agent: AgentId,
    /// Station the agent occupies.
    pub station: Option<StationLabel>,
    /// Chosen action.
    pub action: Action,
}

/// Verdict of the conflict policy for one candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Execute the candidate action unchanged.
    Proceed,
    /// Execute a substitute action; the queued action stays at the front of the plan.
    Replace(Action),
    /// Skip the agent this cycle and report its action as not performed.
    Defer,
}

/// Resolves multi-agent conflicts before any action touches the world.
pub trait ConflictPolicy: fmt::Debug {
    /// Returns exactly one resolution per candidate, in candidate order.
    fn resolve(&mut self, candidates: &[Candidate]) -> Vec<Resolution>;
}

/// Lets every action through; conflicts are settled by execution order.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassThrough;

impl ConflictPolicy for PassThrough {
    fn resolve(&mut self, candidates: &[Candidate]) -> Vec<Resolution> {
        vec![Resolution::Proceed; candidates.len()]
    }
}

/// Defers any action that conflicts with an action admitted earlier in the same cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstComeFirstServed;

impl ConflictPolicy for FirstComeFirstServed {
    fn resolve(&mut self, candidates: &[Candidate]) -> Vec<Resolution> {
        let mut admitted: Vec<Action> = Vec::with_capacity(candidates.len());
        candidates
            .iter()
            .map(|candidate| {
                if admitted
                    .iter()
                    .any(|earlier| earlier.is_conflicting(&candidate.action))
                {
                    Resolution::Defer
                } else {
                    admitted.push(candidate.action);
                    Resolution::Proceed
                }
            })
            .collect()
    }
}

/// Stochastic editor of the parts of the world nobody observes.
///
/// It runs once per cycle before any agent perceives; the environment
/// realigns its stations afterwards.
pub trait Perturbation: fmt::Debug {
    /// Applies at most one edit to stacks outside `observed`.
    fn perturb(
        &mut self,
        world: &mut World,
        observed: &BTreeSet<StackId>,
        out_events: &mut Vec<Event>,
    ) -> Result<(), WorldError>;

    /// Extra state to show in the environment rendering.
    fn describe(&self) -> Option<String> {
        None
    }
}
