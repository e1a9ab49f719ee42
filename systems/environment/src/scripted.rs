//! Built-in agent that replays a fixed list of actions.

use blocks_world_core::{Action, PlanUpdate};

use crate::{Agent, Perception};

/// Agent that installs a fixed script once and then follows it.
///
/// The script is terminated with [`Action::AgentCompleted`]. Whenever the
/// queue runs dry afterwards, for instance after the plan was cancelled, the
/// agent signals completion again.
#[derive(Clone, Debug)]
pub struct ScriptedAgent {
    name: String,
    script: Vec<Action>,
    issued: bool,
}

impl ScriptedAgent {
    /// Creates an agent replaying the provided actions.
    #[must_use]
    pub fn new(name: impl Into<String>, script: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            script,
            issued: false,
        }
    }

    /// Actions of the script, without the completion marker.
    #[must_use]
    pub fn script(&self) -> &[Action] {
        &self.script
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn respond(&mut self, perception: &Perception) -> PlanUpdate {
        if !self.issued {
            self.issued = true;
            let mut actions = self.script.clone();
            actions.push(Action::AgentCompleted);
            return PlanUpdate::NewPlan { actions };
        }
        if perception.remaining_plan.is_empty() {
            return PlanUpdate::NewPlan {
                actions: vec![Action::AgentCompleted],
            };
        }
        PlanUpdate::ContinuePlan
    }

    fn status(&self) -> String {
        format!("scripted, {} action(s)", self.script.len())
    }
}
