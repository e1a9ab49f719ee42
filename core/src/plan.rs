//! Agent plans and the protocol that merges an agent's new intention into them.

use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};

use crate::Action;

/// Value an agent returns every cycle to describe how its plan changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanUpdate {
    /// Keeps the queued plan as-is.
    ContinuePlan,
    /// Clears the queued plan; the agent does nothing this cycle.
    CancelPlan,
    /// Replaces the queued plan outright.
    NewPlan {
        /// Actions of the replacement plan, in execution order.
        actions: Vec<Action>,
    },
    /// Trims the front of the queued plan and splices new actions before it.
    ModifyPlan {
        /// Actions inserted at the front of the plan.
        actions: Vec<Action>,
        /// Number of actions to drop from the front of the existing plan.
        remove: usize,
    },
}

impl fmt::Display for PlanUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContinuePlan => write!(f, "CONTINUE_PLAN"),
            Self::CancelPlan => write!(f, "CANCEL_PLAN"),
            Self::NewPlan { actions } => write!(f, "NEW_PLAN: {}", ActionList(actions)),
            Self::ModifyPlan { actions, remove } => {
                write!(f, "MODIFY_PLAN [remove {remove}]: {}", ActionList(actions))
            }
        }
    }
}

struct ActionList<'a>(&'a [Action]);

impl fmt::Display for ActionList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, action) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{action}")?;
        }
        write!(f, "]")
    }
}

/// Outcome of merging a [`PlanUpdate`] into a [`Plan`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Number of actions dropped from the front of the existing plan.
    pub removed: usize,
    /// Indicates that a modification asked to remove more than it was allowed to.
    pub clamped: bool,
}

/// Ordered queue of pending actions belonging to one agent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    actions: VecDeque<Action>,
}

impl Plan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a plan holding the provided actions in order.
    #[must_use]
    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            actions: actions.into_iter().collect(),
        }
    }

    /// Merges the agent's plan update into the queue.
    ///
    /// A fresh non-empty plan that does not start with
    /// [`Action::AgentCompleted`] is charged one [`Action::Planned`] cycle. A
    /// modification never trims the last remaining action of the existing plan.
    pub fn apply(&mut self, update: PlanUpdate) -> UpdateSummary {
        match update {
            PlanUpdate::ContinuePlan => UpdateSummary::default(),
            PlanUpdate::CancelPlan => {
                let removed = self.actions.len();
                self.actions.clear();
                UpdateSummary {
                    removed,
                    clamped: false,
                }
            }
            PlanUpdate::NewPlan { actions } => {
                let removed = self.actions.len();
                self.actions = actions.into();
                if self
                    .actions
                    .front()
                    .is_some_and(|first| *first != Action::AgentCompleted)
                {
                    self.actions.push_front(Action::Planned);
                }
                UpdateSummary {
                    removed,
                    clamped: false,
                }
            }
            PlanUpdate::ModifyPlan { actions, remove } => {
                let allowed = self.actions.len().saturating_sub(1);
                let removed = remove.min(allowed);
                let _ = self.actions.drain(..removed);
                if !actions.is_empty() {
                    self.actions.push_front(Action::Marker);
                    for action in actions.into_iter().rev() {
                        self.actions.push_front(action);
                    }
                }
                UpdateSummary {
                    removed,
                    clamped: remove > allowed,
                }
            }
        }
    }

    /// Discards any leading run of [`Action::Marker`] entries.
    pub fn strip_leading_markers(&mut self) -> usize {
        let mut stripped = 0;
        while self.actions.front() == Some(&Action::Marker) {
            let _ = self.actions.pop_front();
            stripped += 1;
        }
        stripped
    }

    /// Action at the front of the queue, or [`Action::Idle`] when empty.
    #[must_use]
    pub fn current_action(&self) -> Action {
        self.actions.front().copied().unwrap_or(Action::Idle)
    }

    /// Removes and returns the action at the front of the queue.
    pub fn consume_front(&mut self) -> Option<Action> {
        self.actions.pop_front()
    }

    /// Number of queued actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Reports whether no actions are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Iterator over the queued actions in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    /// Copies the queued actions into a vector.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Action> {
        self.actions.iter().copied().collect()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", ActionList(&self.to_vec()))
    }
}
