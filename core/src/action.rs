//! Atomic actions an agent may request from the environment.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Block, StationLabel};

/// Operations that express every mutation or movement an agent can request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Lifts a block that sits alone on the table.
    PickUp {
        /// Block to lift.
        block: Block,
    },
    /// Places the held block on the table, creating a new stack.
    PutDown {
        /// Block currently held by the agent.
        block: Block,
    },
    /// Lifts the topmost block of a stack off the block beneath it.
    Unstack {
        /// Block to lift.
        block: Block,
        /// Block the lifted block currently rests on.
        from: Block,
    },
    /// Places the held block on top of a clear block.
    Stack {
        /// Block currently held by the agent.
        block: Block,
        /// Block that receives the held block.
        onto: Block,
    },
    /// Permanently fixes a block in place.
    Lock {
        /// Block to lock.
        block: Block,
    },
    /// Moves the agent to the named station.
    GoToStation {
        /// Destination station.
        station: StationLabel,
    },
    /// Moves the agent to the next station in cyclic order.
    NextStation,
    /// Does nothing this cycle.
    Idle,
    /// Does nothing; charged right after a fresh plan is installed.
    Planned,
    /// Zero-cost separator inserted when a plan is spliced.
    Marker,
    /// Signals that the agent will not act any more.
    AgentCompleted,
}

impl Action {
    /// Reports whether the action only moves the agent between stations.
    #[must_use]
    pub const fn is_station_move(&self) -> bool {
        matches!(self, Self::GoToStation { .. } | Self::NextStation)
    }

    /// Blocks referenced by the action, in argument order.
    #[must_use]
    pub fn block_arguments(&self) -> Vec<Block> {
        match *self {
            Self::PickUp { block } | Self::PutDown { block } | Self::Lock { block } => vec![block],
            Self::Unstack { block, from } => vec![block, from],
            Self::Stack { block, onto } => vec![block, onto],
            Self::GoToStation { .. }
            | Self::NextStation
            | Self::Idle
            | Self::Planned
            | Self::Marker
            | Self::AgentCompleted => Vec::new(),
        }
    }

    /// Reports whether two actions touch a common block.
    ///
    /// Station moves never conflict with anything.
    #[must_use]
    pub fn is_conflicting(&self, other: &Action) -> bool {
        if self.is_station_move() || other.is_station_move() {
            return false;
        }
        let ours = self.block_arguments();
        other
            .block_arguments()
            .iter()
            .any(|block| ours.contains(block))
    }

    /// Block the agent must be holding for the action to be well formed.
    #[must_use]
    pub const fn required_holding(&self) -> Option<Block> {
        match *self {
            Self::PutDown { block } | Self::Stack { block, .. } => Some(block),
            _ => None,
        }
    }

    /// Reports whether the action needs the agent's arm to be empty.
    #[must_use]
    pub const fn requires_empty_arm(&self) -> bool {
        matches!(self, Self::PickUp { .. } | Self::Unstack { .. })
    }

    fn keyword(&self) -> &'static str {
        match self {
            Self::PickUp { .. } => "PICKUP",
            Self::PutDown { .. } => "PUTDOWN",
            Self::Unstack { .. } => "UNSTACK",
            Self::Stack { .. } => "STACK",
            Self::Lock { .. } => "LOCK",
            Self::GoToStation { .. } => "GO_TO_STATION",
            Self::NextStation => "NEXT_STATION",
            Self::Idle => "NONE",
            Self::Planned => "PLANNED",
            Self::Marker => "MARKER",
            Self::AgentCompleted => "AGENT_COMPLETED",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GoToStation { station } => write!(f, "{}({station})", self.keyword()),
            _ => {
                let arguments: Vec<String> = self
                    .block_arguments()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                write!(f, "{}({})", self.keyword(), arguments.join(","))
            }
        }
    }
}

/// Reasons a textual action could not be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseActionError {
    /// The line contained no tokens.
    #[error("action text is empty")]
    Empty,
    /// The leading keyword does not name an action.
    #[error("unknown action '{0}'")]
    UnknownKeyword(String),
    /// The keyword names an action only the environment may insert.
    #[error("action '{0}' is reserved for the environment")]
    Reserved(String),
    /// The number of arguments does not match the action's arity.
    #[error("action '{keyword}' takes {expected} argument(s), found {found}")]
    Arity {
        /// Keyword that was parsed.
        keyword: String,
        /// Arity of the action.
        expected: usize,
        /// Number of arguments supplied.
        found: usize,
    },
    /// An argument was not a single character label.
    #[error("argument '{0}' is not a single-character label")]
    InvalidLabel(String),
}

impl FromStr for Action {
    type Err = ParseActionError;

    /// Parses `UNSTACK A B`, `UNSTACK(A,B)` and similar forms.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut tokens = text
            .split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ','))
            .filter(|token| !token.is_empty());
        let keyword = tokens.next().ok_or(ParseActionError::Empty)?.to_ascii_uppercase();
        let arguments: Vec<&str> = tokens.collect();

        let expect = |expected: usize| -> Result<(), ParseActionError> {
            if arguments.len() == expected {
                Ok(())
            } else {
                Err(ParseActionError::Arity {
                    keyword: keyword.clone(),
                    expected,
                    found: arguments.len(),
                })
            }
        };
        let label = |index: usize| -> Result<char, ParseActionError> {
            let token = arguments[index];
            let token = token.strip_prefix('#').filter(|rest| !rest.is_empty()).unwrap_or(token);
            let mut chars = token.chars();
            match (chars.next(), chars.next()) {
                (Some(label), None) => Ok(label),
                _ => Err(ParseActionError::InvalidLabel(arguments[index].to_owned())),
            }
        };
        let block = |index: usize| label(index).map(Block::new);

        match keyword.as_str() {
            "PICKUP" => {
                expect(1)?;
                Ok(Self::PickUp { block: block(0)? })
            }
            "PUTDOWN" => {
                expect(1)?;
                Ok(Self::PutDown { block: block(0)? })
            }
            "UNSTACK" => {
                expect(2)?;
                Ok(Self::Unstack {
                    block: block(0)?,
                    from: block(1)?,
                })
            }
            "STACK" => {
                expect(2)?;
                Ok(Self::Stack {
                    block: block(0)?,
                    onto: block(1)?,
                })
            }
            "LOCK" => {
                expect(1)?;
                Ok(Self::Lock { block: block(0)? })
            }
            "GO_TO_STATION" => {
                expect(1)?;
                Ok(Self::GoToStation {
                    station: StationLabel::new(label(0)?),
                })
            }
            "NEXT_STATION" => {
                expect(0)?;
                Ok(Self::NextStation)
            }
            "NONE" => {
                expect(0)?;
                Ok(Self::Idle)
            }
            "AGENT_COMPLETED" => {
                expect(0)?;
                Ok(Self::AgentCompleted)
            }
            "PLANNED" | "MARKER" => Err(ParseActionError::Reserved(keyword)),
            _ => Err(ParseActionError::UnknownKeyword(keyword)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(label: char) -> Block {
        Block::new(label)
    }

    #[test]
    fn display_uses_keyword_and_arguments() {
        let unstack = Action::Unstack {
            block: block('A'),
            from: block('B'),
        };
        assert_eq!(unstack.to_string(), "UNSTACK(A,B)");
        assert_eq!(Action::Idle.to_string(), "NONE()");
        assert_eq!(
            Action::GoToStation {
                station: StationLabel::new('2')
            }
            .to_string(),
            "GO_TO_STATION(#2)"
        );
    }

    #[test]
    fn parses_script_and_display_forms() {
        let expected = Action::Stack {
            block: block('B'),
            onto: block('C'),
        };
        assert_eq!("STACK B C".parse::<Action>(), Ok(expected));
        assert_eq!("stack(B,C)".parse::<Action>(), Ok(expected));
        assert_eq!(
            "GO_TO_STATION #1".parse::<Action>(),
            Ok(Action::GoToStation {
                station: StationLabel::new('1')
            })
        );
        assert_eq!("NEXT_STATION".parse::<Action>(), Ok(Action::NextStation));
    }

    #[test]
    fn parse_rejects_wrong_arity_and_reserved_kinds() {
        assert!(matches!(
            "PICKUP A B".parse::<Action>(),
            Err(ParseActionError::Arity { expected: 1, found: 2, .. })
        ));
        assert!(matches!(
            "MARKER".parse::<Action>(),
            Err(ParseActionError::Reserved(_))
        ));
        assert!(matches!(
            "PICKUP AB".parse::<Action>(),
            Err(ParseActionError::InvalidLabel(_))
        ));
        assert_eq!("   ".parse::<Action>(), Err(ParseActionError::Empty));
    }

    #[test]
    fn conflicting_is_symmetric() {
        let actions = [
            Action::PickUp { block: block('A') },
            Action::PutDown { block: block('B') },
            Action::Unstack {
                block: block('A'),
                from: block('B'),
            },
            Action::Stack {
                block: block('C'),
                onto: block('A'),
            },
            Action::Lock { block: block('C') },
            Action::GoToStation {
                station: StationLabel::new('A'),
            },
            Action::NextStation,
            Action::Idle,
            Action::AgentCompleted,
        ];

        for first in &actions {
            for second in &actions {
                assert_eq!(
                    first.is_conflicting(second),
                    second.is_conflicting(first),
                    "{first} vs {second}"
                );
            }
        }
    }

    #[test]
    fn conflicts_require_shared_block() {
        let unstack = Action::Unstack {
            block: block('A'),
            from: block('B'),
        };
        assert!(unstack.is_conflicting(&Action::PickUp { block: block('B') }));
        assert!(!unstack.is_conflicting(&Action::PickUp { block: block('C') }));
        assert!(!unstack.is_conflicting(&Action::NextStation));
    }

    #[test]
    fn holding_requirements_follow_kind() {
        assert_eq!(
            Action::Stack {
                block: block('A'),
                onto: block('B')
            }
            .required_holding(),
            Some(block('A'))
        );
        assert!(Action::Unstack {
            block: block('A'),
            from: block('B')
        }
        .requires_empty_arm());
        assert!(!Action::Lock { block: block('A') }.requires_empty_arm());
    }
}
