// src/domain/blocksworld.rs

use crate::domain::extract::{ActionTokens, ExtractError};
use crate::domain::ingest::{Field, IngestError, Params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const VOCABULARY: &[&str] = &["pick-up", "put-down", "stack", "unstack"];

const BLOCK_KEYS: &[&str] = &["block", "object", "obj", "x"];
const TARGET_KEYS: &[&str] = &["target", "y", "to", "on"];

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum BlocksAction {
    PickUp { block: String },
    PutDown { block: String },
    Stack { block: String, target: String },
    Unstack { block: String, target: String },
}

/// A relation that can be true or false in a `WorldState`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Fact {
    OnTable(String),
    Clear(String),
    On(String, String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    Holds(Fact),
    HandEmpty,
    Holding(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Assert(Fact),
    Retract(Fact),
    Grasp(String),
    Release,
}

impl BlocksAction {
    pub fn name(&self) -> &'static str {
        match self {
            BlocksAction::PickUp { .. } => "pick-up",
            BlocksAction::PutDown { .. } => "put-down",
            BlocksAction::Stack { .. } => "stack",
            BlocksAction::Unstack { .. } => "unstack",
        }
    }

    pub fn block(&self) -> &str {
        match self {
            BlocksAction::PickUp { block }
            | BlocksAction::PutDown { block }
            | BlocksAction::Stack { block, .. }
            | BlocksAction::Unstack { block, .. } => block,
        }
    }

    pub(crate) fn from_params(kind: &str, params: &Params<'_>) -> Result<Self, IngestError> {
        const BLOCK: Field = ("block", BLOCK_KEYS);
        const TARGET: Field = ("target", TARGET_KEYS);
        Ok(match kind {
            "pick-up" => {
                let [block] = params.resolve("pick-up", [BLOCK])?;
                BlocksAction::PickUp { block }
            }
            "put-down" => {
                let [block] = params.resolve("put-down", [BLOCK])?;
                BlocksAction::PutDown { block }
            }
            "stack" => {
                let [block, target] = params.resolve("stack", [BLOCK, TARGET])?;
                BlocksAction::Stack { block, target }
            }
            "unstack" => {
                let [block, target] = params.resolve("unstack", [BLOCK, TARGET])?;
                BlocksAction::Unstack { block, target }
            }
            other => return Err(IngestError::UnknownActionType(other.to_string())),
        })
    }

    pub(crate) fn from_tokens(tokens: &ActionTokens, line: &str) -> Result<Self, ExtractError> {
        let (action, arity) = match tokens.name.as_str() {
            "pick-up" => ("pick-up", 1),
            "put-down" => ("put-down", 1),
            "stack" => ("stack", 2),
            "unstack" => ("unstack", 2),
            _ => return Err(ExtractError::UnknownAction(line.trim().to_string())),
        };
        let args = tokens.expect_arity(action, arity, line)?;
        Ok(match (action, args) {
            ("pick-up", [block]) => BlocksAction::PickUp { block: block.clone() },
            ("put-down", [block]) => BlocksAction::PutDown { block: block.clone() },
            ("stack", [block, target]) => BlocksAction::Stack {
                block: block.clone(),
                target: target.clone(),
            },
            (_, [block, target]) => BlocksAction::Unstack {
                block: block.clone(),
                target: target.clone(),
            },
            _ => return Err(ExtractError::UnknownAction(line.trim().to_string())),
        })
    }

    pub fn preconditions(&self) -> Vec<Precondition> {
        use Precondition::*;
        match self {
            BlocksAction::PickUp { block } => vec![
                Holds(Fact::Clear(block.clone())),
                HandEmpty,
                Holds(Fact::OnTable(block.clone())),
            ],
            BlocksAction::PutDown { block } => vec![Holding(block.clone())],
            BlocksAction::Stack { block, target } => vec![
                Holding(block.clone()),
                Holds(Fact::Clear(target.clone())),
            ],
            BlocksAction::Unstack { block, target } => vec![
                Holds(Fact::Clear(block.clone())),
                HandEmpty,
                Holds(Fact::On(block.clone(), target.clone())),
            ],
        }
    }

    pub fn effects(&self) -> Vec<Effect> {
        use Effect::*;
        match self {
            BlocksAction::PickUp { block } => vec![
                Retract(Fact::OnTable(block.clone())),
                Retract(Fact::Clear(block.clone())),
                Grasp(block.clone()),
            ],
            BlocksAction::PutDown { block } => vec![
                Assert(Fact::OnTable(block.clone())),
                Assert(Fact::Clear(block.clone())),
                Release,
            ],
            BlocksAction::Stack { block, target } => vec![
                Assert(Fact::On(block.clone(), target.clone())),
                Assert(Fact::Clear(block.clone())),
                Retract(Fact::Clear(target.clone())),
                Release,
            ],
            BlocksAction::Unstack { block, target } => vec![
                Retract(Fact::On(block.clone(), target.clone())),
                Assert(Fact::Clear(target.clone())),
                Retract(Fact::Clear(block.clone())),
                Grasp(block.clone()),
            ],
        }
    }

    /// Human-readable reason `precondition` fails for this action in `state`.
    pub fn describe_violation(&self, precondition: &Precondition, state: &WorldState) -> String {
        let name = self.name();
        let block = self.block();
        let held = state.holding.as_deref().unwrap_or("nothing");
        match precondition {
            Precondition::Holds(Fact::Clear(b)) if b == block => {
                format!("cannot {name} {block}: block not clear (something on top)")
            }
            Precondition::Holds(Fact::Clear(b)) => {
                format!("cannot {name} {block} on {b}: {b} not clear")
            }
            Precondition::Holds(Fact::OnTable(b)) => format!("cannot {name} {b}: not on table"),
            Precondition::Holds(Fact::On(a, b)) => format!("cannot {name} {a}: not on {b}"),
            Precondition::HandEmpty => {
                format!("cannot {name} {block}: hand already holding {held}")
            }
            Precondition::Holding(b) => {
                format!("cannot {name} {b}: not holding it (holding {held})")
            }
        }
    }
}

impl fmt::Display for BlocksAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlocksAction::PickUp { block } | BlocksAction::PutDown { block } => {
                write!(f, "({} {})", self.name(), block)
            }
            BlocksAction::Stack { block, target } | BlocksAction::Unstack { block, target } => {
                write!(f, "({} {} {})", self.name(), block, target)
            }
        }
    }
}

/// Blocks-world state: which blocks sit on the table, which are clear,
/// which rest on which, and what the hand holds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    #[serde(default)]
    pub on_table: BTreeSet<String>,
    #[serde(default)]
    pub clear: BTreeSet<String>,
    #[serde(default)]
    pub on: BTreeSet<(String, String)>,
    #[serde(default)]
    pub holding: Option<String>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_table(mut self, block: &str) -> Self {
        self.on_table.insert(block.to_string());
        self
    }

    pub fn with_clear(mut self, block: &str) -> Self {
        self.clear.insert(block.to_string());
        self
    }

    pub fn with_on(mut self, block: &str, below: &str) -> Self {
        self.on.insert((block.to_string(), below.to_string()));
        self
    }

    pub fn with_holding(mut self, block: &str) -> Self {
        self.holding = Some(block.to_string());
        self
    }

    pub fn holds(&self, fact: &Fact) -> bool {
        match fact {
            Fact::OnTable(b) => self.on_table.contains(b),
            Fact::Clear(b) => self.clear.contains(b),
            Fact::On(a, b) => self.on.contains(&(a.clone(), b.clone())),
        }
    }

    pub fn satisfies(&self, precondition: &Precondition) -> bool {
        match precondition {
            Precondition::Holds(fact) => self.holds(fact),
            Precondition::HandEmpty => self.holding.is_none(),
            Precondition::Holding(b) => self.holding.as_deref() == Some(b.as_str()),
        }
    }

    /// Defined for every state: asserting a present fact or retracting an
    /// absent one is a no-op.
    pub fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::Assert(Fact::OnTable(b)) => {
                self.on_table.insert(b.clone());
            }
            Effect::Assert(Fact::Clear(b)) => {
                self.clear.insert(b.clone());
            }
            Effect::Assert(Fact::On(a, b)) => {
                self.on.insert((a.clone(), b.clone()));
            }
            Effect::Retract(Fact::OnTable(b)) => {
                self.on_table.remove(b);
            }
            Effect::Retract(Fact::Clear(b)) => {
                self.clear.remove(b);
            }
            Effect::Retract(Fact::On(a, b)) => {
                self.on.remove(&(a.clone(), b.clone()));
            }
            Effect::Grasp(b) => self.holding = Some(b.clone()),
            Effect::Release => self.holding = None,
        }
    }

    pub fn apply_action(&mut self, action: &BlocksAction) {
        for effect in action.effects() {
            self.apply(&effect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_plan_lines() {
        let stack = BlocksAction::Stack {
            block: "a".into(),
            target: "b".into(),
        };
        assert_eq!(stack.to_string(), "(stack a b)");
        assert_eq!(
            BlocksAction::PickUp { block: "c".into() }.to_string(),
            "(pick-up c)"
        );
    }

    #[test]
    fn unstack_then_put_down_restores_table() {
        let mut state = WorldState::new()
            .with_on_table("b")
            .with_on("a", "b")
            .with_clear("a");
        let unstack = BlocksAction::Unstack {
            block: "a".into(),
            target: "b".into(),
        };
        assert!(unstack
            .preconditions()
            .iter()
            .all(|p| state.satisfies(p)));

        state.apply_action(&unstack);
        assert_eq!(state.holding.as_deref(), Some("a"));
        assert!(state.clear.contains("b"));
        assert!(state.on.is_empty());

        state.apply_action(&BlocksAction::PutDown { block: "a".into() });
        assert!(state.holding.is_none());
        assert!(state.on_table.contains("a"));
        assert!(state.clear.contains("a"));
    }

    #[test]
    fn effects_are_total_on_inconsistent_state() {
        let mut state = WorldState::new();
        state.apply_action(&BlocksAction::PickUp { block: "x".into() });
        assert_eq!(state.holding.as_deref(), Some("x"));
        assert!(state.on_table.is_empty());
    }

    #[test]
    fn violation_messages_name_the_problem() {
        let state = WorldState::new().with_holding("c");
        let pick = BlocksAction::PickUp { block: "a".into() };
        let messages: Vec<String> = pick
            .preconditions()
            .iter()
            .filter(|p| !state.satisfies(p))
            .map(|p| pick.describe_violation(p, &state))
            .collect();
        assert_eq!(
            messages,
            vec![
                "cannot pick-up a: block not clear (something on top)",
                "cannot pick-up a: hand already holding c",
                "cannot pick-up a: not on table",
            ]
        );
    }
}
