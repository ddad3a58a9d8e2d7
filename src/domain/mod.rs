// src/domain/mod.rs

pub mod blocksworld;
pub mod extract;
pub mod ingest;
pub mod logistics;

use crate::model::Plan;
use crate::protocol::{Diagnostic, Layer};
use crate::validation::topological_order;
use blocksworld::BlocksAction;
use extract::{ActionTokens, ExtractError};
use logistics::LogisticsAction;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selects the action vocabulary a plan is read against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainTag {
    #[default]
    Blocksworld,
    Logistics,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown domain `{0}` (expected blocksworld or logistics)")]
pub struct UnknownDomain(pub String);

impl DomainTag {
    pub fn vocabulary(self) -> &'static [&'static str] {
        match self {
            DomainTag::Blocksworld => blocksworld::VOCABULARY,
            DomainTag::Logistics => logistics::VOCABULARY,
        }
    }

    pub fn recognizes(self, action_type: &str) -> bool {
        let normalized = ingest::normalize_action_type(action_type);
        self.vocabulary().contains(&normalized.as_str())
    }

    /// Whether the precondition simulator can replay this domain.
    pub fn has_state_model(self) -> bool {
        matches!(self, DomainTag::Blocksworld)
    }
}

impl FromStr for DomainTag {
    type Err = UnknownDomain;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "blocksworld" | "blocks" | "blocks-world" => Ok(DomainTag::Blocksworld),
            "logistics" => Ok(DomainTag::Logistics),
            _ => Err(UnknownDomain(raw.to_string())),
        }
    }
}

impl fmt::Display for DomainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainTag::Blocksworld => write!(f, "blocksworld"),
            DomainTag::Logistics => write!(f, "logistics"),
        }
    }
}

/// A typed, fully normalized action of either domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    Blocks(BlocksAction),
    Logistics(LogisticsAction),
}

impl Action {
    pub(crate) fn from_tokens(
        domain: DomainTag,
        tokens: &ActionTokens,
        line: &str,
    ) -> Result<Self, ExtractError> {
        match domain {
            DomainTag::Blocksworld => BlocksAction::from_tokens(tokens, line).map(Action::Blocks),
            DomainTag::Logistics => {
                LogisticsAction::from_tokens(tokens, line).map(Action::Logistics)
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Blocks(action) => fmt::Display::fmt(action, f),
            Action::Logistics(action) => fmt::Display::fmt(action, f),
        }
    }
}

/// Plan-artifact lines for a plan, plus a schema diagnostic for every node
/// that could not be turned into an action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionSequence {
    pub lines: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ActionSequence {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Renders a plan's action nodes in dependency order. Anchors and virtual
/// nodes are skipped; a cyclic plan falls back to node order.
pub fn plan_actions(plan: &Plan, domain: DomainTag) -> ActionSequence {
    let order = topological_order(plan);
    let ordered: Vec<&str> = if order.is_empty() {
        plan.node_ids()
    } else {
        order.iter().map(String::as_str).collect()
    };

    let mut sequence = ActionSequence::default();
    for id in ordered {
        let Some(node) = plan.node(id) else {
            continue;
        };
        if node.is_virtual() {
            continue;
        }
        match ingest::action_from_node(domain, node) {
            Ok(action) => sequence.lines.push(action.to_string()),
            Err(error) => sequence
                .diagnostics
                .push(Diagnostic::new(Layer::Schema, format!("node `{}`: {error}", node.id))),
        }
    }
    sequence
}
