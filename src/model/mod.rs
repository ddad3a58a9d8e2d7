// src/model/mod.rs

use crate::error::PlanLoadError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved id of the virtual node every root is attached to after repair.
pub const START_ANCHOR: &str = "__START__";
/// Reserved id of the virtual node every terminal is attached to after repair.
pub const END_ANCHOR: &str = "__END__";
/// Action type carried by anchor nodes.
pub const VIRTUAL_ACTION: &str = "Virtual";
pub const DEFAULT_RELATIONSHIP: &str = "depends_on";

pub fn is_anchor(id: &str) -> bool {
    id == START_ANCHOR || id == END_ANCHOR
}

/// An atomic action in a plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionNode {
    pub id: String,
    pub action_type: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub description: String,
}

impl ActionNode {
    pub fn new(id: &str, action_type: &str) -> Self {
        Self {
            id: id.to_string(),
            action_type: action_type.to_string(),
            params: Map::new(),
            description: String::new(),
        }
    }

    pub fn anchor(id: &str, description: &str) -> Self {
        Self::new(id, VIRTUAL_ACTION).with_description(description)
    }

    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn is_virtual(&self) -> bool {
        is_anchor(&self.id) || self.action_type == VIRTUAL_ACTION
    }
}

/// A "must happen before" dependency: `source` precedes `target`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: String,
    pub target: String,
    #[serde(default = "default_relationship")]
    pub relationship: String,
}

fn default_relationship() -> String {
    DEFAULT_RELATIONSHIP.to_string()
}

impl DependencyEdge {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: source.to_string(),
            target: target.to_string(),
            relationship: default_relationship(),
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// An action-dependency plan. Node order is significant: it is the
/// tie-breaker for every deterministic ordering the engine produces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal_description: String,
    #[serde(default)]
    pub nodes: Vec<ActionNode>,
    #[serde(default)]
    pub edges: Vec<DependencyEdge>,
}

impl Plan {
    pub fn new(goal: &str) -> Self {
        Self {
            goal_description: goal.to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn with_node(mut self, node: ActionNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, source: &str, target: &str) -> Self {
        self.edges.push(DependencyEdge::new(source, target));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&ActionNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.source == source && edge.target == target)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    pub fn from_json(raw: &str) -> Result<Self, PlanLoadError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String, PlanLoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
