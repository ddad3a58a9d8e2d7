// src/validation/plan.rs

use crate::domain::DomainTag;
use crate::error::PlanLoadError;
use crate::model::{Plan, VIRTUAL_ACTION, is_anchor};
use crate::protocol::{Diagnostic, Layer};
use serde_json::{Value, json};
use std::collections::HashSet;

/// Problems in a raw JSON plan, found before it is turned into a `Plan`.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanSchemaError {
    NotAnObject,
    MissingField(&'static str),
    WrongType { field: &'static str, expected: &'static str },
    DuplicateId(String),
    UnknownActionType { node: String, action_type: String },
    UnknownReference { source: String, target: String },
    PlaceholderParam { node: String, key: String },
}

impl PlanSchemaError {
    pub fn hint(&self) -> (String, Option<Value>) {
        match self {
            PlanSchemaError::NotAnObject => (
                "Plan must be a JSON object.".to_string(),
                Some(json!({ "goal_description": "...", "nodes": [], "edges": [] })),
            ),
            PlanSchemaError::MissingField(field) => (
                format!("Missing required field `{}`.", field),
                Some(json!({ field.to_string(): "<required>" })),
            ),
            PlanSchemaError::WrongType { field, expected } => (
                format!("Field `{}` must be {}.", field, expected),
                None,
            ),
            PlanSchemaError::DuplicateId(id) => (
                format!("Node id `{}` is used more than once. Ids must be unique.", id),
                None,
            ),
            PlanSchemaError::UnknownActionType { node, action_type } => (
                format!(
                    "Node `{}` uses unknown action type `{}` for this domain.",
                    node, action_type
                ),
                Some(json!({ "id": node, "action_type": "pick-up", "params": { "block": "a" } })),
            ),
            PlanSchemaError::UnknownReference { source, target } => (
                format!(
                    "Edge {} -> {} references a node that does not exist.",
                    source, target
                ),
                Some(json!({ "source": source, "target": target })),
            ),
            PlanSchemaError::PlaceholderParam { node, key } => (
                format!(
                    "Parameter `{}` of node `{}` is a placeholder, not a value.",
                    key, node
                ),
                None,
            ),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(Layer::Schema, self.hint().0)
    }

    /// Whether the document cannot be read as a plan at all.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            PlanSchemaError::NotAnObject
                | PlanSchemaError::MissingField(_)
                | PlanSchemaError::WrongType { .. }
        )
    }
}

/// Parses a raw JSON plan. Findings that make the document unreadable are an
/// error; the rest come back alongside the plan for the caller to report.
pub fn load_plan_json(
    raw: &str,
    domain: DomainTag,
) -> Result<(Plan, Vec<PlanSchemaError>), PlanLoadError> {
    let value: Value = serde_json::from_str(raw)?;
    let findings = validate_plan_json(&value, domain);

    let blocking: Vec<String> = findings
        .iter()
        .filter(|finding| finding.is_blocking())
        .map(|finding| finding.hint().0)
        .collect();
    if !blocking.is_empty() {
        return Err(PlanLoadError::Schema(blocking));
    }

    let plan = serde_json::from_value(value)?;
    Ok((plan, findings))
}

pub fn validate_plan_json(plan: &Value, domain: DomainTag) -> Vec<PlanSchemaError> {
    let mut errors = Vec::new();

    let Some(object) = plan.as_object() else {
        errors.push(PlanSchemaError::NotAnObject);
        return errors;
    };

    if object.get("goal_description").is_none() {
        errors.push(PlanSchemaError::MissingField("goal_description"));
    }

    let Some(nodes) = object.get("nodes") else {
        errors.push(PlanSchemaError::MissingField("nodes"));
        return errors;
    };
    let Some(nodes) = nodes.as_array() else {
        errors.push(PlanSchemaError::WrongType {
            field: "nodes",
            expected: "an array",
        });
        return errors;
    };

    let mut ids = HashSet::new();
    for node in nodes {
        let Some(id) = node.get("id").and_then(|v| v.as_str()) else {
            errors.push(PlanSchemaError::MissingField("id"));
            continue;
        };
        if !ids.insert(id) {
            errors.push(PlanSchemaError::DuplicateId(id.to_string()));
        }

        let Some(action_type) = node.get("action_type").and_then(|v| v.as_str()) else {
            errors.push(PlanSchemaError::MissingField("action_type"));
            continue;
        };
        if action_type != VIRTUAL_ACTION && !domain.recognizes(action_type) {
            errors.push(PlanSchemaError::UnknownActionType {
                node: id.to_string(),
                action_type: action_type.to_string(),
            });
        }

        if let Some(params) = node.get("params") {
            let Some(params) = params.as_object() else {
                errors.push(PlanSchemaError::WrongType {
                    field: "params",
                    expected: "an object",
                });
                continue;
            };
            for (key, value) in params {
                if let Some(text) = value.as_str() {
                    if text.contains('<') && text.contains('>') {
                        errors.push(PlanSchemaError::PlaceholderParam {
                            node: id.to_string(),
                            key: key.clone(),
                        });
                    }
                }
            }
        }
    }

    match object.get("edges") {
        None | Some(Value::Null) => {}
        Some(Value::Array(edges)) => {
            for edge in edges {
                let source = edge.get("source").and_then(|v| v.as_str());
                let target = edge.get("target").and_then(|v| v.as_str());
                let (Some(source), Some(target)) = (source, target) else {
                    errors.push(PlanSchemaError::MissingField("source/target"));
                    continue;
                };
                let known = |id: &str| ids.contains(id) || is_anchor(id);
                if !known(source) || !known(target) {
                    errors.push(PlanSchemaError::UnknownReference {
                        source: source.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
        Some(_) => errors.push(PlanSchemaError::WrongType {
            field: "edges",
            expected: "an array",
        }),
    }

    errors
}
