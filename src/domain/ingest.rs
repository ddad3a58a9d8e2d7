// src/domain/ingest.rs

use crate::domain::{Action, DomainTag, blocksworld::BlocksAction, logistics::LogisticsAction};
use crate::model::ActionNode;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("unknown action type `{0}`")]
    UnknownActionType(String),
    #[error("{action} is missing parameter `{param}`")]
    MissingParam {
        action: &'static str,
        param: &'static str,
    },
}

/// Maps spelling variants (`PickUp`, `pick_up`, `PICK-UP`) onto one name.
pub fn normalize_action_type(raw: &str) -> String {
    let squashed: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
        .collect();

    let canonical = match squashed.as_str() {
        "pickup" => "pick-up",
        "putdown" => "put-down",
        "loadtruck" => "load-truck",
        "unloadtruck" => "unload-truck",
        "loadairplane" => "load-airplane",
        "unloadairplane" => "unload-airplane",
        "drivetruck" => "drive-truck",
        "flyairplane" => "fly-airplane",
        other if other.starts_with("unstack") => "unstack",
        other if other.starts_with("stack") => "stack",
        _ => return squashed,
    };
    canonical.to_string()
}

/// Lowercases, trims and drops a leading `block ` that generators like to add.
pub fn normalize_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_lowercase(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let text = text
        .strip_prefix("block ")
        .map(|rest| rest.trim().to_string())
        .unwrap_or(text);
    (!text.is_empty()).then_some(text)
}

/// A parameter an action needs: its name and the keys it may appear under.
pub type Field = (&'static str, &'static [&'static str]);

/// Read access to a node's parameters by alias list. Fields that no alias
/// matches take the remaining unclaimed values in insertion order.
pub struct Params<'a> {
    map: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    pub fn named(&self, aliases: &[&str]) -> Option<String> {
        aliases
            .iter()
            .filter_map(|key| self.map.get(*key))
            .find_map(normalize_value)
    }

    /// Resolves every field of `action` at once. A value whose key belongs to
    /// any field's alias list is never handed to another field, and each
    /// leftover value is used at most once.
    pub fn resolve<const N: usize>(
        &self,
        action: &'static str,
        fields: [Field; N],
    ) -> Result<[String; N], IngestError> {
        let claimed = |key: &str| {
            fields
                .iter()
                .any(|(_, aliases)| aliases.iter().any(|alias| *alias == key))
        };
        let mut leftovers = self
            .map
            .iter()
            .filter(|(key, _)| !claimed(key.as_str()))
            .filter_map(|(_, value)| normalize_value(value));

        let mut resolved: [Option<String>; N] = fields.map(|(_, aliases)| self.named(aliases));
        for (slot, (param, _)) in resolved.iter_mut().zip(fields) {
            if slot.is_none() {
                *slot = leftovers.next();
            }
            if slot.is_none() {
                return Err(IngestError::MissingParam { action, param });
            }
        }
        Ok(resolved.map(Option::unwrap_or_default))
    }
}

pub fn action_from_node(domain: DomainTag, node: &ActionNode) -> Result<Action, IngestError> {
    let kind = normalize_action_type(&node.action_type);
    let params = Params::new(&node.params);
    match domain {
        DomainTag::Blocksworld => BlocksAction::from_params(&kind, &params).map(Action::Blocks),
        DomainTag::Logistics => {
            LogisticsAction::from_params(&kind, &params).map(Action::Logistics)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_type_spellings_collapse() {
        assert_eq!(normalize_action_type("PickUp"), "pick-up");
        assert_eq!(normalize_action_type("put_down"), "put-down");
        assert_eq!(normalize_action_type("StackBlock"), "stack");
        assert_eq!(normalize_action_type("unstack"), "unstack");
        assert_eq!(normalize_action_type("Load-Truck"), "load-truck");
        assert_eq!(normalize_action_type("teleport"), "teleport");
    }

    #[test]
    fn values_lose_block_prefix_and_case() {
        assert_eq!(normalize_value(&json!(" Block A ")), Some("a".into()));
        assert_eq!(normalize_value(&json!(7)), Some("7".into()));
        assert_eq!(normalize_value(&json!("")), None);
        assert_eq!(normalize_value(&json!(null)), None);
    }

    const STACK: [Field; 2] = [("block", &["block", "object"]), ("target", &["target", "on"])];

    fn params_of(value: &Value) -> Params<'_> {
        Params::new(value.as_object().unwrap())
    }

    #[test]
    fn aliases_win_over_leftovers() {
        let map = json!({ "first": "z", "object": "a" });
        assert_eq!(params_of(&map).resolve("stack", STACK), Ok(["a".into(), "z".into()]));
    }

    #[test]
    fn leftovers_never_reuse_a_claimed_value() {
        let map = json!({ "target": "b", "block_name": "a" });
        assert_eq!(params_of(&map).resolve("stack", STACK), Ok(["a".into(), "b".into()]));

        let map = json!({ "target": "b" });
        assert_eq!(
            params_of(&map).resolve("stack", STACK),
            Err(IngestError::MissingParam { action: "stack", param: "block" })
        );

        // Both keys belong to `block`; neither may stand in for the target.
        let map = json!({ "block": "a", "object": "c" });
        assert_eq!(
            params_of(&map).resolve("stack", STACK),
            Err(IngestError::MissingParam { action: "stack", param: "target" })
        );
    }

    #[test]
    fn leftovers_fill_fields_in_order() {
        let map = json!({ "p": "A", "q": "B" });
        assert_eq!(params_of(&map).resolve("stack", STACK), Ok(["a".into(), "b".into()]));
    }

    #[test]
    fn nodes_become_typed_actions() {
        let node = ActionNode::new("n1", "Stack")
            .with_param("x", "A")
            .with_param("on", "block b");
        assert_eq!(
            action_from_node(DomainTag::Blocksworld, &node),
            Ok(Action::Blocks(BlocksAction::Stack {
                block: "a".into(),
                target: "b".into()
            }))
        );

        let unknown = ActionNode::new("n2", "Teleport").with_param("block", "a");
        assert_eq!(
            action_from_node(DomainTag::Blocksworld, &unknown),
            Err(IngestError::UnknownActionType("teleport".into()))
        );
    }
}
