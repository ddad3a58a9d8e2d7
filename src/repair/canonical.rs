// src/repair/canonical.rs

use crate::domain::ingest::{normalize_action_type, normalize_value};
use crate::model::{DependencyEdge, Plan};
use crate::validation::topological_order;
use std::collections::{HashMap, HashSet};

/// Renames every node to `action_1..action_N` in dependency order, drops
/// self-loops and collapses duplicate edges. Anchors are renamed too and stay
/// `Virtual`. Cyclic plans keep their node order and only get the
/// deduplication.
pub fn canonicalize(plan: &Plan) -> Plan {
    let acyclic_candidate = Plan {
        edges: plan
            .edges
            .iter()
            .filter(|edge| !edge.is_self_loop())
            .cloned()
            .collect(),
        ..plan.clone()
    };

    let order = topological_order(&acyclic_candidate);
    let order: Vec<&str> = if order.is_empty() {
        let mut seen = HashSet::new();
        plan.node_ids()
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect()
    } else {
        order
            .iter()
            .filter_map(|id| plan.node(id).map(|node| node.id.as_str()))
            .collect()
    };

    let mut renamed: HashMap<&str, String> = HashMap::new();
    let mut nodes = Vec::with_capacity(order.len());
    for id in order {
        let Some(node) = plan.node(id) else {
            continue;
        };
        let new_id = format!("action_{}", nodes.len() + 1);
        renamed.insert(id, new_id.clone());
        let mut node = node.clone();
        node.id = new_id;
        nodes.push(node);
    }

    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for edge in &acyclic_candidate.edges {
        let (Some(source), Some(target)) = (
            renamed.get(edge.source.as_str()),
            renamed.get(edge.target.as_str()),
        ) else {
            continue;
        };
        if source == target || !seen.insert((source.clone(), target.clone())) {
            continue;
        }
        edges.push(DependencyEdge {
            source: source.clone(),
            target: target.clone(),
            relationship: edge.relationship.clone(),
        });
    }

    Plan {
        goal_description: plan.goal_description.clone(),
        nodes,
        edges,
    }
}

/// Stable text key of a plan's canonical form: action types, normalized
/// parameters and edges. Plans that differ only in node ids, parameter
/// spelling or duplicate edges share a signature.
pub fn signature(plan: &Plan) -> String {
    let canonical = canonicalize(plan);

    let nodes = canonical
        .nodes
        .iter()
        .map(|node| {
            let mut params: Vec<String> = node
                .params
                .iter()
                .filter_map(|(key, value)| {
                    normalize_value(value).map(|value| format!("{}={}", key.to_lowercase(), value))
                })
                .collect();
            params.sort();
            format!(
                "{}:{}({})",
                node.id,
                normalize_action_type(&node.action_type),
                params.join(",")
            )
        })
        .collect::<Vec<_>>()
        .join(";");

    let edges = canonical
        .edges
        .iter()
        .map(|edge| format!("{}>{}", edge.source, edge.target))
        .collect::<Vec<_>>()
        .join(";");

    format!("{}|{}", nodes, edges)
}
