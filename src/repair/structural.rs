// src/repair/structural.rs

use crate::model::{ActionNode, DependencyEdge, END_ANCHOR, Plan, START_ANCHOR, is_anchor};
use crate::protocol::{Diagnostic, Layer};
use crate::validation::{PlanGraph, verify_graph};
use serde::Serialize;

/// Result of a structural repair pass. `plan` is either the fully repaired
/// plan (`success`) or the untouched input.
#[derive(Clone, Debug, Serialize)]
pub struct RepairOutcome {
    pub success: bool,
    pub plan: Plan,
    pub original_valid: bool,
    pub repairs_applied: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl RepairOutcome {
    fn unchanged(plan: Plan) -> Self {
        Self {
            success: true,
            plan,
            original_valid: true,
            repairs_applied: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn declined(plan: Plan, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            success: false,
            plan,
            original_valid: false,
            repairs_applied: Vec::new(),
            diagnostics,
        }
    }
}

/// Roots and terminals of one weakly-connected component, anchors excluded.
struct Fragment {
    roots: Vec<String>,
    terminals: Vec<String>,
}

/// Unifies a disconnected or multi-rooted plan under one `__START__` and one
/// `__END__` anchor. Cyclic plans and plans with duplicate ids or dangling
/// edges are declined and returned as given.
pub fn repair_structure(plan: Plan) -> RepairOutcome {
    let verdict = verify_graph(&plan);
    if verdict.valid {
        return RepairOutcome::unchanged(plan);
    }
    if plan.is_empty() {
        return RepairOutcome::declined(plan, verdict.diagnostics);
    }

    let (defective, cyclic, fragments) = {
        let graph = PlanGraph::from_plan(&plan);
        let fragments: Vec<Fragment> = graph
            .components()
            .iter()
            .map(|component| Fragment {
                roots: owned_without_anchors(graph.roots(component)),
                terminals: owned_without_anchors(graph.terminals(component)),
            })
            .collect();
        (
            graph.has_integrity_defects(),
            graph.topological_order().is_none(),
            fragments,
        )
    };

    if defective || cyclic {
        let reason = if defective {
            "structural repair declined: duplicate ids or dangling edges"
        } else {
            "structural repair declined: cyclic plans are rejected, not repaired"
        };
        let mut diagnostics = verdict.diagnostics;
        diagnostics.push(Diagnostic::new(Layer::Structural, reason));
        return RepairOutcome::declined(plan, diagnostics);
    }

    let mut repaired = plan.clone();
    let mut repairs = Vec::new();

    for (id, description) in [
        (START_ANCHOR, "Virtual start node (plan initialization)"),
        (END_ANCHOR, "Virtual end node (plan completion)"),
    ] {
        if !repaired.contains_node(id) {
            repaired.nodes.push(ActionNode::anchor(id, description));
            repairs.push(format!("added virtual anchor `{}`", id));
        }
    }

    let mut roots_linked = 0;
    let mut terminals_linked = 0;
    for fragment in &fragments {
        for root in &fragment.roots {
            if !repaired.has_edge(START_ANCHOR, root) {
                repaired.edges.push(DependencyEdge::new(START_ANCHOR, root));
                roots_linked += 1;
            }
        }
        for terminal in &fragment.terminals {
            if !repaired.has_edge(terminal, END_ANCHOR) {
                repaired.edges.push(DependencyEdge::new(terminal, END_ANCHOR));
                terminals_linked += 1;
            }
        }
    }

    if fragments.len() > 1 {
        repairs.push(format!(
            "connected {} disconnected components through the anchors",
            fragments.len()
        ));
    }
    if roots_linked > 0 {
        repairs.push(format!("unified {} root nodes under `{}`", roots_linked, START_ANCHOR));
    }
    if terminals_linked > 0 {
        repairs.push(format!(
            "unified {} terminal nodes under `{}`",
            terminals_linked, END_ANCHOR
        ));
    }

    let check = verify_graph(&repaired);
    if !check.valid {
        let mut diagnostics = check.diagnostics;
        diagnostics.push(Diagnostic::new(
            Layer::Structural,
            "structural repair did not produce a valid plan; original kept",
        ));
        return RepairOutcome::declined(plan, diagnostics);
    }

    RepairOutcome {
        success: true,
        plan: repaired,
        original_valid: false,
        repairs_applied: repairs,
        diagnostics: verdict.diagnostics,
    }
}

fn owned_without_anchors(ids: Vec<&str>) -> Vec<String> {
    ids.into_iter()
        .filter(|id| !is_anchor(id))
        .map(str::to_string)
        .collect()
}
