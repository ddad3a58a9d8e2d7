use plan_repair::domain::DomainTag;
use plan_repair::domain::blocksworld::WorldState;
use plan_repair::model::{ActionNode, END_ANCHOR, Plan, START_ANCHOR};
use plan_repair::repair::{canonicalize, repair_structure, signature};
use plan_repair::simulation::PreconditionSimulator;
use plan_repair::validation::{topological_order, verify_graph};

fn tasks(ids: &[&str], edges: &[(&str, &str)]) -> Plan {
    let mut plan = Plan::new("integration");
    for id in ids {
        plan = plan.with_node(ActionNode::new(id, "Task"));
    }
    for (source, target) in edges {
        plan = plan.with_edge(source, target);
    }
    plan
}

fn edge_pairs(plan: &Plan) -> Vec<(String, String)> {
    plan.edges
        .iter()
        .map(|edge| (edge.source.clone(), edge.target.clone()))
        .collect()
}

fn actions(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

#[test]
fn isolated_tasks_are_joined_through_anchors() {
    let outcome = repair_structure(tasks(&["print", "email"], &[]));

    assert!(outcome.success);
    assert!(!outcome.original_valid);
    assert_eq!(
        outcome.plan.node_ids(),
        vec!["print", "email", START_ANCHOR, END_ANCHOR]
    );
    let edges = edge_pairs(&outcome.plan);
    for expected in [
        (START_ANCHOR, "print"),
        (START_ANCHOR, "email"),
        ("print", END_ANCHOR),
        ("email", END_ANCHOR),
    ] {
        assert!(
            edges.contains(&(expected.0.to_string(), expected.1.to_string())),
            "missing {:?} in {:?}",
            expected,
            edges
        );
    }
    assert_eq!(edges.len(), 4);
    assert!(verify_graph(&outcome.plan).valid);
}

#[test]
fn a_three_cycle_is_reported_once() {
    let result = verify_graph(&tasks(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "A")]));

    assert!(!result.valid);
    assert_eq!(result.diagnostics.len(), 1);
    let message = &result.diagnostics[0].message;
    assert!(message.contains("A -> B -> C"), "{message}");
}

#[test]
fn picking_then_stacking_on_a_clear_table_is_clean() {
    let initial = WorldState::new()
        .with_on_table("a")
        .with_on_table("b")
        .with_clear("a")
        .with_clear("b");
    let result = PreconditionSimulator::new().simulate(
        &actions(&["(pick-up a)", "(stack a b)"]),
        &initial,
        DomainTag::Blocksworld,
    );

    assert!(result.valid);
    assert!(result.diagnostics.is_empty());
}

#[test]
fn empty_plans_fail_fast_with_a_single_diagnostic() {
    let result = verify_graph(&Plan::new("nothing"));
    assert!(!result.valid);
    assert_eq!(result.diagnostics.len(), 1);
    assert!(result.diagnostics[0].message.contains("empty"));
}

#[test]
fn repairing_fragments_only_adds_nodes_and_edges() {
    let original = tasks(
        &["a", "b", "c", "d", "e"],
        &[("a", "b"), ("c", "d")],
    );
    let outcome = repair_structure(original.clone());
    let repaired = &outcome.plan;

    assert!(outcome.success);
    assert!(verify_graph(repaired).valid);
    assert!(repaired.nodes.len() <= original.nodes.len() + 2);
    assert_eq!(&repaired.nodes[..original.nodes.len()], &original.nodes[..]);
    assert_eq!(&repaired.edges[..original.edges.len()], &original.edges[..]);
    assert!(!topological_order(repaired).is_empty());
}

#[test]
fn repairing_a_repaired_plan_changes_nothing() {
    let first = repair_structure(tasks(&["x", "y"], &[]));
    let second = repair_structure(first.plan.clone());

    assert!(second.success);
    assert!(second.original_valid);
    assert!(second.repairs_applied.is_empty());
    assert_eq!(second.plan, first.plan);
}

#[test]
fn cyclic_plans_have_no_order_and_are_not_repaired() {
    let cyclic = tasks(&["p", "q", "r"], &[("p", "q"), ("q", "p")]);

    assert!(topological_order(&cyclic).is_empty());
    let outcome = repair_structure(cyclic.clone());
    assert!(!outcome.success);
    assert_eq!(outcome.plan, cyclic);
}

#[test]
fn canonical_form_is_stable_and_numbered_from_one() {
    let plan = tasks(&["z", "m", "a"], &[("a", "m"), ("m", "z"), ("a", "m")]);
    let once = canonicalize(&plan);
    let twice = canonicalize(&once);

    assert_eq!(once, twice);
    assert_eq!(once.node_ids(), vec!["action_1", "action_2", "action_3"]);
    assert_eq!(once.edges.len(), 2);
    assert_eq!(signature(&plan), signature(&once));
}

#[test]
fn a_repaired_plan_canonicalizes_to_contiguous_ids() {
    let repaired = repair_structure(tasks(&["print", "email"], &[])).plan;
    let canonical = canonicalize(&repaired);

    assert_eq!(
        canonical.node_ids(),
        vec!["action_1", "action_2", "action_3", "action_4"]
    );
    assert!(canonical.nodes.first().is_some_and(|node| node.is_virtual()));
    assert!(canonical.nodes.last().is_some_and(|node| node.is_virtual()));
    assert!(verify_graph(&canonical).valid);
    assert_eq!(canonicalize(&canonical), canonical);
    // Already well formed, so a second repair is a no-op.
    let again = repair_structure(canonical.clone());
    assert!(again.original_valid);
    assert_eq!(again.plan, canonical);
}

#[test]
fn lifting_a_covered_block_is_flagged_at_its_step() {
    let initial = WorldState::new()
        .with_on_table("a")
        .with_on("b", "a")
        .with_clear("b");
    let result = PreconditionSimulator::new().simulate(
        &actions(&["(pick-up a)"]),
        &initial,
        DomainTag::Blocksworld,
    );

    assert!(!result.valid);
    assert!(!result.diagnostics.is_empty());
    assert!(result.diagnostics.iter().all(|d| d.step == Some(1)));
}
