// src/validation/graph.rs

use crate::model::{is_anchor, DependencyEdge, Plan};
use crate::protocol::{Diagnostic, Layer, VerificationResult};
use petgraph::algo::{connected_components, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap, HashSet};

/// Directed-graph view of a plan. Node indices follow first-occurrence
/// order in `plan.nodes`, so every ordering derived from them is stable.
pub struct PlanGraph<'a> {
    graph: DiGraph<&'a str, ()>,
    index: HashMap<&'a str, NodeIndex>,
    duplicate_ids: Vec<&'a str>,
    dangling_edges: Vec<&'a DependencyEdge>,
}

impl<'a> PlanGraph<'a> {
    pub fn from_plan(plan: &'a Plan) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();
        let mut duplicate_ids = Vec::new();

        for node in &plan.nodes {
            let id = node.id.as_str();
            if index.contains_key(id) {
                duplicate_ids.push(id);
                continue;
            }
            index.insert(id, graph.add_node(id));
        }

        let mut dangling_edges = Vec::new();
        for edge in &plan.edges {
            let endpoints = [edge.source.as_str(), edge.target.as_str()];
            if endpoints
                .iter()
                .any(|id| !index.contains_key(id) && !is_anchor(id))
            {
                dangling_edges.push(edge);
                continue;
            }
            // Anchor ids may be referenced before their node exists.
            let [source, target] = endpoints.map(|id| {
                *index
                    .entry(id)
                    .or_insert_with(|| graph.add_node(id))
            });
            graph.add_edge(source, target, ());
        }

        Self {
            graph,
            index,
            duplicate_ids,
            dangling_edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn id(&self, node: NodeIndex) -> &'a str {
        self.graph[node]
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn duplicate_ids(&self) -> &[&'a str] {
        &self.duplicate_ids
    }

    pub fn dangling_edges(&self) -> &[&'a DependencyEdge] {
        &self.dangling_edges
    }

    pub fn has_integrity_defects(&self) -> bool {
        !self.duplicate_ids.is_empty() || !self.dangling_edges.is_empty()
    }

    pub fn is_weakly_connected(&self) -> bool {
        self.node_count() <= 1 || connected_components(&self.graph) == 1
    }

    /// Weakly-connected components, each sorted by insertion index, ordered
    /// by their smallest insertion index.
    pub fn components(&self) -> Vec<Vec<NodeIndex>> {
        let mut sets = UnionFind::new(self.node_count());
        for edge in self.graph.edge_references() {
            sets.union(edge.source().index(), edge.target().index());
        }

        let mut grouped: BTreeMap<usize, Vec<NodeIndex>> = BTreeMap::new();
        let mut first_seen: HashMap<usize, usize> = HashMap::new();
        for node in self.graph.node_indices() {
            let label = sets.find(node.index());
            let key = *first_seen.entry(label).or_insert(node.index());
            grouped.entry(key).or_default().push(node);
        }
        grouped.into_values().collect()
    }

    /// Nodes without an incoming edge. Within a weakly-connected component
    /// every neighbor is a member, so this is also the component-local root set.
    pub fn roots(&self, component: &[NodeIndex]) -> Vec<&'a str> {
        self.endpoints(component, Direction::Incoming)
    }

    pub fn terminals(&self, component: &[NodeIndex]) -> Vec<&'a str> {
        self.endpoints(component, Direction::Outgoing)
    }

    fn endpoints(&self, component: &[NodeIndex], direction: Direction) -> Vec<&'a str> {
        component
            .iter()
            .filter(|&&node| {
                self.graph
                    .neighbors_directed(node, direction)
                    .next()
                    .is_none()
            })
            .map(|&node| self.graph[node])
            .collect()
    }

    fn successors(&self, node: NodeIndex) -> BTreeSet<NodeIndex> {
        self.graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect()
    }

    /// Every simple cycle, each listed from its earliest-inserted member.
    pub fn simple_cycles(&self) -> Vec<Vec<&'a str>> {
        let mut cycles = Vec::new();

        for component in tarjan_scc(&self.graph) {
            let members: BTreeSet<NodeIndex> = component.into_iter().collect();
            for &start in &members {
                let mut path = vec![start];
                let mut on_path = HashSet::from([start]);
                self.close_cycles(start, start, &members, &mut path, &mut on_path, &mut cycles);
            }
        }

        cycles.sort();
        cycles
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|node| self.graph[node]).collect())
            .collect()
    }

    fn close_cycles(
        &self,
        start: NodeIndex,
        current: NodeIndex,
        members: &BTreeSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
        on_path: &mut HashSet<NodeIndex>,
        cycles: &mut Vec<Vec<NodeIndex>>,
    ) {
        for next in self.successors(current) {
            if next == start {
                cycles.push(path.clone());
                continue;
            }
            // Only visit members later than `start` so each cycle is found once.
            if next < start || !members.contains(&next) || on_path.contains(&next) {
                continue;
            }
            path.push(next);
            on_path.insert(next);
            self.close_cycles(start, next, members, path, on_path, cycles);
            path.pop();
            on_path.remove(&next);
        }
    }

    /// Kahn's algorithm, always releasing the earliest-inserted ready node.
    /// `None` when the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<&'a str>> {
        let count = self.node_count();
        let mut in_degree = vec![0usize; count];
        for edge in self.graph.edge_references() {
            in_degree[edge.target().index()] += 1;
        }

        let mut ready: BinaryHeap<Reverse<usize>> = (0..count)
            .filter(|&i| in_degree[i] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(count);

        while let Some(Reverse(i)) = ready.pop() {
            let node = NodeIndex::new(i);
            order.push(self.graph[node]);
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                let target = edge.target().index();
                in_degree[target] -= 1;
                if in_degree[target] == 0 {
                    ready.push(Reverse(target));
                }
            }
        }

        (order.len() == count).then_some(order)
    }
}

/// Structural checks, in order: emptiness (fail-fast), id/edge integrity,
/// weak connectivity, and one diagnostic per simple cycle.
pub fn verify_graph(plan: &Plan) -> VerificationResult {
    if plan.is_empty() {
        return VerificationResult::from_diagnostics(vec![Diagnostic::new(
            Layer::Structural,
            "plan is empty (no actions generated)",
        )]);
    }

    let graph = PlanGraph::from_plan(plan);
    let mut diagnostics = Vec::new();

    for id in graph.duplicate_ids() {
        diagnostics.push(Diagnostic::new(
            Layer::Structural,
            format!("duplicate node id `{}`", id),
        ));
    }
    for edge in graph.dangling_edges() {
        diagnostics.push(Diagnostic::new(
            Layer::Structural,
            format!(
                "edge {} -> {} references an unknown node",
                edge.source, edge.target
            ),
        ));
    }

    if !graph.is_weakly_connected() {
        diagnostics.push(Diagnostic::new(
            Layer::Structural,
            format!(
                "plan graph is disconnected ({} weakly-connected components); every action should relate to the goal",
                graph.components().len()
            ),
        ));
    }

    for cycle in graph.simple_cycles() {
        diagnostics.push(Diagnostic::new(
            Layer::Structural,
            format!("cycle detected: {}", render_cycle(&cycle)),
        ));
    }

    VerificationResult::from_diagnostics(diagnostics)
}

/// A linear order honoring every edge, or an empty vector for cyclic plans.
pub fn topological_order(plan: &Plan) -> Vec<String> {
    PlanGraph::from_plan(plan)
        .topological_order()
        .map(|order| order.into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

fn render_cycle(cycle: &[&str]) -> String {
    let mut members: Vec<&str> = cycle.to_vec();
    if let Some(first) = cycle.first() {
        members.push(first);
    }
    members.join(" -> ")
}
