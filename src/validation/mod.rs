// src/validation/mod.rs

pub mod graph;
pub mod plan;

pub use graph::{PlanGraph, topological_order, verify_graph};
pub use plan::{PlanSchemaError, load_plan_json, validate_plan_json};
