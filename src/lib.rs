pub mod config;
pub mod domain;
pub mod error;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod protocol;
pub mod repair;
pub mod simulation;
pub mod tools;
pub mod validation;
