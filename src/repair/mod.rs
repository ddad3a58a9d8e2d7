// src/repair/mod.rs

pub mod canonical;
pub mod structural;

pub use canonical::{canonicalize, signature};
pub use structural::{RepairOutcome, repair_structure};
