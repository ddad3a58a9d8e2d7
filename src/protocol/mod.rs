// src/protocol/mod.rs

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod planner;
pub mod replanner;

/// Which verification layer produced a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Generation,
    Schema,
    Structural,
    Simulator,
    ExternalValidator,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Layer::Generation => "generation",
            Layer::Schema => "schema",
            Layer::Structural => "structural",
            Layer::Simulator => "simulator",
            Layer::ExternalValidator => "external-validator",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub layer: Layer,
    pub message: String,
    /// 1-based index into the action sequence, when the finding is tied to one step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

impl Diagnostic {
    pub fn new(layer: Layer, message: impl Into<String>) -> Self {
        Self {
            layer,
            message: message.into(),
            step: None,
        }
    }

    pub fn at_step(layer: Layer, step: usize, message: impl Into<String>) -> Self {
        Self {
            layer,
            message: message.into(),
            step: Some(step),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.step {
            Some(step) => write!(f, "[{}] step {}: {}", self.layer, step, self.message),
            None => write!(f, "[{}] {}", self.layer, self.message),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl VerificationResult {
    pub fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            valid: diagnostics.is_empty(),
            diagnostics,
        }
    }

    pub fn passed() -> Self {
        Self::from_diagnostics(Vec::new())
    }

    pub fn messages(&self) -> Vec<&str> {
        self.diagnostics
            .iter()
            .map(|diagnostic| diagnostic.message.as_str())
            .collect()
    }
}

/// One failed round of the validator-driven repair loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub attempt: usize,
    pub actions: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
}
