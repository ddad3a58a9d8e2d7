// src/orchestrator/report.rs

use crate::protocol::{Diagnostic, Layer, RepairAttempt, VerificationResult};
use crate::tools::ValidatorVerdict;
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerStatus {
    Passed,
    Failed,
    /// The layer's inputs were not supplied.
    NotApplicable,
    /// An earlier layer failed, so this one never ran.
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerReport {
    pub status: LayerStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl LayerReport {
    pub fn passed() -> Self {
        Self {
            status: LayerStatus::Passed,
            diagnostics: Vec::new(),
            note: None,
        }
    }

    pub fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            status: LayerStatus::Failed,
            diagnostics,
            note: None,
        }
    }

    pub fn not_applicable(note: &str) -> Self {
        Self {
            status: LayerStatus::NotApplicable,
            diagnostics: Vec::new(),
            note: Some(note.to_string()),
        }
    }

    pub fn skipped(note: &str) -> Self {
        Self {
            status: LayerStatus::Skipped,
            diagnostics: Vec::new(),
            note: Some(note.to_string()),
        }
    }

    pub fn from_result(result: VerificationResult) -> Self {
        if result.valid {
            Self::passed()
        } else {
            Self::failed(result.diagnostics)
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }

    pub fn is_passed(&self) -> bool {
        self.status == LayerStatus::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.status == LayerStatus::Failed
    }

    /// Passed, or not applicable when the caller counts that as a pass.
    pub fn counts_as_pass(&self, not_applicable_passes: bool) -> bool {
        match self.status {
            LayerStatus::Passed => true,
            LayerStatus::NotApplicable => not_applicable_passes,
            LayerStatus::Failed | LayerStatus::Skipped => false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AutoRepairReport {
    pub triggered: bool,
    pub success: bool,
    pub original_valid: bool,
    pub repairs_applied: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GenerationReport {
    /// Calls made to the generation collaborator, retries included.
    pub attempts: usize,
    pub transient_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Diagnostic>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RepairLoopReport {
    /// Corrective plans requested.
    pub attempts: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abandoned: Option<String>,
    pub history: Vec<RepairAttempt>,
}

/// Per-layer verdicts plus everything needed to audit why a plan was
/// accepted or rejected.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerificationReport {
    pub structural: LayerReport,
    pub schema: LayerReport,
    pub simulator: LayerReport,
    pub external_validator: LayerReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_verdict: Option<ValidatorVerdict>,
    pub auto_repair: AutoRepairReport,
    pub generation: GenerationReport,
    pub repair_loop: RepairLoopReport,
}

impl Default for VerificationReport {
    fn default() -> Self {
        let pending = || LayerReport::skipped("not evaluated");
        Self {
            structural: pending(),
            schema: pending(),
            simulator: pending(),
            external_validator: pending(),
            external_verdict: None,
            auto_repair: AutoRepairReport::default(),
            generation: GenerationReport::default(),
            repair_loop: RepairLoopReport::default(),
        }
    }
}

impl VerificationReport {
    pub fn layers(&self) -> [(Layer, &LayerReport); 4] {
        [
            (Layer::Structural, &self.structural),
            (Layer::Schema, &self.schema),
            (Layer::Simulator, &self.simulator),
            (Layer::ExternalValidator, &self.external_validator),
        ]
    }

    pub fn overall_valid(&self, not_applicable_passes: bool) -> bool {
        self.generation.error.is_none()
            && self
                .layers()
                .iter()
                .all(|(_, layer)| layer.counts_as_pass(not_applicable_passes))
    }

    pub fn failed_layers(&self) -> Vec<Layer> {
        let mut failed: Vec<Layer> = self
            .layers()
            .iter()
            .filter(|(_, layer)| layer.is_failed())
            .map(|(layer, _)| *layer)
            .collect();
        if self.generation.error.is_some() {
            failed.insert(0, Layer::Generation);
        }
        failed
    }

    pub fn diagnostics(&self) -> Vec<&Diagnostic> {
        self.generation
            .error
            .iter()
            .chain(self.layers().into_iter().flat_map(|(_, layer)| layer.diagnostics.iter()))
            .collect()
    }

    pub fn summary(&self) -> String {
        let mut text = String::new();
        if let Some(error) = &self.generation.error {
            let _ = writeln!(text, "generation: failed ({})", error.message);
        }
        for (layer, report) in self.layers() {
            let status = match report.status {
                LayerStatus::Passed => "passed",
                LayerStatus::Failed => "FAILED",
                LayerStatus::NotApplicable => "not applicable",
                LayerStatus::Skipped => "skipped",
            };
            let _ = write!(text, "{}: {}", layer, status);
            if let Some(note) = &report.note {
                let _ = write!(text, " ({})", note);
            }
            text.push('\n');
            for diagnostic in &report.diagnostics {
                let _ = writeln!(text, "  - {}", diagnostic);
            }
        }
        if self.auto_repair.triggered {
            let _ = writeln!(
                text,
                "auto-repair: {} [{}]",
                if self.auto_repair.success { "applied" } else { "declined" },
                self.auto_repair.repairs_applied.join("; ")
            );
        }
        if self.repair_loop.attempts > 0 {
            let _ = writeln!(
                text,
                "repair loop: {} attempts, {}",
                self.repair_loop.attempts,
                if self.repair_loop.success { "succeeded" } else { "did not succeed" }
            );
        }
        if let Some(reason) = &self.repair_loop.abandoned {
            let _ = writeln!(text, "repair loop abandoned: {}", reason);
        }
        text
    }
}
