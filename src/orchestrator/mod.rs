// src/orchestrator/mod.rs

pub mod report;

use crate::config::OrchestratorConfig;
use crate::domain::blocksworld::WorldState;
use crate::domain::plan_actions;
use crate::memory::RepairHistory;
use crate::model::Plan;
use crate::protocol::planner::{GenerationError, PlanRequest, Planner};
use crate::protocol::replanner::CorrectiveFeedback;
use crate::protocol::{Diagnostic, Layer};
use crate::repair::{canonicalize, repair_structure};
use crate::simulation::PreconditionSimulator;
use crate::tools::{PlanValidator, ValValidator, ValidatorVerdict};
use crate::validation::verify_graph;
use report::{
    AutoRepairReport, GenerationReport, LayerReport, LayerStatus, RepairLoopReport,
    VerificationReport,
};
use std::path::PathBuf;
use std::thread;
use tracing::{debug, info, warn};

const NO_ACTIONS: &str = "plan contains no executable actions";

/// Domain and problem artifacts handed to the external validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProblemArtifacts {
    pub domain: PathBuf,
    pub problem: PathBuf,
}

/// One planning job. Omitted artifacts skip the external-validator layer;
/// an omitted initial state skips the simulator layer.
#[derive(Clone, Debug, Default)]
pub struct PlanningTask {
    pub goal: String,
    pub artifacts: Option<ProblemArtifacts>,
    pub initial_state: Option<WorldState>,
}

impl PlanningTask {
    pub fn new(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            ..Self::default()
        }
    }

    pub fn with_artifacts(mut self, domain: impl Into<PathBuf>, problem: impl Into<PathBuf>) -> Self {
        self.artifacts = Some(ProblemArtifacts {
            domain: domain.into(),
            problem: problem.into(),
        });
        self
    }

    pub fn with_initial_state(mut self, state: WorldState) -> Self {
        self.initial_state = Some(state);
        self
    }
}

#[derive(Clone, Debug)]
pub struct OrchestrationOutcome {
    pub plan: Plan,
    pub valid: bool,
    pub report: VerificationReport,
}

/// Which layer decides whether another corrective round is needed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopDriver {
    ExternalValidator,
    Simulator,
}

/// A candidate plan after every layer had its say.
struct Evaluation {
    plan: Plan,
    actions: Vec<String>,
    report: VerificationReport,
}

impl Evaluation {
    /// Structure and action parsing both passed, so semantic layers ran.
    fn is_well_formed(&self) -> bool {
        self.report.structural.is_passed() && self.report.schema.is_passed()
    }

    fn semantic_diagnostics(&self) -> Vec<Diagnostic> {
        self.report
            .simulator
            .diagnostics
            .iter()
            .chain(self.report.external_validator.diagnostics.iter())
            .cloned()
            .collect()
    }

    fn tool_trouble(&self) -> Option<ValidatorVerdict> {
        self.report
            .external_verdict
            .filter(|verdict| !verdict.is_semantic())
    }
}

struct GenerationFailure {
    diagnostic: Diagnostic,
}

/// Coordinates generation, verification, repair and the validator-driven
/// corrective loop for one planner and one configuration.
pub struct RepairOrchestrator<P: Planner> {
    planner: P,
    validator: Option<Box<dyn PlanValidator>>,
    simulator: PreconditionSimulator,
    config: OrchestratorConfig,
}

impl<P: Planner> RepairOrchestrator<P> {
    /// Builds a `ValValidator` when the configuration names an executable.
    pub fn new(planner: P, config: OrchestratorConfig) -> Self {
        let validator = ValValidator::from_config(&config)
            .map(|validator| Box::new(validator) as Box<dyn PlanValidator>);
        Self {
            planner,
            validator,
            simulator: PreconditionSimulator::new().with_policy(config.violation_policy),
            config,
        }
    }

    pub fn with_validator(mut self, validator: impl PlanValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn without_validator(mut self) -> Self {
        self.validator = None;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    /// Generates a plan for `task`, verifies it, and runs the corrective loop
    /// on semantic failure. Always returns a result; failures are diagnostics.
    pub fn run(&self, task: &PlanningTask) -> OrchestrationOutcome {
        let mut generation = GenerationReport::default();

        let plan = match self.generate(&PlanRequest::initial(&task.goal), &mut generation) {
            Ok(plan) => plan,
            Err(failure) => {
                warn!("plan generation failed: {}", failure.diagnostic.message);
                generation.error = Some(failure.diagnostic);
                let report = VerificationReport {
                    generation,
                    ..VerificationReport::default()
                };
                return OrchestrationOutcome {
                    plan: Plan::new(&task.goal),
                    valid: false,
                    report,
                };
            }
        };

        let mut evaluation = self.evaluate(plan, task);
        let repair_loop = self.repair_loop(task, &mut evaluation, &mut generation);

        let mut report = evaluation.report;
        report.generation = generation;
        report.repair_loop = repair_loop;
        self.finish(evaluation.plan, report)
    }

    /// Verifies an existing plan through every layer without generating or
    /// looping.
    pub fn assess(&self, plan: Plan, task: &PlanningTask) -> OrchestrationOutcome {
        let evaluation = self.evaluate(plan, task);
        self.finish(evaluation.plan, evaluation.report)
    }

    fn finish(&self, plan: Plan, report: VerificationReport) -> OrchestrationOutcome {
        let valid = report.overall_valid(self.config.not_applicable_passes);
        if valid {
            info!("plan accepted with {} nodes", plan.nodes.len());
        } else {
            debug!("plan rejected; failed layers: {:?}", report.failed_layers());
        }
        OrchestrationOutcome { plan, valid, report }
    }

    /// Calls the planner, retrying transient failures with exponential backoff.
    fn generate(
        &self,
        request: &PlanRequest,
        report: &mut GenerationReport,
    ) -> Result<Plan, GenerationFailure> {
        let budget = self.config.max_generation_attempts.max(1);
        let mut attempt = 0;
        loop {
            report.attempts += 1;
            match self.planner.generate_plan(request) {
                Ok(plan) => return Ok(plan),
                Err(error @ GenerationError::Transient(_)) if attempt + 1 < budget => {
                    report.transient_failures += 1;
                    let delay = self.config.backoff_for(attempt);
                    warn!(
                        "transient generation failure (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        budget,
                        delay,
                        error
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(error) => {
                    if error.is_transient() {
                        report.transient_failures += 1;
                    }
                    return Err(GenerationFailure {
                        diagnostic: Diagnostic::new(Layer::Generation, error.to_string()),
                    });
                }
            }
        }
    }

    fn evaluate(&self, plan: Plan, task: &PlanningTask) -> Evaluation {
        let mut report = VerificationReport::default();
        let mut plan = plan;

        let structural = verify_graph(&plan);
        if !structural.valid {
            if !self.config.auto_repair {
                report.structural = LayerReport::from_result(structural);
                return self.halted(plan, report, "structural verification failed");
            }

            let outcome = repair_structure(plan);
            report.auto_repair = AutoRepairReport {
                triggered: true,
                success: outcome.success,
                original_valid: outcome.original_valid,
                repairs_applied: outcome.repairs_applied,
            };
            plan = outcome.plan;
            if !outcome.success {
                debug!("structural repair declined");
                report.structural = LayerReport::failed(outcome.diagnostics);
                return self.halted(plan, report, "structural verification failed");
            }
            info!("structural repair applied: {:?}", report.auto_repair.repairs_applied);
            report.structural = LayerReport::passed().with_note("passed after auto-repair");
        } else {
            report.structural = LayerReport::passed();
        }

        if self.config.canonicalize {
            plan = canonicalize(&plan);
        }

        let sequence = plan_actions(&plan, self.config.domain);
        if !sequence.is_clean() {
            report.schema = LayerReport::failed(sequence.diagnostics);
            return Evaluation {
                plan,
                actions: sequence.lines,
                report: VerificationReport {
                    simulator: LayerReport::skipped("plan actions could not be parsed"),
                    external_validator: LayerReport::skipped("plan actions could not be parsed"),
                    ..report
                },
            };
        }
        report.schema = LayerReport::passed();
        let actions = sequence.lines;
        // A plan of anchors alone is a wrong plan, not a tool problem.
        let no_actions = |layer| LayerReport::failed(vec![Diagnostic::new(layer, NO_ACTIONS)]);
        if actions.is_empty() {
            info!("plan has no executable actions");
        }

        report.simulator = match &task.initial_state {
            None => LayerReport::not_applicable("no initial state supplied"),
            Some(_) if !self.config.domain.has_state_model() => {
                LayerReport::not_applicable("domain has no state model")
            }
            Some(_) if actions.is_empty() => no_actions(Layer::Simulator),
            Some(initial) => LayerReport::from_result(self.simulator.simulate(
                &actions,
                initial,
                self.config.domain,
            )),
        };

        report.external_validator = match (&task.artifacts, &self.validator) {
            (None, _) => LayerReport::not_applicable("no domain/problem artifacts supplied"),
            (Some(_), None) => LayerReport::not_applicable("no validator configured"),
            (Some(_), Some(_)) if actions.is_empty() => no_actions(Layer::ExternalValidator),
            (Some(artifacts), Some(validator)) => {
                let outcome = validator.validate(&artifacts.domain, &artifacts.problem, &actions);
                report.external_verdict = Some(outcome.verdict);
                if !outcome.verdict.is_semantic() {
                    warn!(
                        "validator {} could not judge the plan: {:?}",
                        validator.name(),
                        outcome.verdict
                    );
                }
                if outcome.is_valid() {
                    LayerReport::passed()
                } else {
                    LayerReport::failed(outcome.diagnostics)
                }
            }
        };

        Evaluation {
            plan,
            actions,
            report,
        }
    }

    fn halted(&self, plan: Plan, report: VerificationReport, reason: &str) -> Evaluation {
        Evaluation {
            plan,
            actions: Vec::new(),
            report: VerificationReport {
                schema: LayerReport::skipped(reason),
                simulator: LayerReport::skipped(reason),
                external_validator: LayerReport::skipped(reason),
                ..report
            },
        }
    }

    fn loop_driver(&self, evaluation: &Evaluation) -> Option<LoopDriver> {
        let report = &evaluation.report;
        if matches!(
            report.external_validator.status,
            LayerStatus::Passed | LayerStatus::Failed
        ) {
            Some(LoopDriver::ExternalValidator)
        } else if matches!(
            report.simulator.status,
            LayerStatus::Passed | LayerStatus::Failed
        ) {
            Some(LoopDriver::Simulator)
        } else {
            None
        }
    }

    fn driver_passed(driver: LoopDriver, evaluation: &Evaluation) -> bool {
        match driver {
            LoopDriver::ExternalValidator => evaluation.report.external_validator.is_passed(),
            LoopDriver::Simulator => evaluation.report.simulator.is_passed(),
        }
    }

    /// Feeds semantic failures back to the planner until the driving layer
    /// passes, a corrective plan is malformed, or the budget runs out.
    /// `evaluation` always ends as the last well-formed candidate.
    fn repair_loop(
        &self,
        task: &PlanningTask,
        evaluation: &mut Evaluation,
        generation: &mut GenerationReport,
    ) -> RepairLoopReport {
        let mut report = RepairLoopReport::default();
        if !evaluation.is_well_formed() {
            return report;
        }
        let Some(driver) = self.loop_driver(evaluation) else {
            return report;
        };
        if Self::driver_passed(driver, evaluation) {
            return report;
        }

        let mut history = RepairHistory::new();
        while report.attempts < self.config.max_repair_attempts {
            if let Some(verdict) = evaluation.tool_trouble() {
                report.abandoned = Some(format!("validator could not judge the plan ({:?})", verdict));
                break;
            }

            let diagnostics = evaluation.semantic_diagnostics();
            history.record(&evaluation.actions, &diagnostics);
            let feedback = CorrectiveFeedback {
                previous_plan: evaluation.plan.clone(),
                previous_actions: evaluation.actions.clone(),
                diagnostics,
                history: history.attempts().to_vec(),
            };
            report.attempts += 1;
            debug!("requesting corrective plan {}", report.attempts);

            let request = PlanRequest::corrective(&task.goal, feedback);
            let candidate = match self.generate(&request, generation) {
                Ok(plan) => self.evaluate(plan, task),
                Err(failure) => {
                    warn!("corrective generation failed: {}", failure.diagnostic.message);
                    report.abandoned = Some(format!(
                        "corrective generation failed: {}",
                        failure.diagnostic.message
                    ));
                    break;
                }
            };

            if !candidate.report.structural.is_passed() {
                warn!("corrective plan {} failed structural verification", report.attempts);
                report.abandoned =
                    Some("corrective plan failed structural verification".to_string());
                break;
            }
            if !candidate.report.schema.is_passed() {
                warn!("corrective plan {} has unparseable actions", report.attempts);
                report.abandoned = Some("corrective plan has unparseable actions".to_string());
                break;
            }

            *evaluation = candidate;
            if Self::driver_passed(driver, evaluation) {
                info!("corrective plan {} passed", report.attempts);
                report.success = true;
                break;
            }
        }

        if !report.success && report.abandoned.is_none() {
            if let Some(verdict) = evaluation.tool_trouble() {
                report.abandoned = Some(format!("validator could not judge the plan ({:?})", verdict));
            }
        }
        debug!("repair history:\n{}", history.dump());
        report.history = history.into_attempts();
        report
    }
}
