// src/simulation/mod.rs

use crate::domain::blocksworld::WorldState;
use crate::domain::extract::parse_action_line;
use crate::domain::{Action, DomainTag};
use crate::protocol::{Diagnostic, Layer, VerificationResult};
use serde::{Deserialize, Serialize};

/// What the simulator does once a step violates a precondition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationPolicy {
    /// Apply the effects anyway and keep going, so later steps are judged
    /// against the hypothetical trajectory.
    #[default]
    ContinueAndApply,
    HaltOnFirst,
}

/// Outcome of a replay, including where the trajectory ended up.
#[derive(Clone, Debug, PartialEq)]
pub struct Replay {
    pub result: VerificationResult,
    pub final_state: WorldState,
    pub steps_run: usize,
}

/// Replays a linear action sequence against a domain's state model.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreconditionSimulator {
    policy: ViolationPolicy,
}

impl PreconditionSimulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: ViolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    pub fn simulate(
        &self,
        actions: &[String],
        initial: &WorldState,
        domain: DomainTag,
    ) -> VerificationResult {
        self.replay(actions, initial, domain).result
    }

    pub fn replay(&self, actions: &[String], initial: &WorldState, domain: DomainTag) -> Replay {
        let mut state = initial.clone();
        let mut diagnostics = Vec::new();

        if !domain.has_state_model() {
            diagnostics.push(Diagnostic::new(
                Layer::Simulator,
                format!("no state model for domain {}", domain),
            ));
            return Replay {
                result: VerificationResult::from_diagnostics(diagnostics),
                final_state: state,
                steps_run: 0,
            };
        }

        let mut steps_run = 0;
        for (i, line) in actions.iter().enumerate() {
            let step = i + 1;
            steps_run = step;

            let action = match parse_action_line(domain, line) {
                Ok(Action::Blocks(action)) => action,
                Ok(other) => {
                    diagnostics.push(Diagnostic::at_step(
                        Layer::Simulator,
                        step,
                        format!("{} has no blocksworld semantics", other),
                    ));
                    if self.policy == ViolationPolicy::HaltOnFirst {
                        break;
                    }
                    continue;
                }
                Err(error) => {
                    // Unparseable steps leave the state untouched.
                    diagnostics.push(Diagnostic::at_step(Layer::Simulator, step, error.to_string()));
                    if self.policy == ViolationPolicy::HaltOnFirst {
                        break;
                    }
                    continue;
                }
            };

            let violations: Vec<Diagnostic> = action
                .preconditions()
                .iter()
                .filter(|precondition| !state.satisfies(precondition))
                .map(|precondition| {
                    Diagnostic::at_step(
                        Layer::Simulator,
                        step,
                        action.describe_violation(precondition, &state),
                    )
                })
                .collect();

            let violated = !violations.is_empty();
            diagnostics.extend(violations);
            if violated && self.policy == ViolationPolicy::HaltOnFirst {
                break;
            }

            state.apply_action(&action);
        }

        Replay {
            result: VerificationResult::from_diagnostics(diagnostics),
            final_state: state,
            steps_run,
        }
    }
}
