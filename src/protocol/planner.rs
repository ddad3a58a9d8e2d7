// src/protocol/planner.rs

use crate::model::Plan;
use crate::protocol::replanner::CorrectiveFeedback;
use serde::Serialize;

/// Signals in a failure message that mark it as worth retrying.
const TRANSIENT_SIGNALS: &[&str] = &[
    "connection",
    "could not connect",
    "timeout",
    "timed out",
    "rate limit",
    "rate-limit",
    "too many requests",
    "429",
    "temporarily unavailable",
    "internal server error",
];

/// What the generation collaborator is asked for.
#[derive(Clone, Debug, Serialize)]
pub struct PlanRequest {
    pub goal: String,
    pub feedback: Option<CorrectiveFeedback>,
}

impl PlanRequest {
    pub fn initial(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            feedback: None,
        }
    }

    pub fn corrective(goal: &str, feedback: CorrectiveFeedback) -> Self {
        Self {
            goal: goal.to_string(),
            feedback: Some(feedback),
        }
    }

    pub fn is_corrective(&self) -> bool {
        self.feedback.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Connectivity, timeout or rate-limit trouble upstream.
    #[error("transient generation failure: {0}")]
    Transient(String),
    #[error("generation failed: {0}")]
    Fatal(String),
}

impl GenerationError {
    /// Classifies a free-text failure by looking for transient signals.
    pub fn from_message(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if TRANSIENT_SIGNALS
            .iter()
            .any(|signal| lowered.contains(signal))
        {
            GenerationError::Transient(message.to_string())
        } else {
            GenerationError::Fatal(message.to_string())
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }
}

/// The generation collaborator: turns a goal (plus optional corrective
/// feedback) into a candidate plan.
pub trait Planner: Send + Sync {
    fn generate_plan(&self, request: &PlanRequest) -> Result<Plan, GenerationError>;
}

impl<P: Planner + ?Sized> Planner for Box<P> {
    fn generate_plan(&self, request: &PlanRequest) -> Result<Plan, GenerationError> {
        (**self).generate_plan(request)
    }
}

impl<P: Planner + ?Sized> Planner for &P {
    fn generate_plan(&self, request: &PlanRequest) -> Result<Plan, GenerationError> {
        (**self).generate_plan(request)
    }
}
