use crate::model::Plan;
use crate::protocol::{Diagnostic, RepairAttempt};
use serde::Serialize;

/// Everything the corrective generator gets to see after a semantic failure.
#[derive(Clone, Debug, Serialize)]
pub struct CorrectiveFeedback {
    pub previous_plan: Plan,
    pub previous_actions: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    /// Every failed attempt so far, oldest first, including the latest one.
    pub history: Vec<RepairAttempt>,
}

impl CorrectiveFeedback {
    pub fn render(&self) -> String {
        let actions = render_actions(&self.previous_actions);
        let diagnostics = self
            .diagnostics
            .iter()
            .map(|diagnostic| format!("- {}", diagnostic))
            .collect::<Vec<_>>()
            .join("\n");

        let history = self
            .history
            .iter()
            .map(|attempt| {
                let errors = attempt
                    .diagnostics
                    .iter()
                    .map(|diagnostic| format!("    - {}", diagnostic.message))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "[attempt {}] {}\n{}",
                    attempt.attempt,
                    attempt.actions.join(" "),
                    errors
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "### Previous plan\n\n{actions}\n\n### Problems found\n\n{diagnostics}\n\n### Earlier attempts\n\n{history}\n\nDo not repeat an action sequence listed above."
        )
    }
}

fn render_actions(actions: &[String]) -> String {
    if actions.is_empty() {
        return "(no actions)".to_string();
    }
    actions
        .iter()
        .enumerate()
        .map(|(i, action)| format!("{}. {}", i + 1, action))
        .collect::<Vec<_>>()
        .join("\n")
}
