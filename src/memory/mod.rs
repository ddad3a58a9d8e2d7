// src/memory/mod.rs

use crate::protocol::{Diagnostic, RepairAttempt};
use serde::Serialize;

/// Append-only record of failed repair attempts. Entries are numbered from 1
/// in the order they were recorded and are never edited or dropped.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct RepairHistory {
    entries: Vec<RepairAttempt>,
}

impl RepairHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a snapshot and returns its attempt number.
    pub fn record(&mut self, actions: &[String], diagnostics: &[Diagnostic]) -> usize {
        let attempt = self.entries.len() + 1;
        self.entries.push(RepairAttempt {
            attempt,
            actions: actions.to_vec(),
            diagnostics: diagnostics.to_vec(),
        });
        attempt
    }

    pub fn attempts(&self) -> &[RepairAttempt] {
        &self.entries
    }

    pub fn latest(&self) -> Option<&RepairAttempt> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One line per attempt, for logs.
    pub fn dump(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                format!(
                    "[attempt {}] {} actions, {} problems",
                    entry.attempt,
                    entry.actions.len(),
                    entry.diagnostics.len()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_attempts(self) -> Vec<RepairAttempt> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Layer;

    #[test]
    fn attempts_are_numbered_in_order() {
        let mut history = RepairHistory::new();
        let problem = Diagnostic::new(Layer::ExternalValidator, "goal not satisfied");

        assert_eq!(history.record(&["(pick-up a)".into()], &[problem.clone()]), 1);
        assert_eq!(history.record(&["(pick-up b)".into()], &[problem]), 2);

        assert_eq!(history.len(), 2);
        assert_eq!(history.attempts()[0].actions, vec!["(pick-up a)"]);
        assert_eq!(history.latest().map(|a| a.attempt), Some(2));
        assert_eq!(
            history.dump(),
            "[attempt 1] 1 actions, 1 problems\n[attempt 2] 1 actions, 1 problems"
        );
    }
}
