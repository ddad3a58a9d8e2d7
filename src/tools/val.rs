// src/tools/val.rs

use crate::config::OrchestratorConfig;
use crate::protocol::{Diagnostic, Layer};
use crate::tools::PlanValidator;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::LazyLock;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// errno for "Exec format error": the executable was built for another host.
const ENOEXEC: i32 = 8;
/// errno for "Text file busy": the executable is still open for writing.
const ETXTBSY: i32 = 26;
const SPAWN_RETRIES: usize = 3;

const SUCCESS_MARKER: &str = "Plan executed successfully";
const FAILURE_MARKERS: &[&str] = &[
    "Goal not satisfied",
    "Plan invalid",
    "Plan failed",
    "Bad plan",
    "Error in type-checking",
    "Bad problem file",
    "Bad domain file",
];
const TYPE_ERROR_MARKERS: &[&str] = &[
    "Error in type-checking",
    "Bad problem file",
    "Bad domain file",
    "Bad plan",
];
const PRECONDITION_MARKERS: &[&str] = &[
    "Plan failed",
    "unsatisfied precondition",
    "Precondition not satisfied",
];
const GOAL_MARKERS: &[&str] = &["Goal not satisfied", "Plan invalid"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidatorVerdict {
    Valid,
    #[serde(rename = "precondition-violated-at-action")]
    PreconditionViolated,
    #[serde(rename = "goal-unreached-after-execution")]
    GoalUnreached,
    TypeError,
    ToolUnavailable,
    ToolIncompatible,
    Timeout,
    Indeterminate,
}

impl ValidatorVerdict {
    /// Verdicts about the plan itself, as opposed to trouble running the tool.
    pub fn is_semantic(self) -> bool {
        matches!(
            self,
            ValidatorVerdict::Valid
                | ValidatorVerdict::PreconditionViolated
                | ValidatorVerdict::GoalUnreached
                | ValidatorVerdict::TypeError
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub verdict: ValidatorVerdict,
    pub diagnostics: Vec<Diagnostic>,
    /// Full tool output, kept for auditing. Never fed back to the generator.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_output: String,
}

impl ValidationOutcome {
    pub fn valid(raw_output: String) -> Self {
        Self {
            verdict: ValidatorVerdict::Valid,
            diagnostics: Vec::new(),
            raw_output,
        }
    }

    pub fn failure(verdict: ValidatorVerdict, message: impl Into<String>) -> Self {
        Self {
            verdict,
            diagnostics: vec![Diagnostic::new(Layer::ExternalValidator, message)],
            raw_output: String::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.verdict == ValidatorVerdict::Valid
    }
}

/// One targeted extraction pattern for the validator's free-text report.
struct AdviceRule {
    pattern: Regex,
    render: fn(&Captures<'_>) -> Diagnostic,
    /// Contributes only when every rule before it came up empty.
    fallback: bool,
}

impl AdviceRule {
    fn new(pattern: &str, render: fn(&Captures<'_>) -> Diagnostic) -> Self {
        Self {
            pattern: Regex::new(pattern).expect("advice pattern compiles"),
            render,
            fallback: false,
        }
    }

    fn fallback(mut self) -> Self {
        self.fallback = true;
        self
    }
}

fn advice(message: String) -> Diagnostic {
    Diagnostic::new(Layer::ExternalValidator, message)
}

/// Most specific first.
static ADVICE_RULES: LazyLock<Vec<AdviceRule>> = LazyLock::new(|| {
    vec![
        AdviceRule::new(r"\(Set (\([^()\n]+\)) to (true|false)\)", |c| {
            advice(format!("make {} {}", &c[1], &c[2]))
        }),
        AdviceRule::new(
            r"(\([^()\n]+\)) has an unsatisfied precondition at time (\d+)",
            |c| {
                let message = format!("{} has an unsatisfied precondition", &c[1]);
                match c[2].parse::<usize>() {
                    Ok(step) => Diagnostic::at_step(Layer::ExternalValidator, step, message),
                    Err(_) => advice(message),
                }
            },
        ),
        AdviceRule::new(
            r"Plan failed because of unsatisfied precondition in:\s*\n\s*(\([^\n]+?\))",
            |c| advice(format!("unsatisfied precondition in action {}", c[1].trim())),
        ),
        AdviceRule::new(
            r"(?s)Plan Repair Advice:\s*\n(.*?)(?:\n\s*\n|\nFailed plans:|\z)",
            |c| {
                let block = c[1]
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .collect::<Vec<_>>()
                    .join("; ");
                advice(format!("repair advice: {}", block))
            },
        )
        .fallback(),
        AdviceRule::new(r"Goal not satisfied", |_| {
            advice("plan executed but goal not satisfied".to_string())
        }),
        AdviceRule::new(r"Precondition not satisfied: (.+)", |c| {
            advice(format!("precondition violation: {}", c[1].trim()))
        }),
        AdviceRule::new(r"Error in type-checking", |_| {
            advice("type-checking error: action parameters have invalid types".to_string())
        }),
        AdviceRule::new(r"Invalid action: (.+)", |c| {
            advice(format!("invalid action: {}", c[1].trim()))
        }),
        AdviceRule::new(r"Type error: (.+)", |c| {
            advice(format!("type error: {}", c[1].trim()))
        }),
    ]
});

/// Pulls remediation diagnostics out of a validator report. Falls back to
/// the first line mentioning an error or failure, then to a generic note.
pub fn extract_advice(output: &str) -> Vec<Diagnostic> {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();

    for rule in ADVICE_RULES.iter() {
        if rule.fallback && !diagnostics.is_empty() {
            continue;
        }
        for captures in rule.pattern.captures_iter(output) {
            let diagnostic = (rule.render)(&captures);
            if !diagnostics.contains(&diagnostic) {
                diagnostics.push(diagnostic);
            }
        }
    }

    if diagnostics.is_empty() {
        let generic = output.lines().map(str::trim).find(|line| {
            let lowered = line.to_lowercase();
            lowered.contains("error") || lowered.contains("fail")
        });
        diagnostics.push(advice(
            generic
                .map(str::to_string)
                .unwrap_or_else(|| "plan validation failed (reason unclear)".to_string()),
        ));
    }

    diagnostics
}

fn contains_any(output: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| output.contains(marker))
}

/// Classifies a validator report. `valid` needs the success marker and no
/// failure marker anywhere in the same output.
pub fn classify_output(output: &str) -> ValidationOutcome {
    if output.contains(SUCCESS_MARKER) && !contains_any(output, FAILURE_MARKERS) {
        return ValidationOutcome::valid(output.to_string());
    }

    let verdict = if contains_any(output, TYPE_ERROR_MARKERS) {
        ValidatorVerdict::TypeError
    } else if contains_any(output, PRECONDITION_MARKERS) {
        ValidatorVerdict::PreconditionViolated
    } else if contains_any(output, GOAL_MARKERS) {
        ValidatorVerdict::GoalUnreached
    } else {
        ValidatorVerdict::Indeterminate
    };

    ValidationOutcome {
        verdict,
        diagnostics: extract_advice(output),
        raw_output: output.to_string(),
    }
}

/// Runs a VAL-style executable as `<exe> -v <domain> <problem> <plan>`.
#[derive(Clone, Debug)]
pub struct ValValidator {
    executable: PathBuf,
    timeout: Duration,
}

impl ValValidator {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `None` when the configuration names no validator executable.
    pub fn from_config(config: &OrchestratorConfig) -> Option<Self> {
        config
            .validator_path
            .as_ref()
            .map(|path| Self::new(path.clone()).with_timeout(config.validator_timeout()))
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn write_plan(actions: &[String]) -> io::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("plan_")
            .suffix(".pddl")
            .tempfile()?;
        for action in actions {
            let line = action.trim();
            if line.starts_with('(') {
                writeln!(file, "{}", line)?;
            } else {
                writeln!(file, "({})", line)?;
            }
        }
        file.flush()?;
        Ok(file)
    }

    fn spawn(&self, domain: &Path, problem: &Path, plan: &Path) -> io::Result<Child> {
        let mut attempt = 0;
        loop {
            let spawned = Command::new(&self.executable)
                .arg("-v")
                .arg(domain)
                .arg(problem)
                .arg(plan)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn();
            match spawned {
                Err(error) if error.raw_os_error() == Some(ETXTBSY) && attempt < SPAWN_RETRIES => {
                    attempt += 1;
                    thread::sleep(POLL_INTERVAL);
                }
                other => return other,
            }
        }
    }

    fn spawn_failure(&self, error: io::Error) -> ValidationOutcome {
        let path = self.executable.display();
        let outcome = if error.kind() == io::ErrorKind::NotFound {
            ValidationOutcome::failure(
                ValidatorVerdict::ToolUnavailable,
                format!("validator executable not found: {}", path),
            )
        } else if error.kind() == io::ErrorKind::PermissionDenied {
            ValidationOutcome::failure(
                ValidatorVerdict::ToolUnavailable,
                format!("validator executable not runnable: {} ({})", path, error),
            )
        } else if error.raw_os_error() == Some(ENOEXEC) {
            ValidationOutcome::failure(
                ValidatorVerdict::ToolIncompatible,
                format!(
                    "validator executable incompatible with this host (exec format error): {}",
                    path
                ),
            )
        } else {
            ValidationOutcome::failure(
                ValidatorVerdict::Indeterminate,
                format!("could not start validator {}: {}", path, error),
            )
        };
        warn!("validator launch failed: {}", error);
        outcome
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<String>> {
    source.map(|mut reader| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = reader.read_to_end(&mut buffer);
            String::from_utf8_lossy(&buffer).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Polls until the child exits or the deadline passes; kills it on timeout.
fn wait_with_deadline(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

impl PlanValidator for ValValidator {
    fn name(&self) -> &str {
        "val"
    }

    fn validate(&self, domain: &Path, problem: &Path, actions: &[String]) -> ValidationOutcome {
        if actions.is_empty() {
            return ValidationOutcome::failure(
                ValidatorVerdict::Indeterminate,
                "empty action sequence; validator not invoked",
            );
        }

        // Removed when `plan_file` drops, on every return path below.
        let plan_file = match Self::write_plan(actions) {
            Ok(file) => file,
            Err(error) => {
                return ValidationOutcome::failure(
                    ValidatorVerdict::Indeterminate,
                    format!("could not write plan artifact: {}", error),
                );
            }
        };

        debug!(
            "invoking validator {} on {} actions",
            self.executable.display(),
            actions.len()
        );
        let mut child = match self.spawn(domain, problem, plan_file.path()) {
            Ok(child) => child,
            Err(error) => return self.spawn_failure(error),
        };

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                // Reader threads are left behind: a grandchild may still hold the pipes.
                warn!(
                    "validator {} timed out after {:?}",
                    self.executable.display(),
                    self.timeout
                );
                return ValidationOutcome::failure(
                    ValidatorVerdict::Timeout,
                    format!("validator timed out after {}s", self.timeout.as_secs_f64()),
                );
            }
            Err(error) => {
                let _ = child.kill();
                return ValidationOutcome::failure(
                    ValidatorVerdict::Indeterminate,
                    format!("lost track of validator process: {}", error),
                );
            }
        };

        let output = format!("{}{}", collect(stdout), collect(stderr));
        let mut outcome = classify_output(&output);

        if !status.success() {
            settle_failed_exit(&mut outcome, status.code());
        }

        debug!("validator verdict: {:?}", outcome.verdict);
        outcome
    }
}

/// A validator that did not exit cleanly never vouches for a plan, whatever
/// it printed first. Semantic verdicts keep their diagnostics.
fn settle_failed_exit(outcome: &mut ValidationOutcome, code: Option<i32>) {
    if outcome.verdict == ValidatorVerdict::Valid {
        warn!("validator reported success but exited abnormally");
        outcome.verdict = ValidatorVerdict::Indeterminate;
    }
    if outcome.verdict == ValidatorVerdict::Indeterminate {
        let exit = code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string());
        outcome.diagnostics.push(Diagnostic::new(
            Layer::ExternalValidator,
            format!("validator exited with status {}", exit),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRECONDITION_REPORT: &str = "\
Checking plan: plan_x.pddl
Plan to validate:

Plan size: 2
1: (pick-up b)
2: (stack b a)

Plan Validation details
-----------------------
Checking next happening (time 1)
Plan failed because of unsatisfied precondition in:
(pick-up b)
Plan failed to execute

Plan Repair Advice:

(pick-up b) has an unsatisfied precondition at time 1
(Set (clear b) to true)
(Set (handempty) to true)

Failed plans:
 plan_x.pddl 1
";

    #[test]
    fn success_needs_marker_and_no_failure_marker() {
        let clean = "Plan executed successfully - checking goal\nPlan valid\nFinal value: 2\n";
        assert!(classify_output(clean).is_valid());

        let contradictory = "Plan executed successfully - checking goal\nGoal not satisfied\nPlan invalid\n";
        let outcome = classify_output(contradictory);
        assert_eq!(outcome.verdict, ValidatorVerdict::GoalUnreached);
        assert_eq!(
            outcome.diagnostics[0].message,
            "plan executed but goal not satisfied"
        );
    }

    #[test]
    fn precondition_reports_yield_specific_advice() {
        let outcome = classify_output(PRECONDITION_REPORT);
        assert_eq!(outcome.verdict, ValidatorVerdict::PreconditionViolated);
        let messages: Vec<&str> = outcome
            .diagnostics
            .iter()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            messages,
            vec![
                "make (clear b) true",
                "make (handempty) true",
                "(pick-up b) has an unsatisfied precondition",
                "unsatisfied precondition in action (pick-up b)",
            ]
        );
        assert_eq!(outcome.diagnostics[2].step, Some(1));
        assert!(outcome.raw_output.contains("Plan Repair Advice"));
    }

    #[test]
    fn advice_block_is_used_when_nothing_finer_matches() {
        let report = "Plan failed to execute\nPlan Repair Advice:\nmove b somewhere else\n\nFailed plans:\n";
        let diagnostics = extract_advice(report);
        assert_eq!(
            diagnostics[0].message,
            "repair advice: move b somewhere else"
        );
    }

    #[test]
    fn type_errors_are_their_own_kind() {
        for report in [
            "Error in type-checking!\nBad plan description!\n",
            "Bad problem file!\n",
        ] {
            let outcome = classify_output(report);
            assert_eq!(outcome.verdict, ValidatorVerdict::TypeError, "{report}");
            assert!(!outcome.diagnostics.is_empty());
        }
    }

    #[test]
    fn unknown_output_falls_back_to_first_failure_line_then_generic() {
        let outcome = classify_output("parsing...\nsomething Failed badly\nbye\n");
        assert_eq!(outcome.verdict, ValidatorVerdict::Indeterminate);
        assert_eq!(outcome.diagnostics[0].message, "something Failed badly");

        let silent = classify_output("");
        assert_eq!(silent.verdict, ValidatorVerdict::Indeterminate);
        assert_eq!(
            silent.diagnostics[0].message,
            "plan validation failed (reason unclear)"
        );
    }

    #[test]
    fn empty_action_sequences_never_reach_the_tool() {
        let validator = ValValidator::new("/definitely/not/here/validate");
        let outcome = validator.validate(Path::new("d.pddl"), Path::new("p.pddl"), &[]);
        assert_eq!(outcome.verdict, ValidatorVerdict::Indeterminate);
        assert!(outcome.diagnostics[0].message.contains("not invoked"));
    }

    #[test]
    fn abnormal_exit_overrides_a_printed_success() {
        let mut outcome = ValidationOutcome::valid("Plan valid".to_string());
        settle_failed_exit(&mut outcome, None);
        assert_eq!(outcome.verdict, ValidatorVerdict::Indeterminate);
        assert_eq!(outcome.diagnostics[0].message, "validator exited with status signal");

        let mut outcome = ValidationOutcome::failure(ValidatorVerdict::GoalUnreached, "goal not satisfied");
        settle_failed_exit(&mut outcome, Some(1));
        assert_eq!(outcome.verdict, ValidatorVerdict::GoalUnreached);
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn missing_executable_is_tool_unavailable() {
        let validator = ValValidator::new("/definitely/not/here/validate");
        let outcome = validator.validate(
            Path::new("d.pddl"),
            Path::new("p.pddl"),
            &["(pick-up a)".to_string()],
        );
        assert_eq!(outcome.verdict, ValidatorVerdict::ToolUnavailable);
        assert!(outcome.diagnostics[0].message.contains("not found"));
    }

    #[test]
    fn launch_errors_keep_their_own_kinds() {
        let validator = ValValidator::new("/opt/val/validate");

        let foreign = validator.spawn_failure(io::Error::from_raw_os_error(ENOEXEC));
        assert_eq!(foreign.verdict, ValidatorVerdict::ToolIncompatible);
        assert!(foreign.diagnostics[0].message.contains("exec format error"));

        let locked = validator.spawn_failure(io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(locked.verdict, ValidatorVerdict::ToolUnavailable);

        let other = validator.spawn_failure(io::Error::other("fork failed"));
        assert_eq!(other.verdict, ValidatorVerdict::Indeterminate);
        assert!(other.diagnostics[0].message.contains("fork failed"));
    }

    #[test]
    fn verdicts_serialize_in_kebab_case() {
        assert_eq!(
            serde_json::to_string(&ValidatorVerdict::PreconditionViolated).unwrap(),
            "\"precondition-violated-at-action\""
        );
        assert_eq!(
            serde_json::to_string(&ValidatorVerdict::ToolIncompatible).unwrap(),
            "\"tool-incompatible\""
        );
    }
}
