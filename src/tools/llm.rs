// src/tools/llm.rs

use crate::domain::DomainTag;
use crate::model::Plan;
use crate::protocol::planner::{GenerationError, PlanRequest, Planner};
use crate::validation::load_plan_json;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "llama3";

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("json block pattern compiles"));

/// Generation collaborator backed by an Ollama-compatible HTTP endpoint.
#[derive(Clone, Debug)]
pub struct OllamaPlanner {
    pub model: String,
    pub endpoint: String,
    pub domain: DomainTag,
    pub timeout: Duration,
}

impl OllamaPlanner {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            domain: DomainTag::default(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_domain(mut self, domain: DomainTag) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn prompt(&self, request: &PlanRequest) -> String {
        let vocabulary = self.domain.vocabulary().join(", ");
        let goal = &request.goal;
        let mut prompt = format!(
            r#"You are a planning assistant.

Produce an action-dependency plan in **strict JSON** for the goal below.

### Constraints:
- Every node has a unique "id", an "action_type" and a "params" object.
- Allowed action types ({domain}): {vocabulary}
- An edge {{"source": "x", "target": "y"}} means x must happen before y.
- Every action must relate to the goal; do not leave isolated nodes.
- Respond with JSON only.

### Output Format (strict JSON):
{{
    "goal_description": "...",
    "nodes": [
        {{ "id": "s1", "action_type": "pick-up", "params": {{ "block": "a" }}, "description": "..." }}
    ],
    "edges": [ {{ "source": "s1", "target": "s2" }} ]
}}

### Goal:
{goal}
"#,
            domain = self.domain,
        );

        if let Some(feedback) = &request.feedback {
            prompt.push_str("\n## Corrections required\n\n");
            prompt.push_str(&feedback.render());
            prompt.push('\n');
        }
        prompt
    }

    fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| GenerationError::Fatal(format!("cannot build HTTP client: {err}")))?;

        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false
        });

        let response = client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(GenerationError::Transient(format!(
                "generation endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(GenerationError::Fatal(format!(
                "generation endpoint returned {status}"
            )));
        }

        let body: Value = response
            .json()
            .map_err(|err| GenerationError::Fatal(format!("Failed to parse JSON: {err}")))?;
        body.get("response")
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string())
            .ok_or_else(|| GenerationError::Fatal("LLM response missing 'response' field".into()))
    }
}

impl Default for OllamaPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

fn classify_transport(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() || err.is_connect() {
        GenerationError::Transient(format!("Request failed: {err}"))
    } else {
        GenerationError::from_message(&format!("Request failed: {err}"))
    }
}

/// Pulls the first JSON object out of a model reply and turns it into a plan.
/// Schema findings are logged; only an undeserializable reply is an error.
pub fn parse_plan_reply(raw: &str, domain: DomainTag) -> Result<Plan, GenerationError> {
    let block = JSON_BLOCK
        .find(raw)
        .map(|m| m.as_str())
        .ok_or_else(|| GenerationError::Fatal("reply contains no JSON object".into()))?;

    let (plan, findings) = load_plan_json(block, domain)
        .map_err(|err| GenerationError::Fatal(format!("reply is not a plan: {err}")))?;
    for finding in &findings {
        warn!("{}", finding.to_diagnostic());
    }
    Ok(plan)
}

impl Planner for OllamaPlanner {
    fn generate_plan(&self, request: &PlanRequest) -> Result<Plan, GenerationError> {
        let prompt = self.prompt(request);
        debug!(
            "requesting {} plan from {} (corrective: {})",
            self.domain,
            self.model,
            request.is_corrective()
        );
        let raw = self.complete(&prompt)?;
        parse_plan_reply(&raw, self.domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::replanner::CorrectiveFeedback;
    use crate::protocol::{Diagnostic, Layer};

    #[test]
    fn replies_with_surrounding_chatter_still_parse() {
        let raw = r#"Sure! Here is the plan:
{"goal_description": "stack a on b",
 "nodes": [{"id": "s1", "action_type": "pick-up", "params": {"block": "a"}},
           {"id": "s2", "action_type": "stack", "params": {"block": "a", "target": "b"}}],
 "edges": [{"source": "s1", "target": "s2"}]}
Let me know if you need more."#;
        let plan = parse_plan_reply(raw, DomainTag::Blocksworld).unwrap();
        assert_eq!(plan.node_ids(), vec!["s1", "s2"]);
        assert_eq!(plan.edges[0].relationship, "depends_on");
    }

    #[test]
    fn replies_without_a_plan_are_fatal() {
        let error = parse_plan_reply("I cannot help with that.", DomainTag::Blocksworld).unwrap_err();
        assert!(!error.is_transient());

        let error = parse_plan_reply(r#"{"nodes": []}"#, DomainTag::Blocksworld).unwrap_err();
        assert!(error.to_string().contains("goal_description"));
    }

    #[test]
    fn corrective_requests_carry_rendered_feedback() {
        let planner = OllamaPlanner::default();
        let feedback = CorrectiveFeedback {
            previous_plan: Plan::new("g"),
            previous_actions: vec!["(stack a b)".into()],
            diagnostics: vec![Diagnostic::new(Layer::Simulator, "cannot stack a")],
            history: Vec::new(),
        };
        let initial = planner.prompt(&PlanRequest::initial("stack a on b"));
        let corrective = planner.prompt(&PlanRequest::corrective("stack a on b", feedback));

        assert!(initial.contains("pick-up, put-down, stack, unstack"));
        assert!(!initial.contains("Corrections required"));
        assert!(corrective.contains("1. (stack a b)"));
        assert!(corrective.contains("cannot stack a"));
    }

    #[test]
    fn unreachable_endpoint_is_transient() {
        let planner = OllamaPlanner::default()
            .with_endpoint("http://127.0.0.1:9/api/generate")
            .with_timeout(Duration::from_secs(2));
        let error = planner
            .generate_plan(&PlanRequest::initial("anything"))
            .unwrap_err();
        assert!(error.is_transient(), "{error}");
    }
}
