use colored::Colorize;
use plan_repair::config::OrchestratorConfig;
use plan_repair::domain::blocksworld::WorldState;
use plan_repair::error::PlanLoadError;
use plan_repair::model::{ActionNode, Plan};
use plan_repair::orchestrator::{PlanningTask, RepairOrchestrator};
use plan_repair::tools::OllamaPlanner;
use plan_repair::validation::load_plan_json;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Two disconnected fragments: the structural layer rejects it and auto-repair
/// joins both to the START/END anchors.
fn sample_plan() -> Plan {
    Plan::new("stack a on b")
        .with_node(ActionNode::new("s1", "pick-up").with_param("block", "a"))
        .with_node(
            ActionNode::new("s2", "stack")
                .with_param("block", "a")
                .with_param("target", "b"),
        )
}

fn sample_state() -> WorldState {
    WorldState::new()
        .with_on_table("a")
        .with_on_table("b")
        .with_clear("a")
        .with_clear("b")
}

fn read_file(path: &Path) -> Result<String, PlanLoadError> {
    std::fs::read_to_string(path).map_err(|source| PlanLoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = match OrchestratorConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", "ERROR:".red().bold(), err);
            return ExitCode::FAILURE;
        }
    };

    // Usage: plan-repair [plan.json [state.json]]
    let args: Vec<String> = std::env::args().skip(1).collect();
    let loaded = match args.first() {
        None => Ok((sample_plan(), Some(sample_state()))),
        Some(plan_path) => read_file(Path::new(plan_path))
            .and_then(|raw| load_plan_json(&raw, config.domain))
            .and_then(|(plan, findings)| {
                for finding in findings {
                    println!("{} {}", "WARNING:".yellow(), finding.to_diagnostic());
                }
                let state = match args.get(1) {
                    Some(state_path) => Some(serde_json::from_str::<WorldState>(&read_file(
                        Path::new(state_path),
                    )?)?),
                    None => None,
                };
                Ok((plan, state))
            }),
    };
    let (plan, state) = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            eprintln!("{} {}", "ERROR:".red().bold(), err);
            return ExitCode::FAILURE;
        }
    };

    let mut task = PlanningTask::new(&plan.goal_description);
    if let Some(state) = state {
        task = task.with_initial_state(state);
    }

    let planner = OllamaPlanner::default().with_domain(config.domain);
    let orchestrator = RepairOrchestrator::new(planner, config);
    let outcome = orchestrator.assess(plan, &task);

    println!("{}", "--- VERIFICATION ---".cyan().bold());
    print!("{}", outcome.report.summary());

    println!("{}", "--- PLAN ---".cyan().bold());
    match outcome.plan.to_json() {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("{} {}", "ERROR:".red().bold(), err),
    }

    if outcome.valid {
        println!("{}", "VALID".green().bold());
        ExitCode::SUCCESS
    } else {
        println!("{}", "INVALID".red().bold());
        ExitCode::FAILURE
    }
}
