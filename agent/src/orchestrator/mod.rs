//! Query orchestration
//!
//! A planner call turns the user's query into a validated task graph, the
//! scheduler runs it on the session's workers, and the sink outputs are
//! merged into one answer.

mod engine;
mod plan;
mod prompts;
mod scheduler;
mod state;

pub use engine::{aggregate, Orchestrator, OrchestratorOutcome};
pub use plan::{Plan, PlanError, TaskSpec};
pub use prompts::planner_prompt;
pub use scheduler::{
    build_task_input, substitute_variables, ConnectionGates, TaskReport, TaskStatus,
    MAX_TASK_ATTEMPTS,
};
pub use state::{OrchestratorState, StateMachine};
