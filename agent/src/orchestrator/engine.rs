//! Orchestrator
//!
//! Runs one turn through the state machine: plan, delegate, aggregate.
//! Failures inside a turn never escape as errors; they shape the answer.

use std::collections::HashSet;
use std::sync::Arc;

use super::plan::Plan;
use super::prompts::{plan_rejected, planner_prompt, planner_request};
use super::scheduler::{ConnectionGates, Scheduler, TaskReport, TaskStatus};
use super::state::{OrchestratorState, StateMachine};
use crate::config::OrchestratorConfig;
use crate::events::TurnEventSender;
use crate::llm::{ChatMessage, ChatRequest, Llm};
use crate::session::ConversationTurn;
use crate::worker::WorkerRegistry;

const APOLOGY: &str = "I'm sorry, I couldn't complete your request.";

/// Result of one orchestrated turn
#[derive(Debug, Clone)]
pub struct OrchestratorOutcome {
    /// `Done` or `Failed`
    pub state: OrchestratorState,
    pub answer: String,
    pub plan: Plan,
    /// True when the planner's output was unusable
    pub fallback_plan: bool,
    /// One report per plan task, in plan order
    pub reports: Vec<TaskReport>,
    /// Every state visited, starting with `Received`
    pub transitions: Vec<OrchestratorState>,
}

/// Coordinates the workers of one session
pub struct Orchestrator {
    llm: Arc<dyn Llm>,
    registry: Arc<WorkerRegistry>,
    dialect: String,
    config: OrchestratorConfig,
    gates: ConnectionGates,
    events: TurnEventSender,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn Llm>,
        registry: Arc<WorkerRegistry>,
        dialect: impl Into<String>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            llm,
            registry,
            dialect: dialect.into(),
            config,
            gates: ConnectionGates::default(),
            events: TurnEventSender::none(),
        }
    }

    /// Emit turn events on this sender
    pub fn with_event_sender(mut self, events: TurnEventSender) -> Self {
        self.events = events;
        self
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Process one user query
    ///
    /// `history` is the session's conversation so far; only the most recent
    /// `history_turns` entries reach the planner.
    pub async fn process(&self, query: &str, history: &[ConversationTurn]) -> OrchestratorOutcome {
        let mut machine = StateMachine::new(self.events.clone());
        tracing::info!(query = %query, "Processing query");

        machine.transition(OrchestratorState::Decomposing);
        let recent = &history[history.len().saturating_sub(self.config.history_turns)..];
        let (plan, fallback_plan) = self.decompose(query, recent).await;
        self.events.plan_ready(plan.tasks.len(), fallback_plan);

        let reports = if plan.tasks.is_empty() {
            Vec::new()
        } else {
            let scheduler = Scheduler {
                registry: &self.registry,
                gates: &self.gates,
                max_parallel: self.config.max_parallel_tasks,
                events: &self.events,
            };
            scheduler.run(&plan, query, &mut machine).await
        };

        machine.transition(OrchestratorState::Aggregating);
        let (state, answer) = aggregate(&plan, &reports);
        machine.transition(state);

        tracing::info!(
            state = %state,
            tasks = reports.len(),
            failed = reports.iter().filter(|r| r.status != TaskStatus::Completed).count(),
            "Turn finished"
        );

        OrchestratorOutcome {
            state,
            answer,
            plan,
            fallback_plan,
            reports,
            transitions: machine.into_history(),
        }
    }

    /// Ask the planner for a valid plan, feeding validation errors back
    async fn decompose(&self, query: &str, history: &[ConversationTurn]) -> (Plan, bool) {
        let available = self.registry.roles();
        let mut messages = vec![
            ChatMessage::system(planner_prompt(&self.dialect, &available)),
            ChatMessage::user(planner_request(query, history)),
        ];

        for attempt in 1..=self.config.max_plan_attempts {
            let request = ChatRequest {
                model: self.config.planner_model.clone(),
                messages: messages.clone(),
                tools: Vec::new(),
                temperature: Some(self.config.planner_temperature),
            };

            let reply = match self.llm.chat(&request).await {
                Ok(response) => response.content,
                Err(e) => {
                    tracing::warn!(attempt, "Planner call failed: {:#}", e);
                    self.events.error(&format!("Planner call failed: {}", e));
                    break;
                }
            };

            match Plan::parse(&reply).and_then(|plan| plan.validate(&available).map(|_| plan)) {
                Ok(plan) => {
                    tracing::info!(attempt, tasks = plan.tasks.len(), "Plan accepted");
                    return (plan, false);
                }
                Err(e) => {
                    tracing::warn!(attempt, "Plan rejected: {}", e);
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(plan_rejected(&e.to_string())));
                }
            }
        }

        tracing::warn!("No usable plan, falling back to a single database manager task");
        (Plan::fallback(), true)
    }
}

/// Merge sink outputs in topological order
///
/// Fails only when no sink produced output. Otherwise every failed or
/// skipped task is listed as a caveat under the answer.
pub fn aggregate(plan: &Plan, reports: &[TaskReport]) -> (OrchestratorState, String) {
    if plan.tasks.is_empty() {
        return match plan.answer.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
            Some(answer) => (OrchestratorState::Done, answer.to_string()),
            None => (OrchestratorState::Failed, APOLOGY.to_string()),
        };
    }

    let order = plan
        .topological_order()
        .unwrap_or_else(|_| (0..plan.tasks.len()).collect());
    let sinks: HashSet<usize> = plan.sinks().into_iter().collect();

    let sections: Vec<&str> = order
        .iter()
        .filter(|&&i| sinks.contains(&i))
        .filter_map(|&i| reports.get(i))
        .filter(|r| r.status == TaskStatus::Completed)
        .filter_map(|r| r.output.as_deref())
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .collect();

    let problems: Vec<String> = reports
        .iter()
        .filter(|r| r.status != TaskStatus::Completed)
        .map(describe_problem)
        .collect();

    if sections.is_empty() {
        let mut apology = APOLOGY.to_string();
        if !problems.is_empty() {
            apology.push_str("\n\nWhat went wrong:\n");
            apology.push_str(&problems.join("\n"));
        }
        return (OrchestratorState::Failed, apology);
    }

    let mut answer = sections.join("\n\n");
    if !problems.is_empty() {
        answer.push_str("\n\n---\n\n**Note:** parts of this request could not be completed:\n");
        answer.push_str(&problems.join("\n"));
    }
    (OrchestratorState::Done, answer)
}

fn describe_problem(report: &TaskReport) -> String {
    let error = report.error.as_deref().unwrap_or("no output");
    match report.status {
        TaskStatus::Skipped => format!(
            "- {} task '{}' was {}",
            report.role.display_name(),
            report.id,
            error
        ),
        _ => format!(
            "- {} task '{}' failed: {}",
            report.role.display_name(),
            report.id,
            error
        ),
    }
}
