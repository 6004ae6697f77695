//! Task graph execution
//!
//! Ready tasks are spawned onto a `JoinSet` and the loop waits for
//! whichever finishes first. Tasks whose worker holds the SQL tool take the
//! gate of their connection for the whole run, so statements on one
//! connection never interleave.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};

use regex::{Captures, Regex};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use super::plan::{Plan, TaskSpec};
use super::state::{OrchestratorState, StateMachine};
use crate::events::TurnEventSender;
use crate::worker::{retry_instructions, Role, RunContext, Worker, WorkerRegistry};

/// First attempt plus one retry
pub const MAX_TASK_ATTEMPTS: u32 = 2;

/// Final status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed,
    Skipped,
}

/// What happened to one task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    pub id: String,
    pub role: Role,
    pub status: TaskStatus,
    pub attempts: u32,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
}

impl TaskReport {
    fn unfinished(task: &TaskSpec, status: TaskStatus, error: String) -> Self {
        Self {
            id: task.id.clone(),
            role: task.role,
            status,
            attempts: 0,
            output: None,
            error: Some(error),
            duration: Duration::ZERO,
        }
    }
}

/// Async mutexes keyed by connection identity
#[derive(Clone, Default)]
pub struct ConnectionGates {
    gates: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ConnectionGates {
    pub fn gate(&self, connection_id: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.entry(connection_id.to_string()).or_default().clone()
    }
}

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}\s]+)\}").unwrap());

/// Replace `{key}` placeholders with their values in a single pass
///
/// Substituted values are never scanned again, and unknown placeholders are
/// left as they are.
pub fn substitute_variables(template: &str, context: &HashMap<String, String>) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| match context.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Worker input: substituted instructions, plus the user request and the
/// dependency outputs that were not already inlined through a placeholder
pub fn build_task_input(
    plan: &Plan,
    task: &TaskSpec,
    query: &str,
    outputs: &HashMap<String, String>,
) -> String {
    let mut context = HashMap::new();
    context.insert("query".to_string(), query.to_string());
    for dep in &task.depends_on {
        if let Some(output) = outputs.get(dep) {
            context.insert(dep.clone(), output.clone());
        }
    }

    let mut input = substitute_variables(&task.input, &context).trim().to_string();
    if !task.input.contains("{query}") {
        input.push_str(&format!("\n\nUser request: {}", query));
    }

    for dep in &task.depends_on {
        let inlined = task.input.contains(&format!("{{{}}}", dep));
        if let (false, Some(output)) = (inlined, outputs.get(dep)) {
            let role = plan
                .task(dep)
                .map_or("worker", |t| t.role.display_name());
            input.push_str(&format!("\n\n## Result of {} ({})\n{}", dep, role, output.trim()));
        }
    }

    input
}

struct TaskOutcome {
    attempts: u32,
    result: Result<String, String>,
    duration: Duration,
}

enum Slot {
    Pending,
    Running,
    Finished(TaskReport),
}

impl Slot {
    fn status(&self) -> Option<TaskStatus> {
        match self {
            Slot::Finished(report) => Some(report.status),
            _ => None,
        }
    }
}

/// Runs one validated plan
pub struct Scheduler<'a> {
    pub registry: &'a WorkerRegistry,
    pub gates: &'a ConnectionGates,
    pub max_parallel: usize,
    pub events: &'a TurnEventSender,
}

impl Scheduler<'_> {
    /// Drain the task graph; reports come back in plan order
    pub async fn run(&self, plan: &Plan, query: &str, machine: &mut StateMachine) -> Vec<TaskReport> {
        let index: HashMap<&str, usize> = plan
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();
        let deps: Vec<Vec<usize>> = plan
            .tasks
            .iter()
            .map(|t| t.depends_on.iter().filter_map(|d| index.get(d.as_str()).copied()).collect())
            .collect();

        let mut slots: Vec<Slot> = plan.tasks.iter().map(|_| Slot::Pending).collect();
        let mut outputs: HashMap<String, String> = HashMap::new();
        let mut running = JoinSet::new();
        let max_parallel = self.max_parallel.max(1);

        loop {
            self.skip_blocked(plan, &deps, &mut slots);

            let ready: Vec<usize> = (0..slots.len())
                .filter(|&i| matches!(slots[i], Slot::Pending))
                .filter(|&i| deps[i].iter().all(|&d| slots[d].status() == Some(TaskStatus::Completed)))
                .collect();

            let capacity = max_parallel.saturating_sub(running.len());
            if !ready.is_empty() && capacity > 0 {
                machine.transition(OrchestratorState::Delegating);
            }

            let mut failed_to_start = false;
            for i in ready.into_iter().take(capacity) {
                let task = &plan.tasks[i];
                let Some(worker) = self.registry.get(task.role) else {
                    let error = format!("no worker registered for {}", task.role);
                    self.events.task_failed(&task.id, &error);
                    slots[i] = Slot::Finished(TaskReport::unfinished(task, TaskStatus::Failed, error));
                    failed_to_start = true;
                    continue;
                };

                let input = build_task_input(plan, task, query, &outputs);
                let gate = worker.sql_connection().map(|id| self.gates.gate(&id));
                let events = self.events.clone();
                let task_id = task.id.clone();

                tracing::debug!(task = %task_id, role = %task.role, "Dispatching task");
                slots[i] = Slot::Running;
                running.spawn(async move {
                    // Inner spawn so a panicking worker still reports its index
                    let handle = tokio::spawn(run_with_retry(worker, task_id, input, gate, events));
                    let outcome = handle.await.unwrap_or_else(|e| TaskOutcome {
                        attempts: 1,
                        result: Err(format!("worker crashed: {}", e)),
                        duration: Duration::ZERO,
                    });
                    (i, outcome)
                });
            }

            if running.is_empty() {
                if failed_to_start {
                    continue;
                }
                break;
            }

            machine.transition(OrchestratorState::AwaitingWorkers);
            match running.join_next().await {
                Some(Ok((i, outcome))) => {
                    let task = &plan.tasks[i];
                    let (status, output, error) = match outcome.result {
                        Ok(output) => {
                            outputs.insert(task.id.clone(), output.clone());
                            (TaskStatus::Completed, Some(output), None)
                        }
                        Err(error) => (TaskStatus::Failed, None, Some(error)),
                    };
                    slots[i] = Slot::Finished(TaskReport {
                        id: task.id.clone(),
                        role: task.role,
                        status,
                        attempts: outcome.attempts,
                        output,
                        error,
                        duration: outcome.duration,
                    });
                }
                Some(Err(e)) => tracing::error!("Task supervisor failed: {}", e),
                None => break,
            }
        }

        slots
            .into_iter()
            .zip(&plan.tasks)
            .map(|(slot, task)| match slot {
                Slot::Finished(report) => report,
                _ => TaskReport::unfinished(task, TaskStatus::Failed, "task did not finish".to_string()),
            })
            .collect()
    }

    /// Mark pending tasks whose dependencies can no longer complete
    fn skip_blocked(&self, plan: &Plan, deps: &[Vec<usize>], slots: &mut [Slot]) {
        loop {
            let blocked = (0..slots.len()).find_map(|i| {
                if !matches!(slots[i], Slot::Pending) {
                    return None;
                }
                deps[i]
                    .iter()
                    .find(|&&d| matches!(slots[d].status(), Some(TaskStatus::Failed | TaskStatus::Skipped)))
                    .map(|&d| (i, d))
            });

            let Some((i, d)) = blocked else { break };
            let task = &plan.tasks[i];
            let error = format!("skipped because '{}' did not complete", plan.tasks[d].id);
            tracing::info!(task = %task.id, "{}", error);
            self.events.task_failed(&task.id, &error);
            slots[i] = Slot::Finished(TaskReport::unfinished(task, TaskStatus::Skipped, error));
        }
    }
}

async fn run_with_retry(
    worker: Arc<Worker>,
    task_id: String,
    input: String,
    gate: Option<Arc<Mutex<()>>>,
    events: TurnEventSender,
) -> TaskOutcome {
    let _guard = match &gate {
        Some(gate) => Some(gate.lock().await),
        None => None,
    };

    let started = Instant::now();
    let role = worker.role();
    let mut ctx = RunContext::new(task_id.clone()).with_events(events.clone());
    let mut attempt = 0;

    loop {
        attempt += 1;
        events.task_started(&task_id, role, attempt);

        let result = worker.run(&input, &ctx).await;
        match result {
            Ok(output) => {
                events.task_completed(&task_id, started.elapsed());
                return TaskOutcome {
                    attempts: attempt,
                    result: Ok(output),
                    duration: started.elapsed(),
                };
            }
            Err(e) if attempt < MAX_TASK_ATTEMPTS => {
                tracing::warn!(task = %task_id, %role, attempt, "Task failed, retrying: {}", e);
                events.task_retry(&task_id, &e.to_string());
                ctx = ctx.with_extra_instructions(retry_instructions(&e.to_string()));
            }
            Err(e) => {
                tracing::warn!(task = %task_id, %role, attempt, "Task failed: {}", e);
                events.task_failed(&task_id, &e.to_string());
                return TaskOutcome {
                    attempts: attempt,
                    result: Err(e.to_string()),
                    duration: started.elapsed(),
                };
            }
        }
    }
}
