//! Turn events for real-time visibility
//!
//! The orchestrator and its workers emit these while a turn is processed.
//! The CLI prints them in verbose mode; tests use them to observe retries
//! and state transitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::orchestrator::OrchestratorState;
use crate::worker::Role;

/// Events emitted while a turn is processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// The orchestrator moved to a new state
    StateChanged { state: OrchestratorState },

    /// A plan was accepted
    PlanReady {
        tasks: usize,
        /// True when the planner output was unusable and the single-task
        /// fallback plan is used instead
        fallback: bool,
    },

    /// A worker attempt is starting
    TaskStarted {
        task_id: String,
        role: Role,
        attempt: u32,
    },

    /// Worker tool-loop iteration
    Iteration { task_id: String, number: usize },

    /// SQL statement about to run
    ToolStart { task_id: String, statement: String },

    /// SQL statement finished
    ToolComplete {
        task_id: String,
        success: bool,
        rows: Option<usize>,
        #[serde(with = "duration_millis")]
        duration: Duration,
    },

    /// A failed attempt is being retried with adjusted instructions
    TaskRetry { task_id: String, reason: String },

    /// Task finished with output
    TaskCompleted {
        task_id: String,
        #[serde(with = "duration_millis")]
        duration: Duration,
    },

    /// Task gave up, or was skipped because a dependency failed
    TaskFailed { task_id: String, error: String },

    /// An error not tied to a single task
    Error { message: String },
}

/// Serialize Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Sender for turn events
pub type EventSender = mpsc::UnboundedSender<TurnEvent>;

/// Receiver for turn events
pub type EventReceiver = mpsc::UnboundedReceiver<TurnEvent>;

/// Create a new event channel
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Helper for sending events with a consistent API
#[derive(Clone, Default)]
pub struct TurnEventSender {
    sender: Option<EventSender>,
}

impl TurnEventSender {
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// Create a no-op sender (events are discarded)
    pub fn none() -> Self {
        Self { sender: None }
    }

    pub fn is_active(&self) -> bool {
        self.sender.is_some()
    }

    /// Send an event (silently dropped if nobody listens)
    pub fn send(&self, event: TurnEvent) {
        if let Some(ref sender) = self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn state_changed(&self, state: OrchestratorState) {
        self.send(TurnEvent::StateChanged { state });
    }

    pub fn plan_ready(&self, tasks: usize, fallback: bool) {
        self.send(TurnEvent::PlanReady { tasks, fallback });
    }

    pub fn task_started(&self, task_id: &str, role: Role, attempt: u32) {
        self.send(TurnEvent::TaskStarted {
            task_id: task_id.to_string(),
            role,
            attempt,
        });
    }

    pub fn iteration(&self, task_id: &str, number: usize) {
        self.send(TurnEvent::Iteration {
            task_id: task_id.to_string(),
            number,
        });
    }

    pub fn tool_start(&self, task_id: &str, statement: &str) {
        self.send(TurnEvent::ToolStart {
            task_id: task_id.to_string(),
            statement: statement.to_string(),
        });
    }

    pub fn tool_complete(&self, task_id: &str, success: bool, rows: Option<usize>, duration: Duration) {
        self.send(TurnEvent::ToolComplete {
            task_id: task_id.to_string(),
            success,
            rows,
            duration,
        });
    }

    pub fn task_retry(&self, task_id: &str, reason: &str) {
        self.send(TurnEvent::TaskRetry {
            task_id: task_id.to_string(),
            reason: reason.to_string(),
        });
    }

    pub fn task_completed(&self, task_id: &str, duration: Duration) {
        self.send(TurnEvent::TaskCompleted {
            task_id: task_id.to_string(),
            duration,
        });
    }

    pub fn task_failed(&self, task_id: &str, error: &str) {
        self.send(TurnEvent::TaskFailed {
            task_id: task_id.to_string(),
            error: error.to_string(),
        });
    }

    pub fn error(&self, message: &str) {
        self.send(TurnEvent::Error {
            message: message.to_string(),
        });
    }
}
