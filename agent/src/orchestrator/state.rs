//! Orchestrator state machine

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::TurnEventSender;

/// Where a turn is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    Received,
    Decomposing,
    Delegating,
    AwaitingWorkers,
    Aggregating,
    Done,
    Failed,
}

impl OrchestratorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Allowed transitions
    ///
    /// Delegating and AwaitingWorkers alternate while the task graph drains.
    /// A plan with a direct answer goes from Decomposing straight to
    /// Aggregating. Any non-terminal state may fail.
    pub fn can_transition_to(self, next: Self) -> bool {
        use OrchestratorState::*;

        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Received, Decomposing)
            | (Decomposing, Delegating)
            | (Decomposing, Aggregating)
            | (Delegating, AwaitingWorkers)
            | (AwaitingWorkers, Delegating)
            | (AwaitingWorkers, Aggregating)
            | (Aggregating, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Decomposing => "decomposing",
            Self::Delegating => "delegating",
            Self::AwaitingWorkers => "awaiting_workers",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks the current state and every state visited during one turn
pub struct StateMachine {
    current: OrchestratorState,
    history: Vec<OrchestratorState>,
    events: TurnEventSender,
}

impl StateMachine {
    pub fn new(events: TurnEventSender) -> Self {
        Self {
            current: OrchestratorState::Received,
            history: vec![OrchestratorState::Received],
            events,
        }
    }

    pub fn current(&self) -> OrchestratorState {
        self.current
    }

    /// Move to `next`; a transition to the current state is a no-op
    ///
    /// Disallowed transitions are logged and ignored, leaving the state
    /// unchanged.
    pub fn transition(&mut self, next: OrchestratorState) -> bool {
        if next == self.current {
            return true;
        }
        if !self.current.can_transition_to(next) {
            tracing::error!(from = %self.current, to = %next, "Invalid orchestrator transition");
            return false;
        }

        tracing::debug!(from = %self.current, to = %next, "Orchestrator transition");
        self.current = next;
        self.history.push(next);
        self.events.state_changed(next);
        true
    }

    pub fn into_history(self) -> Vec<OrchestratorState> {
        self.history
    }
}
