//! Terminal output

use crate::events::{EventReceiver, TurnEvent};
use crate::session::{ConversationTurn, TurnResponse};

/// Print one turn's answer, warnings first and diagram URLs last
pub fn print_response(response: &TurnResponse) {
    for warning in &response.warnings {
        println!("⚠️  {}", warning);
    }
    println!("\n{}\n", response.text);

    if !response.diagram_urls.is_empty() {
        println!("Diagrams:");
        for (i, url) in response.diagram_urls.iter().enumerate() {
            println!("  {}. {}", i + 1, url);
        }
        println!();
    }
}

pub fn print_history(history: &[ConversationTurn]) {
    if history.is_empty() {
        println!("No conversation yet.");
        return;
    }

    for turn in history {
        println!("[{}] You: {}", turn.at.format("%H:%M:%S"), turn.user_text);
        println!("{}", turn.response_text);
        for url in &turn.diagram_urls {
            println!("  diagram: {}", url);
        }
        println!();
    }
}

/// Print turn progress to stderr until the sender goes away
pub async fn print_events(mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            TurnEvent::StateChanged { state } => eprintln!("[orchestrator] {}", state),
            TurnEvent::PlanReady { tasks, fallback } => {
                let note = if fallback { " (fallback plan)" } else { "" };
                eprintln!("[orchestrator] plan with {} task(s){}", tasks, note);
            }
            TurnEvent::TaskStarted { task_id, role, attempt } => {
                eprintln!("[{}] {} started (attempt {})", task_id, role, attempt)
            }
            TurnEvent::Iteration { .. } => {}
            TurnEvent::ToolStart { task_id, statement } => eprintln!("[{}] SQL: {}", task_id, statement),
            TurnEvent::ToolComplete {
                task_id,
                success,
                rows,
                duration,
            } => {
                let outcome = match (success, rows) {
                    (true, Some(rows)) => format!("{} row(s)", rows),
                    (true, None) => "ok".to_string(),
                    (false, _) => "error".to_string(),
                };
                eprintln!("[{}] {} in {}ms", task_id, outcome, duration.as_millis());
            }
            TurnEvent::TaskRetry { task_id, reason } => eprintln!("[{}] retrying: {}", task_id, reason),
            TurnEvent::TaskCompleted { task_id, duration } => {
                eprintln!("[{}] done in {}ms", task_id, duration.as_millis())
            }
            TurnEvent::TaskFailed { task_id, error } => eprintln!("[{}] failed: {}", task_id, error),
            TurnEvent::Error { message } => eprintln!("[error] {}", message),
        }
    }
}
