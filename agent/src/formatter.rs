//! Result formatter stage
//!
//! Presentation only. An optional formatter worker may rewrite the answer,
//! but its rewrite is discarded unless every diagram block survives
//! byte-for-byte. A deterministic normalization always runs last.

use std::sync::Arc;

use crate::diagram::fenced_blocks;
use crate::worker::{RunContext, Worker};

const FORMAT_TASK_ID: &str = "format";

/// Post-processes the orchestrator's answer
#[derive(Clone, Default)]
pub struct FormatterStage {
    worker: Option<Arc<Worker>>,
}

impl FormatterStage {
    /// Stage that polishes through `worker` before normalizing
    pub fn new(worker: Arc<Worker>) -> Self {
        Self {
            worker: Some(worker),
        }
    }

    /// Stage that only normalizes
    pub fn normalize_only() -> Self {
        Self { worker: None }
    }

    pub fn polishes(&self) -> bool {
        self.worker.is_some()
    }

    /// Produce the user-facing text
    ///
    /// `polish` is false for failed turns, whose apology is shown as is.
    pub async fn format(&self, raw: &str, polish: bool) -> String {
        let candidate = match self.worker {
            Some(ref worker) if polish && !raw.trim().is_empty() => {
                let input = format!("Format this answer for the user:\n\n{}", raw);
                match worker.run(&input, &RunContext::new(FORMAT_TASK_ID)).await {
                    Ok(formatted) if is_faithful(raw, &formatted) => formatted,
                    Ok(_) => {
                        tracing::debug!("Formatter output dropped diagram content or was empty, keeping raw text");
                        raw.to_string()
                    }
                    Err(e) => {
                        tracing::warn!("Formatter failed, keeping raw text: {}", e);
                        raw.to_string()
                    }
                }
            }
            _ => raw.to_string(),
        };

        normalize(&candidate)
    }
}

/// Non-empty and carries the same diagram blocks in the same order
fn is_faithful(raw: &str, formatted: &str) -> bool {
    !formatted.trim().is_empty() && fenced_blocks(raw) == fenced_blocks(formatted)
}

/// CRLF to LF, trim line ends and collapse blank runs outside fenced blocks,
/// trim the whole text
pub fn normalize(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let mut lines: Vec<&str> = Vec::new();
    let mut in_fence = false;
    let mut previous_blank = false;

    for line in text.split('\n') {
        let is_fence = line.trim_start().starts_with("```");

        if in_fence {
            lines.push(line);
            in_fence = !is_fence;
            continue;
        }

        let line = line.trim_end();
        if is_fence {
            in_fence = !closes_on_same_line(line);
        } else if line.is_empty() {
            if previous_blank {
                continue;
            }
            previous_blank = true;
            lines.push(line);
            continue;
        }

        previous_blank = false;
        lines.push(line);
    }

    lines.join("\n").trim().to_string()
}

/// A fence line like "```mermaid graph TD; A-->B```" opens and closes itself
fn closes_on_same_line(line: &str) -> bool {
    line.trim_start()
        .strip_prefix("```")
        .is_some_and(|rest| rest.ends_with("```"))
}
