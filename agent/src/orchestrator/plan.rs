//! Task plans
//!
//! The planner replies with JSON describing a DAG of tasks. Nothing runs
//! until the plan has been parsed and validated against the registered
//! workers and their capabilities.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::worker::{Capability, Role};

static THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());
static FENCED_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").unwrap());

/// One unit of delegated work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub role: Role,
    /// Instructions for the worker; may contain `{query}` and `{<task id>}`
    pub input: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub requires: Vec<Capability>,
}

/// A validated or candidate plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
    /// Direct reply for queries that need no delegation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

/// Reasons a plan is rejected
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("plan is not valid JSON: {0}")]
    Parse(String),

    #[error("plan has neither tasks nor an answer")]
    Empty,

    #[error("task id '{0}' is invalid; use short ids like t1 without spaces or braces")]
    InvalidTaskId(String),

    #[error("task id '{0}' is used more than once")]
    DuplicateTask(String),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("tasks {0:?} form a dependency cycle")]
    Cycle(Vec<String>),

    #[error("task '{0}' does not list the capabilities it requires")]
    MissingRequirements(String),

    #[error("task '{task}' requires {capability}, which the {role} does not have")]
    CapabilityViolation {
        task: String,
        role: Role,
        capability: Capability,
    },

    #[error("task '{0}' is assigned to the orchestrator, which cannot run tasks")]
    NotDelegable(String),

    #[error("task '{task}' is assigned to {role}, but no such worker is available")]
    UnavailableRole { task: String, role: Role },
}

impl Plan {
    /// Parse the planner's reply
    ///
    /// Tolerates reasoning blocks and Markdown fences around the JSON.
    pub fn parse(reply: &str) -> Result<Self, PlanError> {
        let reply = THINK_RE.replace_all(reply, "");
        let json = extract_json(&reply).ok_or_else(|| {
            PlanError::Parse("no JSON object found in the reply".to_string())
        })?;

        serde_json::from_str(json).map_err(|e| PlanError::Parse(e.to_string()))
    }

    /// Single database manager task carrying the whole query
    pub fn fallback() -> Self {
        Self {
            tasks: vec![TaskSpec {
                id: "t1".to_string(),
                role: Role::DatabaseManager,
                input: "{query}".to_string(),
                depends_on: Vec::new(),
                requires: Role::DatabaseManager.capabilities().to_vec(),
            }],
            answer: None,
        }
    }

    /// Plan answered directly, without workers
    pub fn direct(answer: impl Into<String>) -> Self {
        Self {
            tasks: Vec::new(),
            answer: Some(answer.into()),
        }
    }

    pub fn is_direct(&self) -> bool {
        self.tasks.is_empty() && self.answer.is_some()
    }

    pub fn task(&self, id: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Check structure, delegation rules and capabilities
    pub fn validate(&self, available: &[Role]) -> Result<(), PlanError> {
        if self.tasks.is_empty() {
            return match self.answer.as_deref().map(str::trim) {
                Some(answer) if !answer.is_empty() => Ok(()),
                _ => Err(PlanError::Empty),
            };
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.id.trim().is_empty()
                || task.id.chars().any(|c| c.is_whitespace() || c == '{' || c == '}')
            {
                return Err(PlanError::InvalidTaskId(task.id.clone()));
            }
            if !seen.insert(task.id.as_str()) {
                return Err(PlanError::DuplicateTask(task.id.clone()));
            }
        }

        for task in &self.tasks {
            if !task.role.is_delegable() {
                return Err(PlanError::NotDelegable(task.id.clone()));
            }
            if !available.contains(&task.role) {
                return Err(PlanError::UnavailableRole {
                    task: task.id.clone(),
                    role: task.role,
                });
            }
            if task.requires.is_empty() {
                return Err(PlanError::MissingRequirements(task.id.clone()));
            }
            if let Some(&capability) = task.requires.iter().find(|c| !task.role.has_capability(**c)) {
                return Err(PlanError::CapabilityViolation {
                    task: task.id.clone(),
                    role: task.role,
                    capability,
                });
            }
            if let Some(dependency) = task.depends_on.iter().find(|d| !seen.contains(d.as_str())) {
                return Err(PlanError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dependency.clone(),
                });
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Task indices in dependency order, ties broken by plan order
    pub fn topological_order(&self) -> Result<Vec<usize>, PlanError> {
        let index: HashMap<&str, usize> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();

        let mut indegree = vec![0usize; self.tasks.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.tasks.len()];
        for (i, task) in self.tasks.iter().enumerate() {
            for dep in &task.depends_on {
                if let Some(&d) = index.get(dep.as_str()) {
                    indegree[i] += 1;
                    dependents[d].push(i);
                }
            }
        }

        let mut order = Vec::with_capacity(self.tasks.len());
        let mut done = vec![false; self.tasks.len()];
        while order.len() < self.tasks.len() {
            let Some(next) = (0..self.tasks.len()).find(|&i| !done[i] && indegree[i] == 0) else {
                let cycle = (0..self.tasks.len())
                    .filter(|&i| !done[i])
                    .map(|i| self.tasks[i].id.clone())
                    .collect();
                return Err(PlanError::Cycle(cycle));
            };
            done[next] = true;
            order.push(next);
            for &dependent in &dependents[next] {
                indegree[dependent] -= 1;
            }
        }

        Ok(order)
    }

    /// Indices of tasks that no other task depends on
    pub fn sinks(&self) -> Vec<usize> {
        let depended_on: HashSet<&str> = self
            .tasks
            .iter()
            .flat_map(|t| t.depends_on.iter().map(String::as_str))
            .collect();

        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| !depended_on.contains(t.id.as_str()))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Find the JSON object in a reply: a fenced block first, then the span
/// from the first `{` to the last `}`
fn extract_json(reply: &str) -> Option<&str> {
    if let Some(caps) = FENCED_JSON_RE.captures(reply) {
        return caps.get(1).map(|m| m.as_str());
    }

    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}
