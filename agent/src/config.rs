//! Configuration loading
//!
//! `.asksql.toml` is looked up from the working directory upwards, then in
//! `~/.config/asksql/`. Every section is optional; CLI flags override what
//! the file says.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::diagram::DEFAULT_RENDER_BASE_URL;
use crate::error::AskError;
use crate::worker::Role;

pub const CONFIG_FILE_NAME: &str = ".asksql.toml";

/// Find a config file by walking up from `start`, then checking the global
/// config directory
pub fn find_config_file_from(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let candidate = current.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => break,
        }
    }

    let global_path = dirs::config_dir()?.join("asksql").join(filename);
    global_path.exists().then_some(global_path)
}

fn find_config_file(filename: &str) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_file_from(&cwd, filename)
}

/// Top-level configuration (from .asksql.toml)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct AskSqlConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    /// `[workers.<role>]` overrides
    #[serde(default)]
    pub workers: HashMap<Role, WorkerOverride>,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub diagrams: DiagramSection,
    #[serde(default)]
    pub formatter: FormatterSection,
}

/// LLM configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-request HTTP timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

/// Orchestrator tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_parallel_tasks")]
    pub max_parallel_tasks: usize,
    /// Planner calls per turn before falling back to a single task
    #[serde(default = "default_max_plan_attempts")]
    pub max_plan_attempts: usize,
    /// Previous turns given to the planner as context
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    pub planner_model: Option<String>,
    #[serde(default = "default_planner_temperature")]
    pub planner_temperature: f32,
}

/// `[workers.<role>]` section
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct WorkerOverride {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_iterations: Option<usize>,
    /// 0 disables the timeout
    pub timeout_secs: Option<u64>,
}

/// Database section
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    /// 0 disables the timeout
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_secs: u64,
}

/// Diagram rendering section
#[derive(Debug, Clone, Deserialize)]
pub struct DiagramSection {
    #[serde(default = "default_render_base_url")]
    pub render_base_url: String,
}

/// Formatter stage section
#[derive(Debug, Clone, Deserialize)]
pub struct FormatterSection {
    /// Ask the formatter worker to polish answers before normalization
    #[serde(default = "default_polish")]
    pub polish: bool,
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen3:14b".to_string()
}

fn default_llm_timeout() -> u64 {
    300
}

fn default_max_parallel_tasks() -> usize {
    4
}

fn default_max_plan_attempts() -> usize {
    2
}

fn default_history_turns() -> usize {
    3
}

fn default_planner_temperature() -> f32 {
    0.1
}

fn default_statement_timeout() -> u64 {
    30
}

fn default_render_base_url() -> String {
    DEFAULT_RENDER_BASE_URL.to_string()
}

fn default_polish() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_parallel_tasks: default_max_parallel_tasks(),
            max_plan_attempts: default_max_plan_attempts(),
            history_turns: default_history_turns(),
            planner_model: None,
            planner_temperature: default_planner_temperature(),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            statement_timeout_secs: default_statement_timeout(),
        }
    }
}

impl Default for DiagramSection {
    fn default() -> Self {
        Self {
            render_base_url: default_render_base_url(),
        }
    }
}

impl Default for FormatterSection {
    fn default() -> Self {
        Self {
            polish: default_polish(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl DatabaseSection {
    pub fn statement_timeout(&self) -> Option<Duration> {
        (self.statement_timeout_secs > 0).then(|| Duration::from_secs(self.statement_timeout_secs))
    }
}

impl AskSqlConfig {
    /// Load config from .asksql.toml
    ///
    /// Search order:
    /// 1. Walk up directory tree from cwd looking for .asksql.toml
    /// 2. Check ~/.config/asksql/.asksql.toml (global fallback)
    /// 3. Fall back to defaults
    pub fn load() -> Result<Self> {
        if let Some(config_path) = find_config_file(CONFIG_FILE_NAME) {
            tracing::debug!("Loading config from: {}", config_path.display());
            return Self::load_from_path(&config_path);
        }

        tracing::debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject settings the orchestrator cannot work with
    pub fn validate(&self) -> Result<(), AskError> {
        if self.orchestrator.max_parallel_tasks == 0 {
            return Err(AskError::Config(
                "orchestrator.max_parallel_tasks must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.max_plan_attempts == 0 {
            return Err(AskError::Config(
                "orchestrator.max_plan_attempts must be at least 1".to_string(),
            ));
        }
        if self.workers.contains_key(&Role::Orchestrator) {
            return Err(AskError::Config(
                "[workers.orchestrator] is not a worker; use [orchestrator]".to_string(),
            ));
        }
        url::Url::parse(&self.diagrams.render_base_url).map_err(|e| {
            AskError::Config(format!(
                "diagrams.render_base_url '{}' is not a URL: {}",
                self.diagrams.render_base_url, e
            ))
        })?;
        Ok(())
    }
}
