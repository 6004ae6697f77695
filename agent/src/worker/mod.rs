//! Role workers
//!
//! A worker is one role bound to an LLM and, for data roles, the SQL tool.
//! Its configuration is fixed when the session is built; every task runs
//! the same bounded tool-calling loop.

mod prompts;
mod registry;
mod role;
mod tools;

pub use prompts::{instructions_for, retry_instructions};
pub use registry::WorkerRegistry;
pub use role::{Capability, Role};
pub use tools::{
    clean_schema_for_ollama, sql_tool_spec, SqlTool, MAX_ROWS_IN_CONTEXT, SQL_TOOL_NAME,
};

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::WorkerOverride;
use crate::events::TurnEventSender;
use crate::llm::parsers::ToolCallParserRegistry;
use crate::llm::{ChatMessage, ChatRequest, Llm, ToolCall};

pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Errors that end a worker run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkerError {
    #[error("{role} exceeded its iteration budget of {max_iterations} steps")]
    BudgetExceeded { role: Role, max_iterations: usize },

    #[error("{role} timed out after {}s", .timeout.as_secs())]
    ExecutionTimeout { role: Role, timeout: Duration },

    #[error("{role} could not get a reply from the language model: {message}")]
    Llm { role: Role, message: String },
}

impl WorkerError {
    pub fn role(&self) -> Role {
        match self {
            WorkerError::BudgetExceeded { role, .. }
            | WorkerError::ExecutionTimeout { role, .. }
            | WorkerError::Llm { role, .. } => *role,
        }
    }
}

/// Immutable worker configuration
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    pub role: Role,
    /// System prompt
    pub instructions: String,
    /// Model override; `None` uses the client's default
    pub model: Option<String>,
    pub temperature: f32,
    pub max_iterations: usize,
    pub timeout: Option<Duration>,
}

impl WorkerConfig {
    /// Default profile for a role
    pub fn for_role(role: Role, dialect: &str) -> Self {
        let (max_iterations, timeout_secs) = match role {
            Role::SchemaAnalyst => (10, Some(120)),
            Role::DatabaseManager => (30, None),
            Role::DataAnalyst => (50, Some(120)),
            Role::ErdSpecialist => (20, Some(120)),
            Role::Formatter | Role::Orchestrator => (2, None),
        };

        Self {
            role,
            instructions: instructions_for(role, dialect),
            model: None,
            temperature: DEFAULT_TEMPERATURE,
            max_iterations,
            timeout: timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Apply a `[workers.<role>]` section. A timeout of 0 disables it.
    pub fn apply(mut self, overrides: &WorkerOverride) -> Self {
        if let Some(ref model) = overrides.model {
            self.model = Some(model.clone());
        }
        if let Some(temperature) = overrides.temperature {
            self.temperature = temperature;
        }
        if let Some(max_iterations) = overrides.max_iterations {
            self = self.with_max_iterations(max_iterations);
        }
        if let Some(secs) = overrides.timeout_secs {
            self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        self
    }
}

/// Per-run context supplied by the scheduler
#[derive(Clone, Default)]
pub struct RunContext {
    pub task_id: String,
    /// Appended to the system prompt (used on retry)
    pub extra_instructions: Option<String>,
    pub events: TurnEventSender,
}

impl RunContext {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            ..Default::default()
        }
    }

    pub fn with_events(mut self, events: TurnEventSender) -> Self {
        self.events = events;
        self
    }

    pub fn with_extra_instructions(mut self, note: impl Into<String>) -> Self {
        self.extra_instructions = Some(note.into());
        self
    }
}

/// A role bound to an LLM and optionally the SQL tool
pub struct Worker {
    config: WorkerConfig,
    llm: Arc<dyn Llm>,
    sql: Option<Arc<dyn SqlTool>>,
    parser_registry: ToolCallParserRegistry,
}

impl Worker {
    pub fn new(config: WorkerConfig, llm: Arc<dyn Llm>) -> Self {
        Self {
            config,
            llm,
            sql: None,
            parser_registry: ToolCallParserRegistry::new(),
        }
    }

    /// Attach the SQL tool
    pub fn with_sql_tool(mut self, tool: Arc<dyn SqlTool>) -> Self {
        tracing::debug!(
            role = %self.config.role,
            connection = %tool.connection_id(),
            fallback_parsers = ?self.parser_registry.parser_names(),
            "SQL tool attached"
        );
        self.sql = Some(tool);
        self
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Connection identity when the worker holds the SQL tool
    pub fn sql_connection(&self) -> Option<String> {
        self.sql.as_ref().map(|tool| tool.connection_id())
    }

    /// Run one task to completion
    pub async fn run(&self, input: &str, ctx: &RunContext) -> Result<String, WorkerError> {
        let role = self.config.role;
        match self.config.timeout {
            // Dropping the loop future on timeout also drops any in-flight
            // statement and its connection
            Some(timeout) => tokio::time::timeout(timeout, self.tool_loop(input, ctx))
                .await
                .map_err(|_| WorkerError::ExecutionTimeout { role, timeout })?,
            None => self.tool_loop(input, ctx).await,
        }
    }

    fn system_prompt(&self, ctx: &RunContext) -> String {
        match ctx.extra_instructions {
            Some(ref note) => format!("{}\n\n{}", self.config.instructions, note),
            None => self.config.instructions.clone(),
        }
    }

    async fn tool_loop(&self, input: &str, ctx: &RunContext) -> Result<String, WorkerError> {
        let role = self.config.role;
        let tools = if self.sql.is_some() {
            vec![sql_tool_spec()]
        } else {
            Vec::new()
        };

        let mut messages = vec![
            ChatMessage::system(self.system_prompt(ctx)),
            ChatMessage::user(input),
        ];

        for iteration in 1..=self.config.max_iterations {
            tracing::debug!(task = %ctx.task_id, %role, iteration, "Worker iteration");
            ctx.events.iteration(&ctx.task_id, iteration);

            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
                temperature: Some(self.config.temperature),
            };

            let response = self.llm.chat(&request).await.map_err(|e| WorkerError::Llm {
                role,
                message: format!("{:#}", e),
            })?;

            let tool_calls = if !response.tool_calls.is_empty() {
                response.tool_calls
            } else if tools.is_empty() {
                Vec::new()
            } else if let Some((call, parser)) = self.parser_registry.parse(&response.content) {
                tracing::info!(
                    task = %ctx.task_id,
                    "Parsed tool call from content using {}: {}",
                    parser,
                    call.function.name
                );
                vec![call]
            } else {
                Vec::new()
            };

            if tool_calls.is_empty() {
                tracing::debug!(task = %ctx.task_id, %role, iteration, "Worker finished");
                return Ok(response.content);
            }

            messages.push(ChatMessage::assistant_with_tools(
                response.content,
                tool_calls.clone(),
            ));
            for call in &tool_calls {
                let output = self.call_tool(call, ctx).await;
                messages.push(ChatMessage::tool(output));
            }
        }

        tracing::warn!(
            task = %ctx.task_id,
            %role,
            "Worker reached max iterations ({})",
            self.config.max_iterations
        );
        Err(WorkerError::BudgetExceeded {
            role,
            max_iterations: self.config.max_iterations,
        })
    }

    /// Execute one tool call; problems become an error tool message
    async fn call_tool(&self, call: &ToolCall, ctx: &RunContext) -> String {
        let name = call.function.name.as_str();
        let sql = match self.sql {
            Some(ref sql) if name == SQL_TOOL_NAME => sql,
            _ => {
                tracing::warn!(task = %ctx.task_id, role = %self.config.role, "Unavailable tool requested: {}", name);
                return tools::tool_error(&format!(
                    "Tool '{}' is not available to the {}.",
                    name,
                    self.config.role.display_name()
                ));
            }
        };

        let statement = match tools::parse_statement(call) {
            Ok(statement) => statement,
            Err(message) => return tools::tool_error(&message),
        };

        ctx.events.tool_start(&ctx.task_id, &statement);
        let started = Instant::now();
        let result = sql.execute(&statement).await;
        ctx.events.tool_complete(
            &ctx.task_id,
            result.is_success(),
            result.rows.as_ref().map(Vec::len),
            started.elapsed(),
        );

        tools::result_for_context(&result)
    }
}
