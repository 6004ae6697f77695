//! Conversation sessions
//!
//! A session owns one database connection, the workers built for it and
//! the conversation history. `process_query` takes `&mut self`, so a
//! session handles one query at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sql_mcp::{ConnectParams, ConnectionDescriptor, SqlExecutor};
use uuid::Uuid;

use crate::config::AskSqlConfig;
use crate::diagram::DiagramRenderer;
use crate::error::AskError;
use crate::events::TurnEventSender;
use crate::formatter::FormatterStage;
use crate::llm::Llm;
use crate::orchestrator::{Orchestrator, OrchestratorState};
use crate::worker::{Role, SqlTool, WorkerRegistry};

pub const EMPTY_RESPONSE_MESSAGE: &str = "Received empty response from query processor";

const EMPTY_QUERY_MESSAGE: &str = "Please enter a question about your database.";

/// One completed exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub user_text: String,
    pub response_text: String,
    pub diagram_urls: Vec<String>,
    pub at: DateTime<Utc>,
}

/// What the user sees for one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResponse {
    /// Answer text with diagram blocks removed
    pub text: String,
    pub diagram_urls: Vec<String>,
    pub warnings: Vec<String>,
    pub state: OrchestratorState,
}

/// A conversation bound to one database
pub struct Session {
    id: Uuid,
    descriptor: ConnectionDescriptor,
    orchestrator: Orchestrator,
    formatter: FormatterStage,
    renderer: DiagramRenderer,
    history: Vec<ConversationTurn>,
}

impl Session {
    /// Build the descriptor from connection parameters and connect
    pub async fn connect(
        params: &ConnectParams,
        llm: Arc<dyn Llm>,
        config: &AskSqlConfig,
    ) -> Result<Self, AskError> {
        let descriptor = params.build()?;
        Self::open(descriptor, llm, config).await
    }

    /// Probe the database and build the session's workers
    pub async fn open(
        descriptor: ConnectionDescriptor,
        llm: Arc<dyn Llm>,
        config: &AskSqlConfig,
    ) -> Result<Self, AskError> {
        config.validate()?;

        let mut executor = SqlExecutor::connect(descriptor.clone()).await?;
        if let Some(timeout) = config.database.statement_timeout() {
            executor = executor.with_statement_timeout(timeout);
        }

        Self::with_tool(descriptor, Arc::new(executor), llm, config)
    }

    /// Build a session around an already connected SQL tool
    pub fn with_tool(
        descriptor: ConnectionDescriptor,
        tool: Arc<dyn SqlTool>,
        llm: Arc<dyn Llm>,
        config: &AskSqlConfig,
    ) -> Result<Self, AskError> {
        config.validate()?;

        let dialect = descriptor.kind().dialect();
        let registry = Arc::new(WorkerRegistry::build(llm.clone(), tool, dialect, &config.workers));

        let formatter = match registry.get(Role::Formatter) {
            Some(worker) if config.formatter.polish => FormatterStage::new(worker),
            _ => FormatterStage::normalize_only(),
        };
        let orchestrator = Orchestrator::new(llm, registry, dialect, config.orchestrator.clone());

        let session = Self {
            id: Uuid::new_v4(),
            descriptor,
            orchestrator,
            formatter,
            renderer: DiagramRenderer::new(config.diagrams.render_base_url.clone()),
            history: Vec::new(),
        };
        tracing::info!(session = %session.id, database = %session.descriptor, "Session ready");
        Ok(session)
    }

    /// Emit turn events on this sender
    pub fn with_event_sender(mut self, events: TurnEventSender) -> Self {
        self.orchestrator = self.orchestrator.with_event_sender(events);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Clear the conversation, keep the connection
    pub fn reset(&mut self) {
        tracing::info!(session = %self.id, turns = self.history.len(), "Session reset");
        self.history.clear();
    }

    /// Run one turn
    ///
    /// Never fails: problems are described in the returned text and the
    /// session stays usable.
    pub async fn process_query(&mut self, text: &str) -> TurnResponse {
        let query = text.trim();
        if query.is_empty() {
            return TurnResponse {
                text: EMPTY_QUERY_MESSAGE.to_string(),
                diagram_urls: Vec::new(),
                warnings: Vec::new(),
                state: OrchestratorState::Failed,
            };
        }

        let outcome = self.orchestrator.process(query, &self.history).await;
        let polish = outcome.state == OrchestratorState::Done;
        let formatted = self.formatter.format(&outcome.answer, polish).await;

        let response = if formatted.is_empty() {
            TurnResponse {
                text: EMPTY_RESPONSE_MESSAGE.to_string(),
                diagram_urls: Vec::new(),
                warnings: Vec::new(),
                state: outcome.state,
            }
        } else {
            let extracted = self.renderer.extract(&formatted);
            let warnings: Vec<String> = extracted.warning.iter().map(ToString::to_string).collect();
            let text = if extracted.text.is_empty() && extracted.urls.is_empty() {
                EMPTY_RESPONSE_MESSAGE.to_string()
            } else {
                extracted.text
            };
            TurnResponse {
                text,
                diagram_urls: extracted.urls,
                warnings,
                state: outcome.state,
            }
        };

        self.history.push(ConversationTurn {
            user_text: query.to_string(),
            response_text: response.text.clone(),
            diagram_urls: response.diagram_urls.clone(),
            at: Utc::now(),
        });

        response
    }
}

/// Run one turn and return the display text and diagram URLs
///
/// Warnings are prepended to the text.
pub async fn process_query(session: &mut Session, text: &str) -> (String, Vec<String>) {
    let response = session.process_query(text).await;
    let text = if response.warnings.is_empty() {
        response.text
    } else {
        format!("⚠️ {}\n\n{}", response.warnings.join("\n⚠️ "), response.text)
    };
    (text, response.diagram_urls)
}
