//! AskSQL: conversational access to a relational database
//!
//! A planner breaks each question into tasks for role workers (schema
//! analyst, database manager, data analyst, ERD specialist), runs them
//! against one connected database and returns a single answer plus render
//! URLs for any ER diagrams.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use asksql::{AskSqlConfig, OllamaClient, Session};
//! use sql_mcp::ConnectParams;
//!
//! let config = AskSqlConfig::load()?;
//! let llm = OllamaClient::new(&config.llm.url, &config.llm.model, config.llm.timeout())?;
//! let mut session = Session::connect(&ConnectParams::sqlite("shop.db"), Arc::new(llm), &config).await?;
//!
//! let (text, diagram_urls) = asksql::process_query(&mut session, "Show me all customers").await;
//! ```

pub mod cli;
pub mod config;
pub mod diagram;
pub mod error;
pub mod events;
pub mod formatter;
pub mod llm;
pub mod orchestrator;
pub mod session;
pub mod worker;

pub use config::AskSqlConfig;
pub use diagram::{DiagramRenderer, MalformedDiagramMarkup};
pub use error::AskError;
pub use formatter::FormatterStage;
pub use llm::{Llm, OllamaClient};
pub use orchestrator::{Orchestrator, OrchestratorState};
pub use session::{process_query, ConversationTurn, Session, TurnResponse};
pub use worker::{Role, Worker, WorkerConfig, WorkerError};
