//! SQL execution tool
//!
//! Runs generated SQL against SQLite, PostgreSQL or MySQL and reports a
//! structured result. Usable in-process through [`SqlExecutor`] or as an
//! MCP stdio server (`sql-mcp` binary).
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use sql_mcp::{ConnectParams, SqlExecutor};
//!
//! let descriptor = ConnectParams::sqlite("data/shop.db").build()?;
//! let executor = SqlExecutor::connect(descriptor).await?;
//! let result = executor.execute("SELECT * FROM customers").await;
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod executor;
pub mod result;
pub mod server;

pub use descriptor::{ConnectParams, ConnectionDescriptor, DatabaseKind};
pub use error::ConnectionError;
pub use executor::SqlExecutor;
pub use result::{ExecuteParams, ExecutionStatus, Row, SqlExecutionResult};
pub use server::SqlMcpServer;
