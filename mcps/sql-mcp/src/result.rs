//! Structured statement results
//!
//! The shape every caller sees, whether the statement returned rows,
//! changed data, or failed.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One result row: column name to JSON value, in column order
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Outcome of a single statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Error,
}

/// Result of one `execute` call
///
/// `rows` is only present for successful statements that return tabular
/// data (possibly empty). DDL/DML and failures carry `rows: null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlExecutionResult {
    pub status: ExecutionStatus,
    #[serde(rename = "data")]
    pub rows: Option<Vec<Row>>,
    pub message: String,
}

impl SqlExecutionResult {
    /// Successful query with materialized rows
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            status: ExecutionStatus::Success,
            rows: Some(rows),
            message: "Query executed successfully.".to_string(),
        }
    }

    /// Successful, committed statement that returns no rows
    pub fn committed() -> Self {
        Self {
            status: ExecutionStatus::Success,
            rows: None,
            message: "Data manipulation command executed successfully.".to_string(),
        }
    }

    /// Failed statement, carrying the driver's message
    pub fn error(detail: impl std::fmt::Display) -> Self {
        let detail = detail.to_string();
        let detail = if detail.trim().is_empty() {
            "unknown database error".to_string()
        } else {
            detail
        };
        Self {
            status: ExecutionStatus::Error,
            rows: None,
            message: format!("SQL execution failed: {}", detail),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }

    /// Number of rows returned, zero for non-returning statements
    pub fn row_count(&self) -> usize {
        self.rows.as_ref().map_or(0, Vec::len)
    }
}

/// Parameters for the `sql_execute` tool
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteParams {
    /// A single SQL statement to run against the connected database
    #[serde(alias = "query", alias = "sql")]
    pub statement: String,
}
