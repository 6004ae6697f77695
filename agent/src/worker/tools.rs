//! The SQL tool as seen by workers
//!
//! Workers only depend on the [`SqlTool`] trait. The production
//! implementation is `sql_mcp::SqlExecutor`; tests can plug in anything
//! that returns a [`SqlExecutionResult`].

use async_trait::async_trait;
use sql_mcp::{ExecuteParams, SqlExecutionResult, SqlExecutor};

use crate::llm::{ToolCall, ToolFunctionSpec, ToolSpec};

/// Name under which the SQL tool is offered to the model
pub const SQL_TOOL_NAME: &str = "sql_execute";

const SQL_TOOL_DESCRIPTION: &str = "Execute a single SQL statement against the connected database. \
Returns JSON with `status` (success or error), `data` (rows for queries, null otherwise) and `message`.";

/// Rows kept in a tool message before the rest are summarized
pub const MAX_ROWS_IN_CONTEXT: usize = 200;

/// A statement executor bound to one connection
#[async_trait]
pub trait SqlTool: Send + Sync {
    /// Identity used to serialize tasks on the same connection
    fn connection_id(&self) -> String;

    /// Run one statement; failures come back as error results
    async fn execute(&self, statement: &str) -> SqlExecutionResult;
}

#[async_trait]
impl SqlTool for SqlExecutor {
    fn connection_id(&self) -> String {
        self.descriptor().redacted()
    }

    async fn execute(&self, statement: &str) -> SqlExecutionResult {
        SqlExecutor::execute(self, statement).await
    }
}

/// Tool definition sent to the model
pub fn sql_tool_spec() -> ToolSpec {
    let schema = schemars::schema_for!(ExecuteParams).to_value();

    ToolSpec {
        tool_type: "function".to_string(),
        function: ToolFunctionSpec {
            name: SQL_TOOL_NAME.to_string(),
            description: SQL_TOOL_DESCRIPTION.to_string(),
            parameters: clean_schema_for_ollama(&schema),
        },
    }
}

/// Remove schema fields that confuse Ollama
pub fn clean_schema_for_ollama(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(obj) => {
            let cleaned = obj
                .iter()
                .filter(|(key, _)| !matches!(key.as_str(), "$schema" | "title" | "additionalProperties"))
                .map(|(key, value)| (key.clone(), clean_schema_for_ollama(value)))
                .collect();
            serde_json::Value::Object(cleaned)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(clean_schema_for_ollama).collect())
        }
        other => other.clone(),
    }
}

/// Extract the statement from a tool call's arguments
///
/// Accepts an argument object, or a JSON string holding one, since some
/// models double-encode arguments.
pub fn parse_statement(call: &ToolCall) -> Result<String, String> {
    let arguments = match &call.function.arguments {
        serde_json::Value::String(raw) => serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::json!({ "statement": raw })),
        other => other.clone(),
    };

    let params: ExecuteParams = serde_json::from_value(arguments)
        .map_err(|e| format!("invalid arguments for {}: {}", SQL_TOOL_NAME, e))?;

    if params.statement.trim().is_empty() {
        return Err(format!("{} needs a non-empty statement", SQL_TOOL_NAME));
    }
    Ok(params.statement)
}

/// Serialize a result for the model, capping the number of rows
pub fn result_for_context(result: &SqlExecutionResult) -> String {
    let total = result.row_count();
    let payload = if total > MAX_ROWS_IN_CONTEXT {
        let mut trimmed = result.clone();
        if let Some(rows) = trimmed.rows.as_mut() {
            rows.truncate(MAX_ROWS_IN_CONTEXT);
        }
        trimmed.message = format!(
            "{} Showing the first {} of {} rows.",
            trimmed.message, MAX_ROWS_IN_CONTEXT, total
        );
        serde_json::to_string(&trimmed)
    } else {
        serde_json::to_string(result)
    };

    payload.unwrap_or_else(|e| tool_error(&format!("failed to serialize result: {}", e)))
}

/// Error payload in the same shape as a failed execution
pub fn tool_error(message: &str) -> String {
    serde_json::json!({ "status": "error", "data": null, "message": message }).to_string()
}
