//! SQL MCP Server implementation
//!
//! Exposes [`SqlExecutor`] as a single `sql_execute` tool. Failed
//! statements are regular tool results with `status: "error"`, so a client
//! can read the driver message and correct its SQL.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use std::sync::Arc;

use crate::executor::SqlExecutor;
use crate::result::ExecuteParams;

/// SQL MCP Server
#[derive(Clone)]
pub struct SqlMcpServer {
    executor: Arc<SqlExecutor>,
    tool_router: ToolRouter<Self>,
}

impl SqlMcpServer {
    /// Create a server around a connected executor
    pub fn new(executor: SqlExecutor) -> Self {
        Self {
            executor: Arc::new(executor),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl SqlMcpServer {
    /// Execute one SQL statement and return a structured result
    #[tool(description = "Execute one SQL statement on the connected database. Returns JSON with status (success or error), data (rows as column/value objects, or null for statements that return no rows) and message.")]
    async fn sql_execute(&self, Parameters(params): Parameters<ExecuteParams>) -> Result<CallToolResult, McpError> {
        let result = self.executor.execute(&params.statement).await;

        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

#[tool_handler]
impl rmcp::ServerHandler for SqlMcpServer {
    fn get_info(&self) -> ServerInfo {
        let descriptor = self.executor.descriptor();
        ServerInfo {
            instructions: Some(format!(
                "SQL execution server connected to a {} database. \
                Use sql_execute to run one statement at a time; every statement \
                that changes data is committed immediately.",
                descriptor.kind()
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
