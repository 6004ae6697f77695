//! SQL MCP Server
//!
//! Serves the SQL execution tool over stdio. The database comes from
//! `SQL_CONFIG_PATH` or `~/.asksql/sql.toml`.

use anyhow::Result;
use rmcp::ServiceExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sql_mcp::config::SqlConfig;
use sql_mcp::{SqlExecutor, SqlMcpServer};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;

    tracing::info!("Starting sql_mcp MCP Server");

    let config = SqlConfig::load()?;
    let executor = SqlExecutor::connect(config.descriptor()?)
        .await?
        .with_statement_timeout(config.statement_timeout());

    let service = SqlMcpServer::new(executor)
        .serve(rmcp::transport::stdio())
        .await?;

    tracing::info!("Server running, waiting for requests...");

    service.waiting().await?;

    tracing::info!("Server shutting down");
    Ok(())
}

/// Log to stderr; stdout carries the MCP protocol
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("sql_mcp=info".parse()?);

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .init();
    }

    Ok(())
}
