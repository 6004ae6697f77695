//! Command-line interface

mod args;
mod output;
mod repl;

pub use args::{Cli, Commands, ConnectionArgs};
pub use output::{print_events, print_history, print_response};
pub use repl::Repl;

use std::sync::Arc;

use anyhow::Result;
use sql_mcp::SqlExecutor;

use crate::config::AskSqlConfig;
use crate::error::AskError;
use crate::events::{event_channel, TurnEventSender};
use crate::llm::{list_models, OllamaClient};
use crate::session::Session;

/// Dispatch a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = AskSqlConfig::load()?;
    if let Some(url) = cli.ollama_url {
        config.llm.url = url;
    }
    if let Some(model) = cli.model {
        config.llm.model = model;
    }

    match cli.command {
        Commands::Chat { connection } => {
            let mut session = open_session(&connection, &config, cli.verbose > 0).await?;
            Repl::new(&mut session).run().await
        }
        Commands::Ask {
            connection,
            question,
        } => {
            let mut session = open_session(&connection, &config, cli.verbose > 0).await?;
            let response = session.process_query(&question).await;
            print_response(&response);
            Ok(())
        }
        Commands::Sql {
            connection,
            statement,
        } => {
            let mut executor = SqlExecutor::connect(connection.descriptor()?).await?;
            if let Some(timeout) = config.database.statement_timeout() {
                executor = executor.with_statement_timeout(timeout);
            }
            let result = executor.execute(&statement).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Commands::Models => {
            let models = list_models(&config.llm.url).await?;
            println!("Available models:\n");
            for model in models {
                let marker = if model.name == config.llm.model { " *" } else { "" };
                println!("  {}{}", model.name, marker);
            }
            println!("\nCurrent: {}", config.llm.model);
            Ok(())
        }
    }
}

async fn open_session(connection: &ConnectionArgs, config: &AskSqlConfig, show_events: bool) -> Result<Session> {
    let llm = OllamaClient::new(&config.llm.url, &config.llm.model, config.llm.timeout())
        .map_err(|e| AskError::Llm(format!("{:#}", e)))?;

    let mut session = Session::open(connection.descriptor()?, Arc::new(llm), config).await?;

    if show_events {
        let (tx, rx) = event_channel();
        tokio::spawn(print_events(rx));
        session = session.with_event_sender(TurnEventSender::new(tx));
    }

    Ok(session)
}
