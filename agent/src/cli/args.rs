//! CLI argument definitions

use clap::{ArgAction, Args, Parser, Subcommand};
use sql_mcp::{ConnectParams, ConnectionDescriptor, ConnectionError, DatabaseKind};

#[derive(Parser)]
#[command(name = "asksql")]
#[command(about = "Ask questions about a SQL database in plain language")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Ollama server URL (default: from .asksql.toml or http://localhost:11434)
    #[arg(long, env = "OLLAMA_URL", global = true)]
    pub ollama_url: Option<String>,

    /// Model to use (default: from .asksql.toml)
    #[arg(short = 'm', long, env = "OLLAMA_MODEL", global = true)]
    pub model: Option<String>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace). Default is warn.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive conversation with a database
    Chat {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
    /// Ask a single question
    Ask {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// The question
        question: String,
    },
    /// Run one SQL statement directly and print the JSON result
    Sql {
        #[command(flatten)]
        connection: ConnectionArgs,
        /// The statement
        statement: String,
    },
    /// List available models from Ollama
    Models,
}

/// Database connection flags
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Database kind: sqlite, mysql or postgresql
    #[arg(long, default_value = "sqlite")]
    pub kind: DatabaseKind,

    /// SQLite file path, or the database name on a server
    #[arg(short = 'd', long, env = "ASKSQL_DATABASE", required_unless_present = "url")]
    pub database: Option<String>,

    /// Full connection URL instead of the individual flags
    #[arg(long, env = "ASKSQL_DATABASE_URL", conflicts_with_all = ["database", "host", "port", "username", "password"])]
    pub url: Option<String>,

    /// Server host
    #[arg(long, env = "ASKSQL_DB_HOST")]
    pub host: Option<String>,

    /// Server port (default: 3306 for MySQL, 5432 for PostgreSQL)
    #[arg(long)]
    pub port: Option<u16>,

    /// Login user
    #[arg(short = 'u', long, env = "ASKSQL_DB_USER")]
    pub username: Option<String>,

    /// Login password
    #[arg(long, env = "ASKSQL_DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl ConnectionArgs {
    pub fn to_params(&self) -> ConnectParams {
        ConnectParams {
            kind: self.kind,
            database: self.database.clone().unwrap_or_default(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    /// Validated descriptor from either `--url` or the individual flags
    pub fn descriptor(&self) -> Result<ConnectionDescriptor, ConnectionError> {
        match self.url {
            Some(ref url) => ConnectionDescriptor::parse(url),
            None => self.to_params().build(),
        }
    }
}
