//! Session setup errors
//!
//! Only connecting can fail. Once a session exists, every problem during a
//! turn is reported in the turn's text.

use sql_mcp::ConnectionError;

#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Language model setup failed: {0}")]
    Llm(String),
}
