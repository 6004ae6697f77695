//! Connection errors
//!
//! Everything that can go wrong before the first statement runs. Errors
//! raised while a statement executes never leave the executor; they are
//! folded into [`SqlExecutionResult`](crate::SqlExecutionResult) instead.

use std::path::PathBuf;
use std::time::Duration;

use crate::descriptor::DatabaseKind;

/// A descriptor that is malformed or a database that cannot be reached
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The connection string is not a valid URL
    #[error("invalid connection string: {0}")]
    InvalidUri(String),

    /// The URL scheme does not belong to the declared database kind
    #[error("connection string scheme '{scheme}' does not match {kind}")]
    SchemeMismatch { kind: DatabaseKind, scheme: String },

    /// A required connection field was left empty
    #[error("missing connection field: {0}")]
    MissingField(&'static str),

    /// SQLite file that does not exist (sqlite never creates it for us)
    #[error("Database file '{}' not found", .0.display())]
    MissingDatabaseFile(PathBuf),

    /// In-memory SQLite does not outlive a single connection
    #[error("In-memory SQLite databases are not supported; changes would not persist between statements")]
    InMemoryDatabase,

    /// The connectivity probe failed
    #[error("Failed to connect to database: {0}")]
    Unreachable(String),

    /// The connectivity probe did not answer in time
    #[error("Connection probe timed out after {}s", .0.as_secs())]
    ProbeTimeout(Duration),
}
