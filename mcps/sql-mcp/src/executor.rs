//! SQL executor
//!
//! Runs one statement per call on a fresh connection. The connection lives
//! only for the duration of the call, so no transaction or session state
//! leaks from one call to the next. Statement text is passed through
//! unchanged: no sanitization, parameterization or allow-listing happens
//! here.

use std::time::{Duration, Instant};

use serde_json::Value;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Column, Connection, Executor, Row, Statement};

use crate::descriptor::ConnectionDescriptor;
use crate::error::ConnectionError;
use crate::result::{self, SqlExecutionResult};

/// Default limit for the connectivity probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

const PROBE_STATEMENT: &str = "SELECT 1";

/// Executes statements against one database
#[derive(Debug, Clone)]
pub struct SqlExecutor {
    descriptor: ConnectionDescriptor,
    statement_timeout: Option<Duration>,
}

impl SqlExecutor {
    /// Validate connectivity and create an executor
    ///
    /// Fails right away when the database cannot be reached, instead of on
    /// the first real statement.
    pub async fn connect(descriptor: ConnectionDescriptor) -> Result<Self, ConnectionError> {
        sqlx::any::install_default_drivers();

        let executor = Self {
            descriptor,
            statement_timeout: None,
        };
        executor.probe(DEFAULT_PROBE_TIMEOUT).await?;

        tracing::info!(database = %executor.descriptor, "Connected");
        Ok(executor)
    }

    /// Abort statements that run longer than `timeout`
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout
    }

    /// Run a trivial query on a fresh connection
    pub async fn probe(&self, timeout: Duration) -> Result<(), ConnectionError> {
        let attempt = async {
            let mut conn = self.open().await?;
            (&mut conn).execute(sqlx::raw_sql(PROBE_STATEMENT)).await?;
            conn.close().await?;
            Ok::<(), sqlx::Error>(())
        };

        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Unreachable(e.to_string())),
            Err(_) => Err(ConnectionError::ProbeTimeout(timeout)),
        }
    }

    /// Execute one statement
    ///
    /// Never fails: database errors and timeouts come back as a result with
    /// `status = error`.
    pub async fn execute(&self, statement: &str) -> SqlExecutionResult {
        let started = Instant::now();

        let outcome = match self.statement_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run(statement)).await {
                Ok(outcome) => outcome.map_err(|e| e.to_string()),
                Err(_) => Err(format!("statement timed out after {}s", limit.as_secs())),
            },
            None => self.run(statement).await.map_err(|e| e.to_string()),
        };

        let result = match outcome {
            Ok(Some(rows)) => SqlExecutionResult::rows(rows),
            Ok(None) => SqlExecutionResult::committed(),
            Err(detail) => SqlExecutionResult::error(detail),
        };

        tracing::debug!(
            status = ?result.status,
            rows = result.row_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Statement finished"
        );
        if !result.is_success() {
            tracing::warn!(statement = %preview(statement), "{}", result.message);
        }

        result
    }

    async fn open(&self) -> Result<AnyConnection, sqlx::Error> {
        AnyConnection::connect(self.descriptor.uri()).await
    }

    /// Scoped execution: the connection is closed on success and dropped
    /// (which also closes it) on every early return.
    async fn run(&self, statement: &str) -> Result<Option<Vec<result::Row>>, sqlx::Error> {
        let mut conn = self.open().await?;
        let outcome = run_on(&mut conn, statement).await;

        if let Err(e) = conn.close().await {
            tracing::debug!("Closing connection failed: {}", e);
        }

        outcome
    }
}

// Executor methods are called directly: they return boxed `Send` futures,
// while the generic `RawSql` helpers do not satisfy `Send` for spawned tasks.
async fn run_on(
    conn: &mut AnyConnection,
    statement: &str,
) -> Result<Option<Vec<result::Row>>, sqlx::Error> {
    let returns_rows = {
        let prepared = (&mut *conn).prepare(statement).await?;
        !prepared.columns().is_empty()
    };

    if returns_rows {
        let rows = (&mut *conn).fetch_all(sqlx::raw_sql(statement)).await?;
        return Ok(Some(rows.iter().map(row_to_json).collect()));
    }

    let mut tx = conn.begin().await?;
    (&mut *tx).execute(sqlx::raw_sql(statement)).await?;
    tx.commit().await?;
    Ok(None)
}

fn row_to_json(row: &AnyRow) -> result::Row {
    let mut map = result::Row::new();
    for column in row.columns() {
        map.insert(column.name().to_string(), decode_value(row, column.ordinal()));
    }
    map
}

/// Decode a column by trying the types the `Any` driver knows about
fn decode_value(row: &AnyRow, index: usize) -> Value {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::String).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::Bool).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return v
            .map(|b| Value::String(format!("<blob {} bytes>", b.len())))
            .unwrap_or(Value::Null);
    }
    Value::String("<unsupported value>".to_string())
}

fn preview(statement: &str) -> &str {
    let end = statement
        .char_indices()
        .nth(120)
        .map_or(statement.len(), |(i, _)| i);
    &statement[..end]
}
