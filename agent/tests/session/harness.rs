//! Shared fixtures: a scripted LLM and a seeded SQLite database

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use asksql::config::AskSqlConfig;
use asksql::events::{event_channel, EventReceiver, TurnEvent, TurnEventSender};
use asksql::llm::{ChatRequest, ChatResponse, Llm, ToolCall};
use asksql::worker::Role;
use asksql::Session;
use serde_json::json;
use sql_mcp::{ConnectParams, SqlExecutor};
use tempfile::TempDir;

pub const PLANNER: &str = "You are the Orchestrator";
pub const SCHEMA_ANALYST: &str = "You are the Schema Analyst";
pub const DATABASE_MANAGER: &str = "You are the Database Manager";
pub const DATA_ANALYST: &str = "You are the Data Analyst";
pub const ERD_SPECIALIST: &str = "You are the ERD Specialist";

/// LLM that answers by system prompt prefix
///
/// Each prefix has a queue of replies. The last reply of a queue is repeated
/// once the others are used up.
#[derive(Default)]
pub struct ScriptedLlm {
    scripts: Mutex<Vec<(String, VecDeque<ChatResponse>)>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, prefix: &str, replies: Vec<ChatResponse>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push((prefix.to_string(), replies.into_iter().collect()));
        self
    }

    /// Requests whose system prompt starts with `prefix`, in call order
    pub fn requests_for(&self, prefix: &str) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.system_prompt().is_some_and(|s| s.starts_with(prefix)))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Llm for ScriptedLlm {
    async fn chat(&self, request: &ChatRequest) -> anyhow::Result<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let system = request.system_prompt().unwrap_or_default();
        let mut scripts = self.scripts.lock().unwrap();
        let (_, replies) = scripts
            .iter_mut()
            .find(|(prefix, _)| system.starts_with(prefix.as_str()))
            .ok_or_else(|| anyhow!("no script for prompt: {}", system.lines().next().unwrap_or("")))?;

        match replies.len() {
            0 => Err(anyhow!("script exhausted")),
            1 => Ok(replies[0].clone()),
            _ => Ok(replies.pop_front().unwrap()),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

pub fn reply(text: &str) -> ChatResponse {
    ChatResponse::text(text)
}

pub fn sql_call(statement: &str) -> ChatResponse {
    ChatResponse::tool_calls(vec![ToolCall::new(
        "sql_execute",
        json!({ "statement": statement }),
    )])
}

/// Single task plan for `role`, declaring every capability of the role
pub fn single_task_plan(role: &str) -> ChatResponse {
    let requires: Vec<&str> = role
        .parse::<Role>()
        .unwrap()
        .capabilities()
        .iter()
        .map(|c| c.as_str())
        .collect();
    reply(
        &json!({ "tasks": [{ "id": "t1", "role": role, "input": "{query}", "requires": requires }] })
            .to_string(),
    )
}

/// Config for tests: no formatter round trip
pub fn test_config() -> AskSqlConfig {
    let mut config = AskSqlConfig::default();
    config.formatter.polish = false;
    config
}

/// Temporary SQLite shop database with customers and orders
pub struct ShopDb {
    pub dir: TempDir,
    pub path: String,
}

impl ShopDb {
    pub async fn create() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop.db");
        std::fs::File::create(&path).unwrap();
        let path = path.to_string_lossy().to_string();

        let executor = Self::executor_for(&path).await;
        for statement in [
            "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, city TEXT)",
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER REFERENCES customers(id), total REAL)",
            "INSERT INTO customers (id, name, city) VALUES (1, 'Alice', 'Lyon'), (2, 'Bob', 'Oslo'), (3, 'Chen', 'Lyon')",
            "INSERT INTO orders (id, customer_id, total) VALUES (1, 1, 20.0), (2, 1, 5.5), (3, 3, 12.0)",
        ] {
            let result = executor.execute(statement).await;
            assert!(result.is_success(), "{}: {}", statement, result.message);
        }

        Self { dir, path }
    }

    pub fn params(&self) -> ConnectParams {
        ConnectParams::sqlite(self.path.clone())
    }

    pub async fn executor(&self) -> SqlExecutor {
        Self::executor_for(&self.path).await
    }

    async fn executor_for(path: &str) -> SqlExecutor {
        let descriptor = ConnectParams::sqlite(path).build().unwrap();
        SqlExecutor::connect(descriptor).await.unwrap()
    }
}

pub async fn open_session(db: &ShopDb, llm: Arc<ScriptedLlm>, config: &AskSqlConfig) -> Session {
    Session::connect(&db.params(), llm, config).await.unwrap()
}

/// Attach an event channel to a session
pub fn with_events(session: Session) -> (Session, EventReceiver) {
    let (tx, rx) = event_channel();
    (session.with_event_sender(TurnEventSender::new(tx)), rx)
}

pub fn drain(rx: &mut EventReceiver) -> Vec<TurnEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
