//! Retries, fallbacks and failures

use std::sync::Arc;

use asksql::config::WorkerOverride;
use asksql::events::TurnEvent;
use asksql::orchestrator::OrchestratorState;
use asksql::worker::Role;
use asksql::AskError;
use sql_mcp::ConnectParams;

use super::harness::*;

fn manager_with_budget(max_iterations: usize) -> asksql::AskSqlConfig {
    let mut config = test_config();
    config.workers.insert(
        Role::DatabaseManager,
        WorkerOverride {
            max_iterations: Some(max_iterations),
            ..Default::default()
        },
    );
    config
}

#[tokio::test]
async fn test_exhausted_budget_is_retried_once() {
    let db = ShopDb::create().await;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![single_task_plan("database_manager")])
            .script(
                DATABASE_MANAGER,
                vec![
                    sql_call("SELECT COUNT(*) AS n FROM customers"),
                    reply("There are 3 customers."),
                ],
            ),
    );
    let session = open_session(&db, llm.clone(), &manager_with_budget(1)).await;
    let (mut session, mut rx) = with_events(session);

    let response = session.process_query("How many customers?").await;

    assert_eq!(response.state, OrchestratorState::Done);
    assert_eq!(response.text, "There are 3 customers.");

    let events = drain(&mut rx);
    let retries = events
        .iter()
        .filter(|e| matches!(e, TurnEvent::TaskRetry { .. }))
        .count();
    assert_eq!(retries, 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, TurnEvent::TaskStarted { attempt: 2, .. })));
    assert!(!events.iter().any(|e| matches!(e, TurnEvent::TaskFailed { .. })));

    // The retry carried the failure reason in its instructions
    let manager = llm.requests_for(DATABASE_MANAGER);
    assert_eq!(manager.len(), 2);
    assert!(manager[1].messages[0].content.len() > manager[0].messages[0].content.len());
}

#[tokio::test]
async fn test_failed_only_task_apologizes() {
    let db = ShopDb::create().await;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![single_task_plan("database_manager")])
            .script(DATABASE_MANAGER, vec![sql_call("SELECT 1")]),
    );
    let mut session = open_session(&db, llm.clone(), &manager_with_budget(1)).await;

    let response = session.process_query("How many customers?").await;

    assert_eq!(response.state, OrchestratorState::Failed);
    assert!(response.text.starts_with("I'm sorry, I couldn't complete your request."));
    assert!(response.text.contains("t1"));
    assert_eq!(llm.requests_for(DATABASE_MANAGER).len(), 2);

    // The session stays usable
    assert_eq!(session.history().len(), 1);
}

#[tokio::test]
async fn test_failed_side_task_becomes_a_caveat() {
    let db = ShopDb::create().await;
    let plan = r#"{"tasks": [
        {"id": "t1", "role": "database_manager", "input": "List the customers", "requires": ["read_schema"]},
        {"id": "t2", "role": "data_analyst", "input": "Average order total", "requires": ["run_analysis"]}
    ]}"#;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![reply(plan)])
            .script(DATABASE_MANAGER, vec![reply("Alice, Bob and Chen.")]),
    );
    let mut session = open_session(&db, llm, &test_config()).await;

    let response = session.process_query("Customers and average order").await;

    assert_eq!(response.state, OrchestratorState::Done);
    assert!(response.text.starts_with("Alice, Bob and Chen."));
    assert!(response.text.contains("**Note:**"));
    assert!(response.text.contains("t2"));
}

#[tokio::test]
async fn test_unusable_plan_falls_back_to_database_manager() {
    let db = ShopDb::create().await;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![reply("I think we should look at the customers table.")])
            .script(DATABASE_MANAGER, vec![reply("There are 3 customers.")]),
    );
    let session = open_session(&db, llm.clone(), &test_config()).await;
    let (mut session, mut rx) = with_events(session);

    let response = session.process_query("How many customers?").await;

    assert_eq!(response.state, OrchestratorState::Done);
    assert_eq!(response.text, "There are 3 customers.");

    // Rejected once with feedback, then given up on
    let planner = llm.requests_for(PLANNER);
    assert_eq!(planner.len(), 2);
    let feedback = planner[1].messages.last().unwrap();
    assert_eq!(feedback.role, "user");
    assert!(feedback.content.starts_with("That plan was rejected"));

    let manager = llm.requests_for(DATABASE_MANAGER);
    assert_eq!(manager[0].messages[1].content, "How many customers?");

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, TurnEvent::PlanReady { fallback: true, .. })));
}

#[tokio::test]
async fn test_cyclic_plan_is_rejected() {
    let db = ShopDb::create().await;
    let cyclic = r#"{"tasks": [
        {"id": "t1", "role": "schema_analyst", "input": "a", "depends_on": ["t2"], "requires": ["read_schema"]},
        {"id": "t2", "role": "erd_specialist", "input": "b", "depends_on": ["t1"], "requires": ["emit_diagram"]}
    ]}"#;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![reply(cyclic), single_task_plan("database_manager")])
            .script(DATABASE_MANAGER, vec![reply("Done.")]),
    );
    let mut session = open_session(&db, llm.clone(), &test_config()).await;

    let response = session.process_query("Describe the schema").await;

    assert_eq!(response.text, "Done.");
    let planner = llm.requests_for(PLANNER);
    assert_eq!(planner.len(), 2);
    assert!(planner[1].messages.last().unwrap().content.contains("cycle"));
    assert!(llm.requests_for(SCHEMA_ANALYST).is_empty());
}

#[tokio::test]
async fn test_missing_sqlite_file_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.db");
    let llm = Arc::new(ScriptedLlm::new());

    let result = asksql::Session::connect(
        &ConnectParams::sqlite(missing.to_string_lossy().to_string()),
        llm,
        &test_config(),
    )
    .await;

    assert!(matches!(result, Err(AskError::Connection(_))));
}

#[tokio::test]
async fn test_undeclared_mutation_is_sent_back_to_the_planner() {
    let db = ShopDb::create().await;
    let sneaky = r#"{"tasks": [{"id": "t1", "role": "data_analyst", "input": "DELETE FROM customers"}]}"#;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![reply(sneaky), single_task_plan("database_manager")])
            .script(DATA_ANALYST, vec![sql_call("DELETE FROM customers")])
            .script(DATABASE_MANAGER, vec![reply("I need confirmation before deleting every customer.")]),
    );
    let mut session = open_session(&db, llm.clone(), &test_config()).await;

    let response = session.process_query("Delete all customers").await;

    assert_eq!(response.text, "I need confirmation before deleting every customer.");
    let planner = llm.requests_for(PLANNER);
    assert_eq!(planner.len(), 2);
    assert!(planner[1]
        .messages
        .last()
        .unwrap()
        .content
        .contains("does not list the capabilities it requires"));
    assert!(llm.requests_for(DATA_ANALYST).is_empty());

    let remaining = db.executor().await.execute("SELECT id FROM customers").await;
    assert_eq!(remaining.row_count(), 3);
}
