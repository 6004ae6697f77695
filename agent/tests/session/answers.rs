//! Turns that produce an answer

use std::sync::Arc;

use asksql::orchestrator::OrchestratorState;

use super::harness::*;

#[tokio::test]
async fn test_show_all_customers_runs_sql_and_answers() {
    let db = ShopDb::create().await;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![single_task_plan("database_manager")])
            .script(
                DATABASE_MANAGER,
                vec![
                    sql_call("SELECT id, name FROM customers ORDER BY id"),
                    reply("| id | name |\n|---|---|\n| 1 | Alice |\n| 2 | Bob |\n| 3 | Chen |"),
                ],
            ),
    );
    let mut session = open_session(&db, llm.clone(), &test_config()).await;

    let response = session.process_query("Show me all customers").await;

    assert_eq!(response.state, OrchestratorState::Done);
    assert!(response.text.contains("| 1 | Alice |"));
    assert!(response.diagram_urls.is_empty());
    assert!(response.warnings.is_empty());

    // The second round trip saw the real query result
    let manager = llm.requests_for(DATABASE_MANAGER);
    assert_eq!(manager.len(), 2);
    let tool_message = manager[1].messages.iter().find(|m| m.role == "tool").unwrap();
    assert!(tool_message.content.contains("\"success\""));
    assert!(tool_message.content.contains("Alice"));
    assert!(tool_message.content.contains("Chen"));

    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history()[0].user_text, "Show me all customers");
}

#[tokio::test]
async fn test_changes_are_committed() {
    let db = ShopDb::create().await;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![single_task_plan("database_manager")])
            .script(
                DATABASE_MANAGER,
                vec![
                    sql_call("INSERT INTO customers (id, name, city) VALUES (4, 'Dara', 'Riga')"),
                    reply("Added Dara. 1 row affected."),
                ],
            ),
    );
    let mut session = open_session(&db, llm, &test_config()).await;

    let response = session.process_query("Add a customer named Dara from Riga").await;
    assert_eq!(response.text, "Added Dara. 1 row affected.");

    let check = db
        .executor()
        .await
        .execute("SELECT name FROM customers WHERE id = 4")
        .await;
    assert_eq!(check.row_count(), 1);
}

#[tokio::test]
async fn test_direct_answer_skips_workers() {
    let db = ShopDb::create().await;
    let llm = Arc::new(ScriptedLlm::new().script(
        PLANNER,
        vec![reply(r#"{"tasks": [], "answer": "Hello! Ask me anything about your database."}"#)],
    ));
    let mut session = open_session(&db, llm.clone(), &test_config()).await;

    let response = session.process_query("hi").await;

    assert_eq!(response.state, OrchestratorState::Done);
    assert_eq!(response.text, "Hello! Ask me anything about your database.");
    assert!(llm.requests_for(DATABASE_MANAGER).is_empty());
}

#[tokio::test]
async fn test_history_reaches_planner_and_reset_clears_it() {
    let db = ShopDb::create().await;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![single_task_plan("database_manager")])
            .script(DATABASE_MANAGER, vec![reply("There are 3 customers.")]),
    );
    let mut session = open_session(&db, llm.clone(), &test_config()).await;

    session.process_query("How many customers are there?").await;
    session.process_query("And how many live in Lyon?").await;

    let planner = llm.requests_for(PLANNER);
    assert_eq!(planner.len(), 2);
    let follow_up = &planner[1].messages[1].content;
    assert!(follow_up.contains("User: How many customers are there?"));
    assert!(follow_up.contains("Assistant: There are 3 customers."));
    assert!(follow_up.ends_with("User request: And how many live in Lyon?"));
    assert_eq!(session.history().len(), 2);

    let id = session.id();
    session.reset();
    assert!(session.history().is_empty());
    assert_eq!(session.id(), id);

    session.process_query("Count the orders").await;
    let planner = llm.requests_for(PLANNER);
    assert_eq!(planner[2].messages[1].content, "User request: Count the orders");
}

#[tokio::test]
async fn test_free_function_returns_text_and_urls() {
    let db = ShopDb::create().await;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![single_task_plan("database_manager")])
            .script(DATABASE_MANAGER, vec![reply("3 customers.")]),
    );
    let mut session = open_session(&db, llm, &test_config()).await;

    let (text, urls) = asksql::process_query(&mut session, "How many customers?").await;
    assert_eq!(text, "3 customers.");
    assert!(urls.is_empty());
}

#[tokio::test]
async fn test_blank_question_is_not_planned() {
    let db = ShopDb::create().await;
    let llm = Arc::new(ScriptedLlm::new());
    let mut session = open_session(&db, llm.clone(), &test_config()).await;

    let response = session.process_query("   ").await;
    assert!(!response.text.is_empty());
    assert!(llm.requests_for(PLANNER).is_empty());
    assert!(session.history().is_empty());
}
