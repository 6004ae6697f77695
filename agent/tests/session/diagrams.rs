//! Diagram extraction at the end of a turn

use std::sync::Arc;

use asksql::orchestrator::OrchestratorState;

use super::harness::*;

const ERD_PLAN: &str = r#"```json
{
  "tasks": [
    {"id": "t1", "role": "schema_analyst", "input": "Describe every table and its foreign keys.", "requires": ["read_schema"]},
    {"id": "t2", "role": "erd_specialist", "input": "Draw the ER diagram for:\n{t1}", "depends_on": ["t1"], "requires": ["emit_diagram"]}
  ]
}
```"#;

const SCHEMA: &str = "Tables: customers(id PK, name, city), orders(id PK, customer_id FK -> customers.id, total)";

#[tokio::test]
async fn test_er_diagram_becomes_one_url() {
    let db = ShopDb::create().await;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![reply(ERD_PLAN)])
            .script(
                SCHEMA_ANALYST,
                vec![
                    sql_call("SELECT name, sql FROM sqlite_master WHERE type = 'table'"),
                    reply(SCHEMA),
                ],
            )
            .script(
                ERD_SPECIALIST,
                vec![reply(
                    "```mermaid\nerDiagram\n    CUSTOMERS ||--o{ ORDERS : places\n```\nEach customer places zero or more orders.",
                )],
            ),
    );
    let mut session = open_session(&db, llm.clone(), &test_config()).await;

    let response = session.process_query("Show me the ER diagram").await;

    assert_eq!(response.state, OrchestratorState::Done);
    assert_eq!(response.diagram_urls.len(), 1);
    assert!(response.diagram_urls[0].starts_with("https://mermaid.ink/svg/"));
    assert!(!response.text.contains("```mermaid"));
    assert!(response.text.contains("Each customer places zero or more orders."));
    assert!(response.warnings.is_empty());

    // Only the sink task's output reaches the user
    assert!(!response.text.contains("Tables:"));

    // The dependency output was inlined through its placeholder
    let erd = llm.requests_for(ERD_SPECIALIST);
    assert_eq!(erd.len(), 1);
    assert!(erd[0].tools.is_empty());
    assert_eq!(
        erd[0].messages[1].content,
        format!("Draw the ER diagram for:\n{}\n\nUser request: Show me the ER diagram", SCHEMA)
    );

    assert_eq!(session.history()[0].diagram_urls, response.diagram_urls);
}

#[tokio::test]
async fn test_unterminated_diagram_is_reported() {
    let db = ShopDb::create().await;
    let llm = Arc::new(
        ScriptedLlm::new()
            .script(PLANNER, vec![single_task_plan("database_manager")])
            .script(
                DATABASE_MANAGER,
                vec![reply("Here is the layout:\n```mermaid\ngraph LR; customers-->orders")],
            ),
    );
    let mut session = open_session(&db, llm, &test_config()).await;

    let response = session.process_query("Sketch the tables").await;

    assert!(response.diagram_urls.is_empty());
    assert_eq!(response.warnings.len(), 1);
    assert!(response.warnings[0].contains("Invalid Mermaid syntax"));
    assert!(response.text.contains("Here is the layout:"));
}
