//! Planner prompt

use crate::session::ConversationTurn;
use crate::worker::Role;

/// Longest response excerpt from an earlier turn given to the planner
const HISTORY_EXCERPT_CHARS: usize = 600;

pub const PLANNER_PROMPT: &str = r#"You are the Orchestrator of a team that answers questions about a {dialect} database.

## Your Role
- Break the user's request into tasks for your workers
- Decide which tasks depend on the results of others
- Never answer data questions yourself: you cannot see the database

## Workers
{workers}

## Output Format
Reply with a single JSON object and nothing else:

{"tasks": [{"id": "t1", "role": "<worker>", "input": "<instructions>", "depends_on": [], "requires": ["<capability>"]}]}

- `id`: short unique id such as t1, t2
- `role`: one of the worker names above
- `input`: clear, self-contained instructions. You may use {query} for the user's request and {t1} for the output of task t1.
- `depends_on`: ids of tasks whose output this task needs
- `requires`: mandatory, at least one capability the task needs; every one must belong to the chosen worker (mutate_data for any change to data or structure)

Tasks without dependencies run in parallel. The outputs of tasks that nothing depends on are shown to the user, so every final task must produce a complete answer.

If the request needs no database work (a greeting, a question about what you can do), reply with {"tasks": [], "answer": "<your reply>"}.

## Guidelines
- Data questions and requested changes: a single database_manager task is usually enough.
- Analytical questions (trends, aggregates, comparisons): data_analyst.
- Questions about structure: schema_analyst.
- ER diagrams: a schema_analyst task describing the tables, then an erd_specialist task that depends on it.
- Only database_manager may change data or structure."#;

/// Render the planner's system prompt
pub fn planner_prompt(dialect: &str, roles: &[Role]) -> String {
    let workers = roles
        .iter()
        .filter(|r| r.is_delegable() && **r != Role::Formatter)
        .map(|r| {
            let capabilities: Vec<&str> = r.capabilities().iter().map(|c| c.as_str()).collect();
            format!("- {} ({}): {}", r, capabilities.join(", "), role_summary(*r))
        })
        .collect::<Vec<_>>()
        .join("\n");

    PLANNER_PROMPT
        .replace("{dialect}", dialect)
        .replace("{workers}", &workers)
}

fn role_summary(role: Role) -> &'static str {
    match role {
        Role::SchemaAnalyst => "inspects tables, columns, keys and relationships",
        Role::DatabaseManager => "writes and runs SQL to answer questions and change data",
        Role::DataAnalyst => "runs analytical queries and interprets the results",
        Role::ErdSpecialist => "draws Mermaid ER diagrams from a schema description; no database access",
        Role::Formatter => "polishes the final answer",
        Role::Orchestrator => "plans the work",
    }
}

/// User message for the planner: recent turns, then the request
pub fn planner_request(query: &str, history: &[ConversationTurn]) -> String {
    if history.is_empty() {
        return format!("User request: {}", query);
    }

    let mut out = String::from("Recent conversation:\n");
    for turn in history {
        out.push_str(&format!(
            "\nUser: {}\nAssistant: {}\n",
            turn.user_text,
            excerpt(&turn.response_text, HISTORY_EXCERPT_CHARS)
        ));
    }
    out.push_str(&format!("\nUser request: {}", query));
    out
}

/// Message sent back to the planner when its plan was rejected
pub fn plan_rejected(reason: &str) -> String {
    format!(
        "That plan was rejected: {}. Reply with a corrected JSON plan only.",
        reason
    )
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
