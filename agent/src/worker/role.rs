//! Roles and capabilities

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a task is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ReadSchema,
    MutateData,
    RunAnalysis,
    EmitDiagram,
    FormatText,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::ReadSchema => "read_schema",
            Capability::MutateData => "mutate_data",
            Capability::RunAnalysis => "run_analysis",
            Capability::EmitDiagram => "emit_diagram",
            Capability::FormatText => "format_text",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant in a turn
///
/// Every role except [`Role::Orchestrator`] is backed by a worker. The
/// orchestrator plans and aggregates but is never assigned a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SchemaAnalyst,
    DatabaseManager,
    DataAnalyst,
    #[serde(alias = "erd_diagram_specialist")]
    ErdSpecialist,
    #[serde(alias = "format_user_response")]
    Formatter,
    Orchestrator,
}

impl Role {
    /// Roles backed by a worker, in registration order
    pub const WORKERS: [Role; 5] = [
        Role::SchemaAnalyst,
        Role::DatabaseManager,
        Role::DataAnalyst,
        Role::ErdSpecialist,
        Role::Formatter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::SchemaAnalyst => "schema_analyst",
            Role::DatabaseManager => "database_manager",
            Role::DataAnalyst => "data_analyst",
            Role::ErdSpecialist => "erd_specialist",
            Role::Formatter => "formatter",
            Role::Orchestrator => "orchestrator",
        }
    }

    /// Human-facing name, also used to open the role's instruction profile
    pub fn display_name(self) -> &'static str {
        match self {
            Role::SchemaAnalyst => "Schema Analyst",
            Role::DatabaseManager => "Database Manager",
            Role::DataAnalyst => "Data Analyst",
            Role::ErdSpecialist => "ERD Specialist",
            Role::Formatter => "Response Formatter",
            Role::Orchestrator => "Orchestrator",
        }
    }

    /// Fixed capability set
    pub fn capabilities(self) -> &'static [Capability] {
        match self {
            Role::SchemaAnalyst => &[Capability::ReadSchema],
            Role::DatabaseManager => &[Capability::ReadSchema, Capability::MutateData],
            Role::DataAnalyst => &[Capability::ReadSchema, Capability::RunAnalysis],
            Role::ErdSpecialist => &[Capability::EmitDiagram],
            Role::Formatter => &[Capability::FormatText],
            Role::Orchestrator => &[],
        }
    }

    pub fn has_capability(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Whether the role's worker holds the SQL tool
    pub fn uses_sql_tool(self) -> bool {
        self.capabilities().iter().any(|c| {
            matches!(
                c,
                Capability::ReadSchema | Capability::MutateData | Capability::RunAnalysis
            )
        })
    }

    /// Whether the planner may assign tasks to this role
    pub fn is_delegable(self) -> bool {
        self != Role::Orchestrator
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "schema_analyst" => Ok(Role::SchemaAnalyst),
            "database_manager" => Ok(Role::DatabaseManager),
            "data_analyst" => Ok(Role::DataAnalyst),
            "erd_specialist" | "erd_diagram_specialist" => Ok(Role::ErdSpecialist),
            "formatter" | "format_user_response" => Ok(Role::Formatter),
            "orchestrator" => Ok(Role::Orchestrator),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_tool_holders() {
        let holders: Vec<Role> = Role::WORKERS
            .into_iter()
            .filter(|r| r.uses_sql_tool())
            .collect();
        assert_eq!(
            holders,
            vec![Role::SchemaAnalyst, Role::DatabaseManager, Role::DataAnalyst]
        );
        assert!(!Role::Orchestrator.uses_sql_tool());
    }

    #[test]
    fn test_only_database_manager_mutates() {
        for role in Role::WORKERS {
            assert_eq!(
                role.has_capability(Capability::MutateData),
                role == Role::DatabaseManager
            );
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Schema Analyst".parse::<Role>().unwrap(), Role::SchemaAnalyst);
        assert_eq!("erd-diagram-specialist".parse::<Role>().unwrap(), Role::ErdSpecialist);
        assert!("janitor".parse::<Role>().is_err());

        let role: Role = serde_json::from_str("\"erd_diagram_specialist\"").unwrap();
        assert_eq!(role, Role::ErdSpecialist);
        assert_eq!(serde_json::to_string(&Role::DataAnalyst).unwrap(), "\"data_analyst\"");
    }

    #[test]
    fn test_orchestrator_not_delegable() {
        assert!(!Role::Orchestrator.is_delegable());
        assert!(Role::WORKERS.iter().all(|r| r.is_delegable()));
    }
}
