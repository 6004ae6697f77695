//! Worker registry
//!
//! Built once per session and shared read-only with the orchestrator.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::{Role, SqlTool, Worker, WorkerConfig};
use crate::config::WorkerOverride;
use crate::llm::Llm;

/// The session's workers, keyed by role
#[derive(Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<Role, Arc<Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every worker role with its default profile plus overrides
    ///
    /// Data roles receive the SQL tool; the others get none.
    pub fn build(
        llm: Arc<dyn Llm>,
        sql: Arc<dyn SqlTool>,
        dialect: &str,
        overrides: &HashMap<Role, WorkerOverride>,
    ) -> Self {
        let mut registry = Self::new();

        for role in Role::WORKERS {
            let mut config = WorkerConfig::for_role(role, dialect);
            if let Some(section) = overrides.get(&role) {
                config = config.apply(section);
            }

            let mut worker = Worker::new(config, llm.clone());
            if role.uses_sql_tool() {
                worker = worker.with_sql_tool(sql.clone());
            }
            registry.register(worker);
        }

        tracing::debug!(roles = ?registry.roles(), "Worker registry built");
        registry
    }

    /// Add or replace the worker for its role
    pub fn register(&mut self, worker: Worker) {
        self.workers.insert(worker.role(), Arc::new(worker));
    }

    pub fn get(&self, role: Role) -> Option<Arc<Worker>> {
        self.workers.get(&role).cloned()
    }

    pub fn contains(&self, role: Role) -> bool {
        self.workers.contains_key(&role)
    }

    pub fn roles(&self) -> Vec<Role> {
        self.workers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
