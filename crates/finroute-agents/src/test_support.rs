//! Test support: table builders and a recording mock worker.
//!
//! `RecordingWorker` keeps every context it receives so tests can assert
//! delegation order and what was visible in `previous_results`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use finroute_models::{Cell, Column, ExecutionContext, ExecutionResult, Role, Table};
use tokio::sync::Mutex;

use crate::error::AgentError;
use crate::worker::{AgentIdentity, WorkerAgent};

/// Single numeric column table.
pub fn numeric_table(name: &str, values: &[f64]) -> Table {
    Table::new(vec![Column::numeric(name, values)]).expect("single column is rectangular")
}

/// A raw monthly ledger the way it arrives from a spreadsheet export:
/// untidy headers, currency strings, a gap.
pub fn raw_ledger() -> Table {
    Table::new(vec![
        Column::text("Month", &["Jan", "Feb", "Mar", "Apr", "May", "Jun"]),
        Column::text(
            "Gross Revenue ($)",
            &["$1,000", "$1,150", "$1,210", "$1,300", "n/a", "$1,480"],
        ),
        Column::new(
            "Operating  Cost",
            vec![
                Cell::Number(700.0),
                Cell::Number(720.0),
                Cell::Number(705.0),
                Cell::Missing,
                Cell::Number(760.0),
                Cell::Number(790.0),
            ],
        ),
        Column::text("Region", &["north", "north", "south", "south", "east", "east"]),
    ])
    .expect("ledger columns share a length")
}

/// Mock worker recording every context it is handed.
pub struct RecordingWorker {
    identity: AgentIdentity,
    observed: Arc<Mutex<Vec<ExecutionContext>>>,
    failure: Option<String>,
}

impl RecordingWorker {
    pub fn new(role: Role) -> Self {
        Self {
            identity: AgentIdentity::new(role),
            observed: Arc::new(Mutex::new(Vec::new())),
            failure: None,
        }
    }

    pub fn failing(role: Role, message: &str) -> Self {
        let mut worker = Self::new(role);
        worker.failure = Some(message.to_string());
        worker
    }

    pub async fn observed(&self) -> Vec<ExecutionContext> {
        self.observed.lock().await.clone()
    }
}

#[async_trait]
impl WorkerAgent for RecordingWorker {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let started = Instant::now();
        self.observed.lock().await.push(context.clone());

        let outcome = match &self.failure {
            Some(message) => Err(AgentError::DataUnavailable(message.clone())),
            None => {
                let mut output = serde_json::Map::new();
                output.insert(
                    "seen_previous".to_string(),
                    serde_json::json!(context.previous_results.len()),
                );
                Ok(output)
            }
        };
        self.identity.conclude(context, started, outcome)
    }
}
