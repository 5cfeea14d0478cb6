use std::sync::{Arc, Mutex};

use finroute_data::TableLoader;
use finroute_models::config::OrchestratorConfig;
use finroute_models::{ExecutionContext, ExecutionResult, RequestInput, Role, Status};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::analysis::QuantitativeAnalysisAgent;
use crate::error::AgentError;
use crate::extraction::DataExtractionAgent;
use crate::supervisor::SupervisorAgent;
use crate::worker::WorkerAgent;

/// Number of most recent results surfaced by the execution summary.
pub const SUMMARY_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionSummary {
    pub total_executions: usize,
    /// Counted over the whole history.
    pub completed: usize,
    /// Counted over the whole history.
    pub failed: usize,
    pub total_duration: f64,
    /// The most recent results, oldest first.
    pub execution_history: Vec<ExecutionResult>,
}

/// Summarize a result history.
pub fn summarize(history: &[ExecutionResult]) -> ExecutionSummary {
    let recent_start = history.len().saturating_sub(SUMMARY_HISTORY_LIMIT);
    ExecutionSummary {
        total_executions: history.len(),
        completed: history
            .iter()
            .filter(|r| r.status == Status::Completed)
            .count(),
        failed: history.iter().filter(|r| r.status == Status::Failed).count(),
        total_duration: history.iter().map(|r| r.duration).sum(),
        execution_history: history[recent_start..].to_vec(),
    }
}

/// Top-level entry point: owns the supervisor, wires the core agents and
/// keeps the history of every request's supervisor result.
pub struct AgentOrchestrator {
    supervisor: SupervisorAgent,
    loader: Arc<TableLoader>,
    metadata: serde_json::Map<String, serde_json::Value>,
    history: Mutex<Vec<ExecutionResult>>,
}

impl AgentOrchestrator {
    pub fn new(loader: Arc<TableLoader>, config: &OrchestratorConfig) -> Self {
        Self {
            supervisor: SupervisorAgent::new(),
            loader,
            metadata: config.metadata.clone(),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn with_loader(loader: Arc<TableLoader>) -> Self {
        Self::new(loader, &OrchestratorConfig::default())
    }

    /// Register the data-extraction and quantitative-analysis agents.
    pub fn setup_core_agents(&self) -> Result<(), AgentError> {
        self.supervisor
            .register(Arc::new(DataExtractionAgent::new(Arc::clone(&self.loader))))?;
        self.supervisor
            .register(Arc::new(QuantitativeAnalysisAgent::new()))?;
        Ok(())
    }

    pub fn supervisor(&self) -> &SupervisorAgent {
        &self.supervisor
    }

    pub fn loader(&self) -> &Arc<TableLoader> {
        &self.loader
    }

    /// Run one request through the supervisor with fresh trace and session
    /// ids. A `query` already present in `input` takes precedence.
    pub async fn execute_query(&self, query: &str, mut input: RequestInput) -> ExecutionResult {
        if input.query.is_none() {
            input.query = Some(query.to_string());
        }
        let context = ExecutionContext::new(Role::Supervisor, input, self.metadata.clone());
        info!(
            trace_id = %context.trace_id,
            session_id = %context.session_id,
            "Executing query"
        );

        let result = self.supervisor.execute(&context).await;

        match self.history.lock() {
            Ok(mut history) => history.push(result.clone()),
            Err(e) => error!(trace_id = %context.trace_id, error = %e, "Execution history unavailable"),
        }

        info!(
            trace_id = %context.trace_id,
            status = %result.status,
            duration = result.duration,
            "Query finished"
        );
        result
    }

    pub fn get_execution_summary(&self) -> Result<ExecutionSummary, AgentError> {
        let history = self
            .history
            .lock()
            .map_err(|e| AgentError::Orchestration(format!("Execution history poisoned: {e}")))?;
        Ok(summarize(&history))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::numeric_table;
    use std::time::Duration;

    fn orchestrator() -> AgentOrchestrator {
        let loader = Arc::new(TableLoader::new(16, Duration::from_secs(60)));
        let orchestrator = AgentOrchestrator::with_loader(loader);
        orchestrator.setup_core_agents().unwrap();
        orchestrator
    }

    fn result(errors: Vec<String>, seconds: u64) -> ExecutionResult {
        ExecutionResult::conclude(
            Role::Supervisor,
            "t".to_string(),
            serde_json::Map::new(),
            errors,
            Duration::from_secs(seconds),
            1,
        )
    }

    #[test]
    fn setup_registers_both_workers() {
        let orchestrator = orchestrator();
        assert_eq!(
            orchestrator.supervisor().registered_roles().unwrap(),
            vec![Role::DataExtraction, Role::QuantitativeAnalysis]
        );
    }

    #[test]
    fn summary_counts_whole_history() {
        let mut history: Vec<ExecutionResult> = (0..9).map(|_| result(vec![], 1)).collect();
        history.extend((0..3).map(|_| result(vec!["boom".to_string()], 2)));

        let summary = summarize(&history);
        assert_eq!(summary.total_executions, 12);
        assert_eq!(summary.completed, 9);
        assert_eq!(summary.failed, 3);
        assert!((summary.total_duration - 15.0).abs() < 1e-9);
        assert_eq!(summary.execution_history.len(), SUMMARY_HISTORY_LIMIT);
        assert!(summary.execution_history[9].is_failed());
    }

    #[test]
    fn empty_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.total_executions, 0);
        assert!(summary.execution_history.is_empty());
    }

    #[tokio::test]
    async fn execute_query_records_history() {
        let orchestrator = orchestrator();
        let input = RequestInput::default()
            .with_table(numeric_table("revenue", &[10.0, 20.0, 30.0]))
            .with_analysis_type("trends");

        let first = orchestrator.execute_query("analyze trends", input.clone()).await;
        let second = orchestrator.execute_query("analyze trends", input).await;

        assert!(first.is_completed());
        assert_ne!(first.trace_id, second.trace_id);

        let summary = orchestrator.get_execution_summary().unwrap();
        assert_eq!(summary.total_executions, 2);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.execution_history[1].trace_id, second.trace_id);
    }

    #[tokio::test]
    async fn failed_worker_still_completes_request() {
        let orchestrator = orchestrator();
        let result = orchestrator
            .execute_query("trend", RequestInput::default())
            .await;

        // Analysis fails validation without a table; the supervisor itself
        // still completes.
        assert!(result.is_completed());
        let json = serde_json::to_value(&result).unwrap();
        let analysis = &json["output"]["delegated_results"]["quantitative_analysis"];
        assert_eq!(analysis["status"], serde_json::json!("failed"));
        assert_eq!(analysis["trace_id"], json["trace_id"]);
    }

    #[tokio::test]
    async fn payload_query_takes_precedence() {
        let orchestrator = orchestrator();
        let input = RequestInput {
            query: Some("load the books".to_string()),
            ..Default::default()
        };
        orchestrator.execute_query("analyze", input).await;

        let history = orchestrator.supervisor().get_conversation_history().unwrap();
        assert_eq!(history[0].content, "load the books");
    }
}
