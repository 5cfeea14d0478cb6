use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use finroute_models::{ExecutionContext, ExecutionResult, Role, Status};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::log_operation;
use crate::worker::{into_output, AgentIdentity, WorkerAgent};

const EXTRACTION_KEYWORDS: [&str; 5] = ["extract", "fetch", "retrieve", "load", "import"];
const ANALYSIS_KEYWORDS: [&str; 6] = ["analyze", "calculate", "forecast", "trend", "metric", "kpi"];

/// Roles a query needs, in delegation order.
///
/// Case-insensitive substring match against each role's keyword set; every
/// matching role is selected. With no match at all the query goes to
/// quantitative analysis alone.
pub fn route_query(query: &str) -> Vec<Role> {
    let query = query.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| query.contains(k));

    let roles: Vec<Role> = Role::DELEGATION_ORDER
        .into_iter()
        .filter(|role| match role {
            Role::DataExtraction => matches(&EXTRACTION_KEYWORDS),
            Role::QuantitativeAnalysis => matches(&ANALYSIS_KEYWORDS),
            Role::Supervisor => false,
        })
        .collect();

    if roles.is_empty() {
        vec![Role::QuantitativeAnalysis]
    } else {
        roles
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationTurn {
    /// Always `"user"` for turns recorded by the supervisor.
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelegationRecord {
    pub timestamp: DateTime<Utc>,
    pub delegated_to: Role,
    pub status: Status,
    pub duration: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SupervisorOutput {
    pub delegated_results: BTreeMap<Role, ExecutionResult>,
    /// Every delegation this supervisor has made, not just this request's.
    pub delegation_log: Vec<DelegationRecord>,
    pub conversation_turn: usize,
}

#[derive(Default)]
struct SupervisorState {
    conversation: Vec<ConversationTurn>,
    delegation_log: Vec<DelegationRecord>,
}

/// Routes a request to worker agents and aggregates their results.
///
/// Workers run one at a time in [`Role::DELEGATION_ORDER`]; each sees the
/// results of the workers before it in `previous_results`. A failed worker
/// never stops the sequence.
pub struct SupervisorAgent {
    identity: AgentIdentity,
    registry: RwLock<HashMap<Role, Arc<dyn WorkerAgent>>>,
    state: Mutex<SupervisorState>,
}

impl SupervisorAgent {
    pub fn new() -> Self {
        Self {
            identity: AgentIdentity::new(Role::Supervisor),
            registry: RwLock::new(HashMap::new()),
            state: Mutex::new(SupervisorState::default()),
        }
    }

    /// Register a worker under its role, replacing any earlier registration.
    pub fn register(&self, worker: Arc<dyn WorkerAgent>) -> Result<(), AgentError> {
        let role = worker.role();
        self.registry
            .write()
            .map_err(|e| AgentError::Orchestration(format!("Registry lock poisoned: {e}")))?
            .insert(role, worker);
        log_operation!(info, self.identity, "registered", "Agent {role} registered");
        Ok(())
    }

    pub fn registered_roles(&self) -> Result<Vec<Role>, AgentError> {
        let registry = self
            .registry
            .read()
            .map_err(|e| AgentError::Orchestration(format!("Registry lock poisoned: {e}")))?;
        let mut roles: Vec<Role> = registry.keys().copied().collect();
        roles.sort();
        Ok(roles)
    }

    fn worker(&self, role: Role) -> Result<Option<Arc<dyn WorkerAgent>>, AgentError> {
        let registry = self
            .registry
            .read()
            .map_err(|e| AgentError::Orchestration(format!("Registry lock poisoned: {e}")))?;
        Ok(registry.get(&role).cloned())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SupervisorState>, AgentError> {
        self.state
            .lock()
            .map_err(|e| AgentError::Orchestration(format!("Supervisor state poisoned: {e}")))
    }

    pub fn get_conversation_history(&self) -> Result<Vec<ConversationTurn>, AgentError> {
        Ok(self.lock_state()?.conversation.clone())
    }

    /// Drop all conversation turns. The delegation log is kept.
    pub fn clear_conversation_history(&self) -> Result<(), AgentError> {
        self.lock_state()?.conversation.clear();
        log_operation!(info, self.identity, "cleared", "Conversation history cleared");
        Ok(())
    }

    pub fn delegation_log(&self) -> Result<Vec<DelegationRecord>, AgentError> {
        Ok(self.lock_state()?.delegation_log.clone())
    }

    async fn coordinate(
        &self,
        context: &ExecutionContext,
    ) -> Result<serde_json::Map<String, serde_json::Value>, AgentError> {
        let query = context.input.query();
        log_operation!(
            info,
            self.identity,
            "start",
            request_trace = %context.trace_id,
            query_len = query.len(),
            "Supervisor execution started"
        );

        // 1. Route
        let roles = route_query(query);

        // 2. Record the user turn
        self.lock_state()?.conversation.push(ConversationTurn {
            role: "user".to_string(),
            content: query.to_string(),
            timestamp: Utc::now(),
        });

        // 3. Delegate sequentially; each worker sees what ran before it
        let mut delegated: BTreeMap<Role, ExecutionResult> = BTreeMap::new();
        for role in &roles {
            let Some(worker) = self.worker(*role)? else {
                log_operation!(
                    warn,
                    self.identity,
                    "complete",
                    delegated_to = %role,
                    skipped = true,
                    "No agent registered for role"
                );
                continue;
            };

            let delegation_context = context.derive(*role, delegated.clone());
            let result = worker.execute(&delegation_context).await;

            self.lock_state()?.delegation_log.push(DelegationRecord {
                timestamp: Utc::now(),
                delegated_to: *role,
                status: result.status,
                duration: result.duration,
            });
            delegated.insert(*role, result);
        }

        // 4. Aggregate
        let (delegation_log, conversation_turn) = {
            let state = self.lock_state()?;
            (state.delegation_log.clone(), state.conversation.len())
        };

        log_operation!(
            info,
            self.identity,
            "complete",
            delegated_agents = roles.len(),
            results = delegated.len(),
            "Supervisor coordination completed"
        );

        into_output(&SupervisorOutput {
            delegated_results: delegated,
            delegation_log,
            conversation_turn,
        })
    }
}

impl Default for SupervisorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerAgent for SupervisorAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let started = Instant::now();
        let outcome = self.coordinate(context).await;
        if let Err(e) = &outcome {
            log_operation!(error, self.identity, "error", "Supervisor execution failed: {e}");
        }
        self.identity.conclude(context, started, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{numeric_table, RecordingWorker};
    use finroute_models::RequestInput;

    fn request(query: &str) -> ExecutionContext {
        ExecutionContext::new(
            Role::Supervisor,
            RequestInput {
                query: Some(query.to_string()),
                ..Default::default()
            },
            Default::default(),
        )
    }

    #[test]
    fn extraction_keywords_route_to_extraction_only() {
        for query in ["extract the ledger", "Please FETCH q3", "import sales.csv", "reload"] {
            assert_eq!(route_query(query), vec![Role::DataExtraction], "{query}");
        }
    }

    #[test]
    fn analysis_keywords_route_to_analysis_only() {
        for query in ["analyze margins", "Show KPI deck", "revenue trends", "calculate churn"] {
            assert_eq!(route_query(query), vec![Role::QuantitativeAnalysis], "{query}");
        }
    }

    #[test]
    fn both_keyword_sets_route_in_declaration_order() {
        assert_eq!(
            route_query("calculate metrics after you load the file"),
            vec![Role::DataExtraction, Role::QuantitativeAnalysis]
        );
    }

    #[test]
    fn unmatched_query_defaults_to_analysis() {
        assert_eq!(route_query("hello there"), vec![Role::QuantitativeAnalysis]);
        assert_eq!(route_query(""), vec![Role::QuantitativeAnalysis]);
    }

    #[test]
    fn last_registration_wins() {
        let supervisor = SupervisorAgent::new();
        let first = Arc::new(RecordingWorker::new(Role::DataExtraction));
        let second = Arc::new(RecordingWorker::new(Role::DataExtraction));
        supervisor.register(first).unwrap();
        supervisor.register(second.clone()).unwrap();

        assert_eq!(supervisor.registered_roles().unwrap(), vec![Role::DataExtraction]);
        let registered = supervisor.worker(Role::DataExtraction).unwrap().unwrap();
        assert_eq!(
            registered.identity().trace_id(),
            second.identity().trace_id()
        );
    }

    #[tokio::test]
    async fn later_worker_sees_earlier_results() {
        let supervisor = SupervisorAgent::new();
        let extraction = Arc::new(RecordingWorker::new(Role::DataExtraction));
        let analysis = Arc::new(RecordingWorker::new(Role::QuantitativeAnalysis));
        supervisor.register(analysis.clone()).unwrap();
        supervisor.register(extraction.clone()).unwrap();

        let ctx = request("load and analyze");
        let result = supervisor.execute(&ctx).await;
        assert!(result.is_completed());

        let seen_by_extraction = extraction.observed().await;
        let seen_by_analysis = analysis.observed().await;
        assert_eq!(seen_by_extraction.len(), 1);
        assert!(seen_by_extraction[0].previous_results.is_empty());
        assert_eq!(
            seen_by_analysis[0].previous_results.keys().copied().collect::<Vec<_>>(),
            vec![Role::DataExtraction]
        );
        assert_eq!(seen_by_analysis[0].trace_id, ctx.trace_id);
        assert_eq!(seen_by_analysis[0].session_id, ctx.session_id);
        assert_eq!(seen_by_analysis[0].role, Role::QuantitativeAnalysis);

        let output: SupervisorOutput = result.output_as().unwrap();
        assert_eq!(output.delegated_results.len(), 2);
        assert_eq!(output.conversation_turn, 1);
        assert_eq!(
            output
                .delegation_log
                .iter()
                .map(|r| r.delegated_to)
                .collect::<Vec<_>>(),
            vec![Role::DataExtraction, Role::QuantitativeAnalysis]
        );
    }

    #[tokio::test]
    async fn failed_worker_does_not_stop_delegation() {
        let supervisor = SupervisorAgent::new();
        supervisor
            .register(Arc::new(RecordingWorker::failing(
                Role::DataExtraction,
                "Failed to load data",
            )))
            .unwrap();
        let analysis = Arc::new(RecordingWorker::new(Role::QuantitativeAnalysis));
        supervisor.register(analysis.clone()).unwrap();

        let result = supervisor.execute(&request("fetch then analyze")).await;
        assert_eq!(result.status, Status::Completed);

        let output: SupervisorOutput = result.output_as().unwrap();
        assert_eq!(
            output.delegated_results[&Role::DataExtraction].status,
            Status::Failed
        );
        assert_eq!(
            analysis.observed().await[0].previous_results[&Role::DataExtraction].errors,
            vec!["Failed to load data"]
        );
    }

    #[tokio::test]
    async fn unregistered_roles_are_skipped() {
        let supervisor = SupervisorAgent::new();
        let result = supervisor.execute(&request("analyze")).await;

        assert!(result.is_completed());
        let output: SupervisorOutput = result.output_as().unwrap();
        assert!(output.delegated_results.is_empty());
        assert!(output.delegation_log.is_empty());
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn fields(&self) -> Vec<serde_json::Value> {
            let raw = self.0.lock().unwrap().clone();
            String::from_utf8(raw)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str::<serde_json::Value>(line).unwrap()["fields"].clone())
                .collect()
        }
    }

    #[tokio::test]
    async fn unregistered_role_logs_a_completed_skip() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let supervisor = SupervisorAgent::new();
        supervisor.execute(&request("analyze")).await;

        let fields = logs.fields();
        for event in &fields {
            let status = event["status"].as_str().unwrap();
            assert!(
                ["start", "complete", "error", "registered", "cleared"].contains(&status),
                "unexpected status tag {status}"
            );
        }
        let skip = fields
            .iter()
            .find(|f| f["skipped"] == serde_json::json!(true))
            .expect("skip event logged");
        assert_eq!(skip["status"], "complete");
        assert_eq!(skip["delegated_to"], "quantitative_analysis");
        assert_eq!(skip["agent"], "supervisor");
    }

    #[tokio::test]
    async fn delegation_log_spans_requests_and_survives_clear() {
        let supervisor = SupervisorAgent::new();
        supervisor
            .register(Arc::new(RecordingWorker::new(Role::QuantitativeAnalysis)))
            .unwrap();

        supervisor.execute(&request("trend one")).await;
        let second = supervisor.execute(&request("trend two")).await;
        let output: SupervisorOutput = second.output_as().unwrap();
        assert_eq!(output.delegation_log.len(), 2);
        assert_eq!(output.conversation_turn, 2);

        let history = supervisor.get_conversation_history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].content, "trend two");

        supervisor.clear_conversation_history().unwrap();
        assert!(supervisor.get_conversation_history().unwrap().is_empty());
        assert_eq!(supervisor.delegation_log().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn result_carries_request_trace_and_counter() {
        let supervisor = SupervisorAgent::new();
        let ctx = request("anything");
        let first = supervisor.execute(&ctx).await;
        let second = supervisor.execute(&ctx).await;

        assert_eq!(first.role, Role::Supervisor);
        assert_eq!(first.trace_id, ctx.trace_id);
        assert_eq!(first.metadata.execution_count, 1);
        assert_eq!(second.metadata.execution_count, 2);
    }

    #[tokio::test]
    async fn poisoned_state_fails_the_supervisor() {
        let supervisor = SupervisorAgent::new();
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = supervisor.state.lock().unwrap();
            panic!("poison the supervisor state");
        }));

        let result = supervisor.execute(&request("analyze")).await;
        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Orchestration error"));
        assert!(result.output.is_empty());
    }

    #[tokio::test]
    async fn real_table_flows_through_recording_worker() {
        let supervisor = SupervisorAgent::new();
        let analysis = Arc::new(RecordingWorker::new(Role::QuantitativeAnalysis));
        supervisor.register(analysis.clone()).unwrap();

        let ctx = ExecutionContext::new(
            Role::Supervisor,
            RequestInput {
                query: Some("kpi review".to_string()),
                ..Default::default()
            }
            .with_table(numeric_table("revenue", &[1.0, 2.0])),
            Default::default(),
        );
        supervisor.execute(&ctx).await;

        assert_eq!(analysis.observed().await[0].input, ctx.input);
    }
}
