use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use finroute_models::{short_id, ExecutionContext, ExecutionResult, Role};

use crate::error::AgentError;

/// Emit one structured log line for an agent phase.
///
/// Stamps `agent` (role name), `trace_id` (the agent's instance id) and
/// `status` (phase tag) ahead of any call-site fields and the message.
#[macro_export]
macro_rules! log_operation {
    ($level:ident, $identity:expr, $status:literal, $($rest:tt)+) => {{
        let identity: &$crate::worker::AgentIdentity = &$identity;
        ::tracing::$level!(
            agent = %identity.role(),
            trace_id = %identity.trace_id(),
            status = $status,
            $($rest)+
        )
    }};
}

/// Per-instance identity shared by every agent: role, an instance trace id
/// fixed at construction, and an invocation counter that never resets.
#[derive(Debug)]
pub struct AgentIdentity {
    role: Role,
    trace_id: String,
    invocations: AtomicU64,
}

impl AgentIdentity {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            trace_id: short_id(),
            invocations: AtomicU64::new(0),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::SeqCst)
    }

    /// Count one invocation and return the new total.
    pub fn record_invocation(&self) -> u64 {
        self.invocations.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Close out one invocation: bump the counter and build the result from
    /// the outcome. The result carries the context's trace id.
    pub fn conclude(
        &self,
        context: &ExecutionContext,
        started: Instant,
        outcome: Result<serde_json::Map<String, serde_json::Value>, AgentError>,
    ) -> ExecutionResult {
        let (output, errors) = match outcome {
            Ok(output) => (output, Vec::new()),
            Err(e) => (serde_json::Map::new(), e.into_messages()),
        };
        let execution_count = self.record_invocation();
        ExecutionResult::conclude(
            self.role,
            context.trace_id.clone(),
            output,
            errors,
            started.elapsed(),
            execution_count,
        )
    }
}

/// A unit of work bound to exactly one role.
///
/// `execute` never fails: every problem ends up in the returned result's
/// `errors` with status `Failed`.
#[async_trait]
pub trait WorkerAgent: Send + Sync {
    fn identity(&self) -> &AgentIdentity;

    fn role(&self) -> Role {
        self.identity().role()
    }

    /// Check the context carries what this agent needs. No side effects.
    fn validate(&self, _context: &ExecutionContext) -> Result<(), AgentError> {
        Ok(())
    }

    async fn execute(&self, context: &ExecutionContext) -> ExecutionResult;
}

/// Serialize a typed output into the plain-data map stored on a result.
pub(crate) fn into_output<T: serde::Serialize>(
    value: &T,
) -> Result<serde_json::Map<String, serde_json::Value>, AgentError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AgentError::Computation(format!(
            "Agent output must be an object, got {other}"
        ))),
    }
}
