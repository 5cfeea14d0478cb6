use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::role::{Role, Status};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResultMetadata {
    /// Invocation counter of the producing agent after this call.
    pub execution_count: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of exactly one agent invocation. Read-only once produced.
///
/// `status` is `Failed` exactly when `errors` is non-empty; use
/// [`ExecutionResult::conclude`] to keep that true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    pub role: Role,
    pub status: Status,
    pub output: serde_json::Map<String, serde_json::Value>,
    /// Wall-clock seconds spent in this invocation.
    pub duration: f64,
    /// Copied from the triggering context.
    pub trace_id: String,
    pub errors: Vec<String>,
    pub metadata: ResultMetadata,
}

impl ExecutionResult {
    pub fn conclude(
        role: Role,
        trace_id: String,
        output: serde_json::Map<String, serde_json::Value>,
        errors: Vec<String>,
        elapsed: Duration,
        execution_count: u64,
    ) -> Self {
        let status = if errors.is_empty() {
            Status::Completed
        } else {
            Status::Failed
        };
        Self {
            role,
            status,
            output,
            duration: elapsed.as_secs_f64(),
            trace_id,
            errors,
            metadata: ResultMetadata {
                execution_count,
                extra: serde_json::Map::new(),
            },
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }

    /// Deserialize `output` into a typed view.
    pub fn output_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(serde_json::Value::Object(self.output.clone()))
    }
}
