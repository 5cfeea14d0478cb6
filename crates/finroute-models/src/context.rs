use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::request::RequestInput;
use crate::result::ExecutionResult;
use crate::role::Role;

/// Eight-character identifier used for trace, session and agent instance ids.
pub fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Input handed to one agent invocation. Built fresh for every invocation
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionContext {
    /// Identifies one end-to-end request; identical in every derived context.
    pub trace_id: String,
    /// Identifies a logical conversation spanning requests.
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    /// Intended recipient.
    pub role: Role,
    pub input: RequestInput,
    /// Results produced earlier in the same delegation sequence.
    pub previous_results: BTreeMap<Role, ExecutionResult>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ExecutionContext {
    /// Top-level context with fresh trace and session ids.
    pub fn new(
        role: Role,
        input: RequestInput,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            trace_id: short_id(),
            session_id: short_id(),
            timestamp: Utc::now(),
            role,
            input,
            previous_results: BTreeMap::new(),
            metadata,
        }
    }

    /// Context for a delegated agent: same trace, session, input and metadata,
    /// fresh timestamp, the given recipient and prior results.
    pub fn derive(&self, role: Role, previous_results: BTreeMap<Role, ExecutionResult>) -> Self {
        Self {
            trace_id: self.trace_id.clone(),
            session_id: self.session_id.clone(),
            timestamp: Utc::now(),
            role,
            input: self.input.clone(),
            previous_results,
            metadata: self.metadata.clone(),
        }
    }
}
