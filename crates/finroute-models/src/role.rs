use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability tag of an agent. Also the supervisor's registry key.
///
/// The declaration order is the delegation order: `Ord` follows it, so a
/// `BTreeMap<Role, _>` iterates roles the way the supervisor runs them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    DataExtraction,
    QuantitativeAnalysis,
    Supervisor,
}

impl Role {
    /// Worker roles in the fixed order the supervisor delegates to them.
    pub const DELEGATION_ORDER: [Role; 2] = [Role::DataExtraction, Role::QuantitativeAnalysis];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::DataExtraction => "data_extraction",
            Role::QuantitativeAnalysis => "quantitative_analysis",
            Role::Supervisor => "supervisor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution status of one agent invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Status::Idle => "idle",
            Status::Running => "running",
            Status::Completed => "completed",
            Status::Failed => "failed",
        };
        f.write_str(tag)
    }
}
