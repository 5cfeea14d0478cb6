use serde::{Deserialize, Serialize};

use crate::table::Table;

/// Request payload carried in every context of one request.
///
/// Recognized fields are typed; anything else lands in `extra` and is passed
/// through to every worker unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RequestInput {
    /// Free text scanned by the supervisor's router.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Source reference resolved by the table loader (path, cached name, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
    /// Inline table. Takes precedence over `data_source`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Table>,
    /// One of `comprehensive`, `metrics`, `trends`, `anomalies`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RequestInput {
    pub fn with_table(mut self, table: Table) -> Self {
        self.table = Some(table);
        self
    }

    pub fn with_data_source(mut self, source: impl Into<String>) -> Self {
        self.data_source = Some(source.into());
        self
    }

    pub fn with_analysis_type(mut self, kind: impl Into<String>) -> Self {
        self.analysis_type = Some(kind.into());
        self
    }

    pub fn query(&self) -> &str {
        self.query.as_deref().unwrap_or_default()
    }
}
