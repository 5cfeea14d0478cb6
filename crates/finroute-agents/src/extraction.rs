use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use finroute_data::TableLoader;
use finroute_models::{ColumnKind, ExecutionContext, ExecutionResult, Role, Table};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::log_operation;
use crate::normalize::normalize_table;
use crate::worker::{into_output, AgentIdentity, WorkerAgent};

pub const LOAD_FAILED: &str = "Failed to load data";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionStats {
    /// `(rows, columns)` before normalization.
    pub original_shape: (usize, usize),
    pub normalized_shape: (usize, usize),
    pub columns_normalized: Vec<String>,
    pub missing_values: BTreeMap<String, usize>,
    pub data_types: BTreeMap<String, ColumnKind>,
}

/// Output of a successful extraction; later agents read `table` from here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionOutput {
    pub table: Table,
    pub extraction_stats: ExtractionStats,
    /// The `data_source` reference, or `"direct"` for an inline table.
    pub source: String,
}

/// Obtains a table (inline or through the loader) and normalizes it.
pub struct DataExtractionAgent {
    identity: AgentIdentity,
    loader: Arc<TableLoader>,
}

impl DataExtractionAgent {
    pub fn new(loader: Arc<TableLoader>) -> Self {
        Self {
            identity: AgentIdentity::new(Role::DataExtraction),
            loader,
        }
    }

    pub fn loader(&self) -> &Arc<TableLoader> {
        &self.loader
    }

    async fn load_source(&self, reference: &str) -> Option<Arc<Table>> {
        match self.loader.load(reference).await {
            Ok(table) => table,
            Err(e) => {
                log_operation!(
                    warn,
                    self.identity,
                    "error",
                    reference,
                    "Failed to load source: {e}"
                );
                None
            }
        }
    }

    async fn extract(
        &self,
        context: &ExecutionContext,
    ) -> Result<serde_json::Map<String, serde_json::Value>, AgentError> {
        self.validate(context)?;
        log_operation!(info, self.identity, "start", "Data extraction started");

        let input = &context.input;
        let table = match (&input.table, &input.data_source) {
            (Some(table), _) => Some(Arc::new(table.clone())),
            (None, Some(reference)) => self.load_source(reference).await,
            (None, None) => None,
        };
        let table = table.ok_or_else(|| AgentError::DataUnavailable(LOAD_FAILED.to_string()))?;

        let normalized = normalize_table(&table);
        let extraction_stats = ExtractionStats {
            original_shape: table.shape(),
            normalized_shape: normalized.shape(),
            columns_normalized: normalized.column_names(),
            missing_values: normalized
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.missing_count()))
                .collect(),
            data_types: normalized
                .columns()
                .iter()
                .map(|c| (c.name.clone(), c.kind()))
                .collect(),
        };

        let (rows, columns) = normalized.shape();
        log_operation!(
            info,
            self.identity,
            "complete",
            rows,
            columns,
            "Data extraction successful"
        );

        into_output(&ExtractionOutput {
            table: normalized,
            extraction_stats,
            source: input
                .data_source
                .clone()
                .unwrap_or_else(|| "direct".to_string()),
        })
    }
}

#[async_trait]
impl WorkerAgent for DataExtractionAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    fn validate(&self, context: &ExecutionContext) -> Result<(), AgentError> {
        let input = &context.input;
        if input.data_source.is_none() && input.table.is_none() {
            return Err(AgentError::Validation(vec![
                "Missing data_source or table in input".to_string(),
            ]));
        }
        Ok(())
    }

    async fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let started = Instant::now();
        let outcome = self.extract(context).await;
        if let Err(e) = &outcome {
            log_operation!(error, self.identity, "error", "Data extraction failed: {e}");
        }
        self.identity.conclude(context, started, outcome)
    }
}
