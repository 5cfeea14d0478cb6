use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use finroute_models::{ExecutionContext, ExecutionResult, Role, Table};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::log_operation;
use crate::stats;
use crate::worker::{into_output, AgentIdentity, WorkerAgent};

pub const EMPTY_TABLE: &str = "Invalid or empty dataframe";

const METRIC_COLUMNS: usize = 5;
const TREND_COLUMNS: usize = 3;
const ANOMALY_COLUMNS: usize = 3;
const MAX_FLAGGED_ROWS: usize = 10;
const ANOMALY_SIGMAS: f64 = 3.0;
const MAGNITUDE_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Comprehensive,
    Metrics,
    Trends,
    Anomalies,
}

impl AnalysisKind {
    fn includes(&self, other: AnalysisKind) -> bool {
        *self == AnalysisKind::Comprehensive || *self == other
    }
}

impl FromStr for AnalysisKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comprehensive" => Ok(AnalysisKind::Comprehensive),
            "metrics" => Ok(AnalysisKind::Metrics),
            "trends" => Ok(AnalysisKind::Trends),
            "anomalies" => Ok(AnalysisKind::Anomalies),
            other => Err(AgentError::Computation(format!(
                "Unsupported analysis_type: {other}"
            ))),
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            AnalysisKind::Comprehensive => "comprehensive",
            AnalysisKind::Metrics => "metrics",
            AnalysisKind::Trends => "trends",
            AnalysisKind::Anomalies => "anomalies",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMetrics {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation; `None` with fewer than two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrendSummary {
    pub direction: TrendDirection,
    /// `|end - start| / (start + 1e-10)`
    pub magnitude: f64,
    pub start_value: f64,
    pub end_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Analyses {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, ColumnMetrics>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trends: Option<BTreeMap<String, TrendSummary>>,
    /// Flagged row indices per column; columns without anomalies are absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<BTreeMap<String, Vec<usize>>>,
}

impl Analyses {
    pub fn performed(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.metrics.is_some() {
            names.push("metrics");
        }
        if self.trends.is_some() {
            names.push("trends");
        }
        if self.anomalies.is_some() {
            names.push("anomalies");
        }
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisOutput {
    pub analyses: Analyses,
    /// The requested type, echoed as given.
    pub analysis_type: String,
    pub data_shape: (usize, usize),
    pub timestamp: DateTime<Utc>,
}

/// Metrics for the first five numeric columns.
pub fn calculate_metrics(table: &Table) -> BTreeMap<String, ColumnMetrics> {
    table
        .numeric_columns()
        .take(METRIC_COLUMNS)
        .map(|column| {
            let values = stats::present(&column.numeric_values());
            let metrics = ColumnMetrics {
                mean: stats::mean(&values),
                median: stats::median(&values),
                std: stats::std_dev(&values),
                min: stats::min(&values),
                max: stats::max(&values),
            };
            (column.name.clone(), metrics)
        })
        .collect()
}

/// First-to-last movement for those of the first three numeric columns that
/// have at least two present values.
pub fn calculate_trends(table: &Table) -> BTreeMap<String, TrendSummary> {
    let mut trends = BTreeMap::new();
    for column in table.numeric_columns().take(TREND_COLUMNS) {
        let values = stats::present(&column.numeric_values());
        let (Some(&start), Some(&end)) = (values.first(), values.last()) else {
            continue;
        };
        if values.len() < 2 {
            continue;
        }
        let direction = if end > start {
            TrendDirection::Increasing
        } else {
            TrendDirection::Decreasing
        };
        trends.insert(
            column.name.clone(),
            TrendSummary {
                direction,
                magnitude: (end - start).abs() / (start + MAGNITUDE_EPSILON),
                start_value: start,
                end_value: end,
            },
        );
    }
    trends
}

/// Rows strictly above `mean + 3·std`, for those of the first three numeric
/// columns with more than two present values. At most ten rows per column.
pub fn detect_anomalies(table: &Table) -> BTreeMap<String, Vec<usize>> {
    let mut anomalies = BTreeMap::new();
    for column in table.numeric_columns().take(ANOMALY_COLUMNS) {
        let by_row = column.numeric_values();
        let values = stats::present(&by_row);
        if values.len() <= 2 {
            continue;
        }
        let (Some(mean), Some(std)) = (stats::mean(&values), stats::std_dev(&values)) else {
            continue;
        };
        let threshold = mean + ANOMALY_SIGMAS * std;

        let flagged: Vec<usize> = by_row
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some_and(|v| v > threshold))
            .map(|(row, _)| row)
            .take(MAX_FLAGGED_ROWS)
            .collect();
        if !flagged.is_empty() {
            anomalies.insert(column.name.clone(), flagged);
        }
    }
    anomalies
}

/// Run the analyses `kind` selects. An unrecognized kind selects nothing.
pub fn perform_analyses(table: &Table, kind: Option<AnalysisKind>) -> Analyses {
    let Some(kind) = kind else {
        return Analyses::default();
    };
    Analyses {
        metrics: kind
            .includes(AnalysisKind::Metrics)
            .then(|| calculate_metrics(table)),
        trends: kind
            .includes(AnalysisKind::Trends)
            .then(|| calculate_trends(table)),
        anomalies: kind
            .includes(AnalysisKind::Anomalies)
            .then(|| detect_anomalies(table)),
    }
}

/// The part of an extraction result this agent consumes.
#[derive(Deserialize)]
struct UpstreamTable {
    #[serde(default)]
    table: Option<Table>,
}

/// Computes metrics, trends and anomalies over numeric columns.
pub struct QuantitativeAnalysisAgent {
    identity: AgentIdentity,
}

impl QuantitativeAnalysisAgent {
    pub fn new() -> Self {
        Self {
            identity: AgentIdentity::new(Role::QuantitativeAnalysis),
        }
    }

    /// Inline table first, then the extraction agent's output.
    fn resolve_table(&self, context: &ExecutionContext) -> Result<Option<Table>, AgentError> {
        if let Some(table) = &context.input.table {
            return Ok(Some(table.clone()));
        }
        match context.previous_results.get(&Role::DataExtraction) {
            Some(extraction) => Ok(extraction.output_as::<UpstreamTable>()?.table),
            None => Ok(None),
        }
    }

    async fn analyze(
        &self,
        context: &ExecutionContext,
    ) -> Result<serde_json::Map<String, serde_json::Value>, AgentError> {
        self.validate(context)?;
        let requested = context.input.analysis_type.as_deref().unwrap_or_default();
        log_operation!(
            info,
            self.identity,
            "start",
            analysis_type = requested,
            "Quantitative analysis started"
        );

        let table = self
            .resolve_table(context)?
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AgentError::DataUnavailable(EMPTY_TABLE.to_string()))?;
        let kind = requested.parse::<AnalysisKind>().ok();
        if kind.is_none() {
            log_operation!(
                warn,
                self.identity,
                "start",
                analysis_type = requested,
                "Unrecognized analysis_type, no analyses selected"
            );
        }

        let analyses = perform_analyses(&table, kind);
        log_operation!(
            info,
            self.identity,
            "complete",
            analyses_performed = ?analyses.performed(),
            "Quantitative analysis completed"
        );

        into_output(&AnalysisOutput {
            analyses,
            analysis_type: requested.to_string(),
            data_shape: table.shape(),
            timestamp: Utc::now(),
        })
    }
}

impl Default for QuantitativeAnalysisAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerAgent for QuantitativeAnalysisAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    fn validate(&self, context: &ExecutionContext) -> Result<(), AgentError> {
        let mut errors = Vec::new();
        if context.input.table.is_none() && context.previous_results.is_empty() {
            errors.push("Missing table or previous extraction results".to_string());
        }
        if context.input.analysis_type.is_none() {
            errors.push("Missing analysis_type specification".to_string());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Validation(errors))
        }
    }

    async fn execute(&self, context: &ExecutionContext) -> ExecutionResult {
        let started = Instant::now();
        let outcome = self.analyze(context).await;
        if let Err(e) = &outcome {
            log_operation!(error, self.identity, "error", "Analysis failed: {e}");
        }
        self.identity.conclude(context, started, outcome)
    }
}
