//! finroute - hierarchical task routing for financial data requests
//!
//! A supervisor agent routes each natural-language request to the data
//! extraction and quantitative analysis workers, runs them in order and
//! aggregates their results. The orchestrator keeps the request history.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use finroute::models::{FinrouteConfig, RequestInput};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let orchestrator = finroute::build_orchestrator(&FinrouteConfig::default())?;
//! let input = RequestInput::default()
//!     .with_data_source("ledger.csv")
//!     .with_analysis_type("trends");
//! let result = orchestrator.execute_query("load the ledger and analyze trends", input).await;
//! println!("{}", serde_json::to_string(&result)?);
//! # Ok(())
//! # }
//! ```

pub use finroute_agents as agents;
pub use finroute_data as data;
pub use finroute_models as models;

use std::sync::Arc;

use finroute_agents::AgentOrchestrator;
use finroute_data::TableLoader;
use finroute_models::config::FinrouteConfig;

/// Build an orchestrator with the core agents registered.
pub fn build_orchestrator(config: &FinrouteConfig) -> Result<AgentOrchestrator, anyhow::Error> {
    let loader = Arc::new(TableLoader::from_config(&config.cache));
    let orchestrator = AgentOrchestrator::new(loader, &config.orchestrator);
    orchestrator.setup_core_agents()?;
    Ok(orchestrator)
}

/// Parse a TOML configuration; an empty document yields the defaults.
pub fn parse_config(raw: &str) -> Result<FinrouteConfig, toml::de::Error> {
    toml::from_str(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finroute_models::{RequestInput, Role};

    #[test]
    fn builds_with_core_agents() {
        let orchestrator = build_orchestrator(&FinrouteConfig::default()).unwrap();
        assert_eq!(
            orchestrator.supervisor().registered_roles().unwrap(),
            vec![Role::DataExtraction, Role::QuantitativeAnalysis]
        );
    }

    #[tokio::test]
    async fn configured_metadata_and_base_dir_are_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("q.csv"), "units\n3\n5\n8\n").unwrap();

        let raw = format!(
            "[cache]\nbase_dir = {:?}\n\n[orchestrator.metadata]\nsystem = \"desk\"\n",
            dir.path().display().to_string()
        );
        let config = parse_config(&raw).unwrap();
        let orchestrator = build_orchestrator(&config).unwrap();

        let input = RequestInput::default()
            .with_data_source("q.csv")
            .with_analysis_type("metrics");
        let result = orchestrator.execute_query("load and analyze", input).await;

        let json = serde_json::to_value(&result).unwrap();
        let analysis = &json["output"]["delegated_results"]["quantitative_analysis"];
        assert_eq!(analysis["status"], serde_json::json!("completed"));
        assert_eq!(
            analysis["output"]["analyses"]["metrics"]["units"]["max"],
            serde_json::json!(8.0)
        );
    }
}
