pub mod analysis;
pub mod error;
pub mod extraction;
pub mod normalize;
pub mod orchestrator;
pub mod stats;
pub mod supervisor;
pub mod worker;

pub mod test_support;

pub use analysis::{AnalysisKind, AnalysisOutput, QuantitativeAnalysisAgent};
pub use error::AgentError;
pub use extraction::{DataExtractionAgent, ExtractionOutput};
pub use orchestrator::{AgentOrchestrator, ExecutionSummary};
pub use supervisor::{route_query, SupervisorAgent, SupervisorOutput};
pub use worker::{AgentIdentity, WorkerAgent};
