use serde::{Deserialize, Serialize};

/// Top-level configuration for finroute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FinrouteConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Configuration for the table loader and its in-memory cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of tables kept in the in-memory moka cache.
    #[serde(default = "default_memory_max_capacity")]
    pub memory_max_capacity: u64,
    /// How long a loaded table stays in memory, in seconds.
    #[serde(default = "default_memory_ttl")]
    pub memory_ttl_seconds: u64,
    /// Directory that relative source references resolve against.
    #[serde(default)]
    pub base_dir: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_max_capacity: default_memory_max_capacity(),
            memory_ttl_seconds: default_memory_ttl(),
            base_dir: None,
        }
    }
}

/// Configuration for the orchestration layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    /// Copied into the metadata of every top-level context.
    #[serde(default = "default_metadata")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            metadata: default_metadata(),
        }
    }
}

fn default_memory_max_capacity() -> u64 {
    256
}
fn default_memory_ttl() -> u64 {
    900
}
fn default_metadata() -> serde_json::Map<String, serde_json::Value> {
    let mut metadata = serde_json::Map::new();
    metadata.insert("system".to_string(), serde_json::json!("finroute"));
    metadata
}
