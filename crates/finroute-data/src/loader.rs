use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use finroute_models::config::CacheConfig;
use finroute_models::Table;
use tracing::{debug, info};

use crate::error::DataError;
use crate::memory::MemoryCache;
use crate::sources::{read_delimited, read_sqlite_table, read_spreadsheet, resolve_path, SourceKind};

/// Read-through table loader: checks moka (hot) → the source itself → None.
///
/// Successful source reads are promoted into the hot cache, so repeated
/// requests for the same reference skip parsing. References that do not name
/// a readable source kind can only be satisfied by entries registered with
/// [`TableLoader::insert`].
pub struct TableLoader {
    memory: MemoryCache,
    base_dir: Option<PathBuf>,
}

impl TableLoader {
    pub fn new(max_capacity: u64, memory_ttl: Duration) -> Self {
        Self {
            memory: MemoryCache::new(max_capacity, memory_ttl),
            base_dir: None,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            memory: MemoryCache::new(
                config.memory_max_capacity,
                Duration::from_secs(config.memory_ttl_seconds),
            ),
            base_dir: config.base_dir.as_ref().map(PathBuf::from),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Register an in-memory table under a reference.
    pub async fn insert(&self, reference: impl Into<String>, table: Table) {
        self.memory.insert(reference.into(), Arc::new(table)).await;
    }

    pub async fn invalidate(&self, reference: &str) {
        self.memory.invalidate(reference).await;
    }

    /// Resolve a source reference to a table. `Ok(None)` means not found.
    pub async fn load(&self, reference: &str) -> Result<Option<Arc<Table>>, DataError> {
        // 1. Hot cache
        if let Some(table) = self.memory.get(reference).await {
            debug!(reference, "Table cache hit");
            return Ok(Some(table));
        }

        // 2. Source by kind
        let Some((kind, file)) = SourceKind::detect(reference) else {
            debug!(reference, "No cached table and no readable source kind");
            return Ok(None);
        };
        let path = resolve_path(self.base_dir.as_deref(), file);

        let table = match kind {
            SourceKind::Delimited(delimiter) => {
                let bytes = tokio::fs::read(&path).await?;
                let name = reference.to_string();
                tokio::task::spawn_blocking(move || read_delimited(&bytes, delimiter, &name))
                    .await
                    .map_err(|e| DataError::Task(e.to_string()))??
            }
            SourceKind::Spreadsheet => {
                tokio::task::spawn_blocking(move || read_spreadsheet(&path))
                    .await
                    .map_err(|e| DataError::Task(e.to_string()))??
            }
            SourceKind::Sqlite { table } => {
                tokio::task::spawn_blocking(move || read_sqlite_table(&path, &table))
                    .await
                    .map_err(|e| DataError::Task(e.to_string()))??
            }
        };

        let (rows, columns) = table.shape();
        info!(reference, rows, columns, "Loaded table from source");

        // 3. Promote
        let table = Arc::new(table);
        self.memory
            .insert(reference.to_string(), Arc::clone(&table))
            .await;
        Ok(Some(table))
    }

    /// Number of tables held in the hot cache.
    pub async fn cached_tables(&self) -> u64 {
        self.memory.entry_count().await
    }
}
