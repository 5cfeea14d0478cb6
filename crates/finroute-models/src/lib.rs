pub mod config;
pub mod context;
pub mod request;
pub mod result;
pub mod role;
pub mod table;

pub use config::{CacheConfig, FinrouteConfig, OrchestratorConfig};
pub use context::{short_id, ExecutionContext};
pub use request::RequestInput;
pub use result::{ExecutionResult, ResultMetadata};
pub use role::{Role, Status};
pub use table::{Cell, Column, ColumnKind, Table, TableError};
