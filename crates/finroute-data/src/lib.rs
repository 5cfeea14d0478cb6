pub mod error;
pub mod loader;
pub mod memory;
pub mod sources;

pub use error::DataError;
pub use loader::TableLoader;
pub use sources::SourceKind;
