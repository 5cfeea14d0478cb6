use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Table error: {0}")]
    Table(#[from] finroute_models::TableError),

    #[error("Source is empty: {0}")]
    Empty(String),

    #[error("Loader task failed: {0}")]
    Task(String),
}
