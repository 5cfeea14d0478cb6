use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use finroute_models::{Cell, Table};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};

use crate::error::DataError;

const MISSING_MARKERS: [&str; 6] = ["", "na", "n/a", "nan", "null", "none"];

/// How a source reference is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// Delimited text with the given field separator.
    Delimited(u8),
    /// First worksheet of a workbook.
    Spreadsheet,
    /// A whole table of a SQLite database, referenced as `file.db#table`.
    Sqlite { table: String },
}

impl SourceKind {
    /// Classify a reference by extension. Returns the file part of the
    /// reference alongside the kind; `None` for references that only the
    /// in-memory cache can satisfy.
    pub fn detect(reference: &str) -> Option<(SourceKind, &str)> {
        let (file, fragment) = match reference.split_once('#') {
            Some((file, fragment)) => (file, Some(fragment)),
            None => (reference, None),
        };
        let extension = Path::new(file)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())?;

        let kind = match (extension.as_str(), fragment) {
            ("csv", None) => SourceKind::Delimited(b','),
            ("tsv", None) => SourceKind::Delimited(b'\t'),
            ("xlsx" | "xlsm" | "xls" | "ods", None) => SourceKind::Spreadsheet,
            ("db" | "sqlite" | "sqlite3", Some(table)) if !table.is_empty() => SourceKind::Sqlite {
                table: table.to_string(),
            },
            _ => return None,
        };
        Some((kind, file))
    }
}

/// Infer a typed cell from a text field.
pub fn infer_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    let lowered = trimmed.to_ascii_lowercase();
    if MISSING_MARKERS.contains(&lowered.as_str()) {
        return Cell::Missing;
    }
    match lowered.as_str() {
        "true" => return Cell::Bool(true),
        "false" => return Cell::Bool(false),
        _ => {}
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Cell::Number(v),
        _ => Cell::Text(trimmed.to_string()),
    }
}

/// Parse delimited text. The first record is the header.
pub fn read_delimited(bytes: &[u8], delimiter: u8, name: &str) -> Result<Table, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let header: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    if header.is_empty() {
        return Err(DataError::Empty(name.to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(infer_cell).collect());
    }

    Ok(Table::from_rows(header, rows))
}

fn spreadsheet_cell(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Missing,
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Float(v) => Cell::Number(*v),
        Data::Bool(v) => Cell::Bool(*v),
        Data::String(s) => infer_cell(s),
        Data::Error(_) => Cell::Missing,
        other => Cell::Text(other.to_string()),
    }
}

/// Read the first worksheet of a workbook. The first row is the header.
pub fn read_spreadsheet(path: &Path) -> Result<Table, DataError> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DataError::Empty(path.display().to_string()))??;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| DataError::Empty(path.display().to_string()))?
        .iter()
        .map(|c| c.to_string())
        .collect();

    let records = rows
        .map(|row| row.iter().map(spreadsheet_cell).collect())
        .collect();

    Ok(Table::from_rows(header, records))
}

fn sqlite_cell(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Missing,
        ValueRef::Integer(v) => Cell::Number(v as f64),
        ValueRef::Real(v) => Cell::Number(v),
        ValueRef::Text(bytes) => Cell::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Cell::Text(format!("<blob {} bytes>", bytes.len())),
    }
}

/// Read every row of one SQLite table through a read-only connection.
pub fn read_sqlite_table(path: &Path, table: &str) -> Result<Table, DataError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;

    let sql = format!("SELECT * FROM \"{}\"", table.replace('"', "\"\""));
    let mut stmt = conn.prepare(&sql)?;
    let header: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
    let width = header.len();

    let mut records = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(width);
        for i in 0..width {
            record.push(sqlite_cell(row.get_ref(i)?));
        }
        records.push(record);
    }

    Ok(Table::from_rows(header, records))
}

/// Resolve a relative file reference against an optional base directory.
pub fn resolve_path(base_dir: Option<&Path>, file: &str) -> PathBuf {
    let path = Path::new(file);
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path.to_path_buf(),
    }
}
