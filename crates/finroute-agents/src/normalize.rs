//! Table normalization applied by the data-extraction agent.
//!
//! - Column names: lowercase, trimmed, whitespace runs collapsed to `_`,
//!   everything outside `[a-z0-9_]` removed.
//! - Text-like columns whose values mostly parse as numbers after stripping
//!   currency symbols, thousands separators and the like become numeric.

use finroute_models::{Cell, Column, ColumnKind, Table};
use once_cell::sync::Lazy;
use regex::Regex;

/// A column is coerced only when strictly more than this share of its rows
/// parse as numbers.
pub const COERCION_THRESHOLD: f64 = 0.5;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static NAME_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9_]").expect("valid regex"));
static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.\-]").expect("valid regex"));

pub fn normalize_column_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    let collapsed = WHITESPACE_RUN.replace_all(lowered.trim(), "_");
    NAME_DISALLOWED.replace_all(&collapsed, "").into_owned()
}

fn parse_stripped(cell: &Cell) -> Option<f64> {
    let raw = match cell {
        Cell::Number(v) => return Some(*v),
        Cell::Text(s) => s.as_str(),
        Cell::Bool(_) | Cell::Missing => return None,
    };
    let stripped = NON_NUMERIC.replace_all(raw, "");
    stripped.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Numeric version of a text-like column, or `None` if the column should be
/// left as is. Unparseable entries become `Missing`.
pub fn coerce_numeric(column: &Column) -> Option<Column> {
    if !matches!(column.kind(), ColumnKind::Text | ColumnKind::Mixed) {
        return None;
    }
    let rows = column.values.len();
    if rows == 0 {
        return None;
    }

    let parsed: Vec<Option<f64>> = column.values.iter().map(parse_stripped).collect();
    let parsed_count = parsed.iter().filter(|v| v.is_some()).count();
    if (parsed_count as f64 / rows as f64) <= COERCION_THRESHOLD {
        return None;
    }

    let values = parsed
        .into_iter()
        .map(|v| v.map(Cell::Number).unwrap_or(Cell::Missing))
        .collect();
    Some(Column::new(column.name.clone(), values))
}

/// Normalize names and coerce numeric-looking columns. Shape is preserved.
pub fn normalize_table(table: &Table) -> Table {
    let mut normalized = table.clone();
    for column in normalized.columns_mut() {
        column.name = normalize_column_name(&column.name);
        if let Some(coerced) = coerce_numeric(column) {
            column.values = coerced.values;
        }
    }
    normalized
}
