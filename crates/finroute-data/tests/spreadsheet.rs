//! Workbook sources read through the loader.
//!
//! `fixtures/quarterly.xlsx` has two worksheets. `Q1` (first) holds
//! Month / Revenue / Units / Approved over three rows with one blank revenue
//! cell; `Notes` (second) holds a single text column that must never be read.

use std::path::PathBuf;
use std::time::Duration;

use finroute_data::sources::read_spreadsheet;
use finroute_data::TableLoader;
use finroute_models::{Cell, ColumnKind};

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/quarterly.xlsx")
}

#[test]
fn first_worksheet_with_header_row() {
    let table = read_spreadsheet(&fixture()).unwrap();

    assert_eq!(table.shape(), (3, 4));
    assert_eq!(table.column_names(), vec!["Month", "Revenue", "Units", "Approved"]);
    assert!(table.column("note").is_none());
}

#[test]
fn workbook_cells_map_to_typed_cells() {
    let table = read_spreadsheet(&fixture()).unwrap();

    let month = table.column("Month").unwrap();
    assert_eq!(month.kind(), ColumnKind::Text);
    assert_eq!(month.values[0], Cell::Text("Jan".to_string()));

    let revenue = table.column("Revenue").unwrap();
    assert_eq!(revenue.kind(), ColumnKind::Numeric);
    assert_eq!(
        revenue.values,
        vec![Cell::Number(1200.5), Cell::Missing, Cell::Number(1410.0)]
    );
    assert_eq!(revenue.missing_count(), 1);

    let units = table.column("Units").unwrap();
    assert_eq!(units.numeric_values(), vec![Some(10.0), Some(12.0), Some(15.0)]);

    let approved = table.column("Approved").unwrap();
    assert_eq!(approved.kind(), ColumnKind::Boolean);
    assert_eq!(
        approved.values,
        vec![Cell::Bool(true), Cell::Bool(false), Cell::Bool(true)]
    );
}

#[tokio::test]
async fn loader_reads_workbook_and_promotes_it() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::copy(fixture(), dir.path().join("q1.xlsx")).unwrap();

    let loader = TableLoader::new(16, Duration::from_secs(60)).with_base_dir(dir.path());
    let table = loader.load("q1.xlsx").await.unwrap().unwrap();
    assert_eq!(table.shape(), (3, 4));
    assert_eq!(loader.cached_tables().await, 1);

    // The workbook is gone; the cached copy still answers.
    std::fs::remove_file(dir.path().join("q1.xlsx")).unwrap();
    let again = loader.load("q1.xlsx").await.unwrap().unwrap();
    assert_eq!(again.column("Units").unwrap().values[2], Cell::Number(15.0));
}
