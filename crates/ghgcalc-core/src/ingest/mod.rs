//! Activity-table ingestion: header validation and row conversion.

pub mod header;
pub mod values;
pub mod xlsx;

use crate::error::GhgError;
use crate::model::{ActivityRecord, ActivityTable};
use header::{locate_columns, ColumnMap};
use rust_decimal::Decimal;
use values::{f64_to_decimal, parse_quantity};

/// A cell as read from an uploaded sheet, before typing.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
}

impl RawCell {
    fn as_text(&self) -> String {
        match self {
            RawCell::Empty => String::new(),
            RawCell::Text(s) => s.trim().to_string(),
            RawCell::Number(f) => format!("{f}"),
        }
    }

    fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            RawCell::Number(_) => false,
        }
    }
}

/// Build a validated activity table from a header row and data rows.
///
/// Fully blank rows are skipped. Any malformed row rejects the whole table.
pub fn build_table(headers: &[String], rows: &[Vec<RawCell>]) -> Result<ActivityTable, GhgError> {
    let columns = locate_columns(headers)?;

    let mut records = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        if row.iter().all(RawCell::is_blank) {
            continue;
        }
        // Spreadsheet row number: header is row 1.
        let row_number = idx + 2;
        records.push(convert_row(row, &columns, row_number)?);
    }

    tracing::debug!(rows = records.len(), "activity table built");
    Ok(ActivityTable { rows: records })
}

fn convert_row(
    row: &[RawCell],
    columns: &ColumnMap,
    row_number: usize,
) -> Result<ActivityRecord, GhgError> {
    let cell = |i: usize| row.get(i).cloned().unwrap_or(RawCell::Empty);

    let quantity = match cell(columns.activity_quantity) {
        RawCell::Number(f) => f64_to_decimal(f),
        RawCell::Text(s) => parse_quantity(&s).map_err(|e| {
            GhgError::MalformedInput(format!("row {row_number}: activity quantity: {e}"))
        })?,
        RawCell::Empty => None,
    };
    let quantity = quantity.ok_or_else(|| {
        GhgError::MalformedInput(format!(
            "row {row_number}: activity quantity is missing or not a number"
        ))
    })?;

    let record = ActivityRecord {
        category: cell(columns.category).as_text(),
        subcategory: cell(columns.subcategory).as_text(),
        source: cell(columns.source).as_text(),
        facility_or_process: cell(columns.facility_or_process).as_text(),
        activity_quantity: quantity,
        unit_of_measure: cell(columns.unit).as_text(),
    };
    validate_record(&record, row_number)?;
    Ok(record)
}

/// Parse an activity table from JSON (an array of records).
pub fn parse_activity_json(json: &[u8]) -> Result<ActivityTable, GhgError> {
    let rows: Vec<ActivityRecord> = serde_json::from_slice(json)?;
    for (idx, record) in rows.iter().enumerate() {
        validate_record(record, idx + 1)?;
    }
    Ok(ActivityTable { rows })
}

fn validate_record(record: &ActivityRecord, row_number: usize) -> Result<(), GhgError> {
    if record.activity_quantity < Decimal::ZERO {
        return Err(GhgError::MalformedInput(format!(
            "row {row_number}: activity quantity must not be negative (got {})",
            record.activity_quantity
        )));
    }
    Ok(())
}
