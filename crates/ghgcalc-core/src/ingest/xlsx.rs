use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use crate::error::GhgError;
use crate::ingest::{build_table, RawCell};
use crate::model::ActivityTable;

/// Sheet name used by the data-entry template. Other workbooks fall back to
/// their first sheet.
pub const ACTIVITY_SHEET: &str = "Activity Data";

/// Parse an uploaded activity workbook.
///
/// The header is the first row of the sheet's used range.
pub fn parse_activity_xlsx(bytes: &[u8]) -> Result<ActivityTable, GhgError> {
    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(cursor)
        .map_err(|e| GhgError::MalformedInput(format!("failed to open xlsx: {e}")))?;

    let sheet_names = workbook.sheet_names();
    let sheet_name = sheet_names
        .iter()
        .find(|n| n.as_str() == ACTIVITY_SHEET)
        .or_else(|| sheet_names.first())
        .cloned()
        .ok_or_else(|| GhgError::MalformedInput("workbook has no sheets".into()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| GhgError::MalformedInput(format!("sheet '{sheet_name}' unreadable: {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_as_header).collect(),
        None => {
            return Err(GhgError::MalformedInput(format!(
                "sheet '{sheet_name}' is empty"
            )))
        }
    };
    let data: Vec<Vec<RawCell>> = rows.map(|r| r.iter().map(raw_cell).collect()).collect();

    tracing::debug!(sheet = %sheet_name, rows = data.len(), "activity workbook read");
    build_table(&headers, &data)
}

fn cell_as_header(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => format!("{other}"),
    }
}

fn raw_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::Float(f) => RawCell::Number(*f),
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::String(s) => RawCell::Text(s.clone()),
        other => RawCell::Text(format!("{other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes_rejected() {
        assert!(matches!(
            parse_activity_xlsx(b"not a workbook"),
            Err(GhgError::MalformedInput(_))
        ));
    }
}
