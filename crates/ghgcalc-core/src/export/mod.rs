//! Formula-linked xlsx export.

pub mod formula;
pub mod layout;
pub mod workbook;
pub mod xlsx;

use crate::aggregate::AggregateSummary;
use crate::calculate::CalculatedRow;
use crate::error::GhgError;
use std::io::Write;
use std::path::Path;

pub use formula::{CellRef, CellSource, CellValue, Formula};
pub use layout::build_workbook;
pub use workbook::Workbook;

/// Render calculated rows as an xlsx workbook whose emission and summary
/// cells are live formulas.
pub fn export_workbook(
    rows: &[CalculatedRow],
    summary: &AggregateSummary,
) -> Result<Vec<u8>, GhgError> {
    let book = build_workbook(rows, summary)?;
    xlsx::write_xlsx(&book)
}

/// Write workbook bytes to `path`.
///
/// The bytes are staged in a temporary file beside the destination and
/// renamed into place, so `path` either keeps its old content or holds the
/// complete workbook.
pub fn write_workbook(path: &Path, bytes: &[u8]) -> Result<(), GhgError> {
    let part = path.display().to_string();
    let export_err = |reason: String| GhgError::Export {
        part: part.clone(),
        reason,
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(|e| export_err(e.to_string()))?;
    staged
        .write_all(bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| export_err(e.to_string()))?;
    staged
        .persist(path)
        .map_err(|e| export_err(e.error.to_string()))?;

    tracing::info!(path = %part, bytes = bytes.len(), "workbook written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_workbook_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.xlsx");
        std::fs::write(&path, b"old").unwrap();

        write_workbook(&path, b"PK new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_workbook_missing_dir_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.xlsx");
        assert!(matches!(
            write_workbook(&path, b"PK"),
            Err(GhgError::Export { .. })
        ));
        assert!(!path.exists());
    }
}
