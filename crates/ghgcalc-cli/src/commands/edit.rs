use ghgcalc_core::error::GhgError;
use ghgcalc_core::reconcile::{apply_factor_edit, reconcile};
use ghgcalc_core::RowSnapshot;
use std::path::PathBuf;

use crate::output;

pub fn run(
    snapshot_file: PathBuf,
    row: usize,
    factor: &str,
    output_file: Option<PathBuf>,
) -> Result<(), GhgError> {
    let snapshot = ghgcalc_core::load_snapshot(&snapshot_file)?;

    let mut edited = snapshot.rows.clone();
    apply_factor_edit(&mut edited, row, factor)?;
    let outcome = reconcile(&snapshot.rows, edited)?;

    let mut rejected = snapshot.rejected;
    rejected.extend(outcome.rejected);

    let updated = &outcome.rows[row];
    println!(
        "Row {row}: {} = {} {} ({})",
        updated.suggested_factor_key, updated.factor.value, updated.factor.unit, updated.status
    );

    let path = output_file.unwrap_or(snapshot_file);
    output::json::write(
        &path,
        &RowSnapshot {
            rows: outcome.rows,
            rejected,
        },
    )?;
    tracing::info!(path = %path.display(), "snapshot updated");

    Ok(())
}
