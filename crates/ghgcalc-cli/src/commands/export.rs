use ghgcalc_core::error::GhgError;
use std::path::PathBuf;

pub fn run(snapshot_file: PathBuf, output_file: PathBuf) -> Result<(), GhgError> {
    let snapshot = ghgcalc_core::load_snapshot(&snapshot_file)?;
    let report = ghgcalc_core::build_report(&snapshot.rows, &snapshot.rejected)?;

    let bytes = ghgcalc_core::export_report(&report)?;
    ghgcalc_core::export::write_workbook(&output_file, &bytes)?;

    eprintln!(
        "Exported {} row(s), {:.2} tCO2e total, to {}",
        report.summary.row_count,
        report.summary.total_tonnes,
        output_file.display()
    );
    Ok(())
}
