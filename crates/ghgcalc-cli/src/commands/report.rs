use ghgcalc_core::error::GhgError;
use std::path::PathBuf;

use crate::output;

pub fn run(snapshot_file: PathBuf, output_format: &str, show_trace: bool) -> Result<(), GhgError> {
    let snapshot = ghgcalc_core::load_snapshot(&snapshot_file)?;
    let report = ghgcalc_core::build_report(&snapshot.rows, &snapshot.rejected)?;

    match output_format {
        "json" if show_trace => output::json::print(&report)?,
        "json" => output::json::print(&serde_json::json!({
            "rows": report.rows,
            "summary": report.summary,
        }))?,
        _ => {
            output::table::print_report(&report);
            if show_trace {
                output::table::print_trace(&report.trace);
            }
        }
    }

    Ok(())
}
