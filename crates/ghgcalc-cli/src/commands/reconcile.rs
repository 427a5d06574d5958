use ghgcalc_core::error::GhgError;
use ghgcalc_core::RowSnapshot;
use std::path::PathBuf;

use crate::output;

pub fn run(
    baseline_file: PathBuf,
    edited_file: PathBuf,
    output_format: &str,
    output_file: Option<PathBuf>,
) -> Result<(), GhgError> {
    let baseline = ghgcalc_core::load_snapshot(&baseline_file)?;
    let edited = ghgcalc_core::load_snapshot(&edited_file)?;
    let outcome = ghgcalc_core::reconcile::reconcile(&baseline.rows, edited.rows)?;

    match output_format {
        "json" => output::json::print(&outcome)?,
        _ => {
            output::table::print_matches(&outcome.rows);
            println!(
                "\n  {} row(s) manually overridden: {}",
                outcome.overridden.len(),
                outcome
                    .overridden
                    .iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    for r in &outcome.rejected {
        eprintln!(
            "  warning: row {}: {} rejected ({}), kept {}",
            r.row, r.attempted, r.reason, r.retained
        );
    }

    if let Some(path) = output_file {
        output::json::write(
            &path,
            &RowSnapshot {
                rows: outcome.rows,
                rejected: outcome.rejected,
            },
        )?;
        eprintln!("Reconciled snapshot written to {}", path.display());
    }

    Ok(())
}
