use ghgcalc_core::error::GhgError;
use std::path::PathBuf;

use crate::output;

pub fn run(
    input_file: PathBuf,
    factor_files: Vec<PathBuf>,
    output_format: &str,
    output_file: Option<PathBuf>,
) -> Result<(), GhgError> {
    let library = ghgcalc_core::build_library(&factor_files)?;
    let table = ghgcalc_core::load_activity_table(&input_file)?;
    let outcome = ghgcalc_core::match_activities(&table, &library);

    match output_format {
        "json" => output::json::print(&outcome)?,
        _ => output::table::print_matches(&outcome.rows),
    }

    if !outcome.unmatched_keys.is_empty() {
        eprintln!("No library factor for:");
        for key in &outcome.unmatched_keys {
            eprintln!("  - {key}");
        }
        eprintln!("Set them by hand with `ghgcalc edit` or add them with `ghgcalc factors add`.");
    }

    if let Some(path) = output_file {
        output::json::write(&path, &outcome)?;
        eprintln!(
            "Matched {} of {} row(s), snapshot written to {}",
            outcome.matched_count(),
            outcome.rows.len(),
            path.display()
        );
    }

    Ok(())
}
