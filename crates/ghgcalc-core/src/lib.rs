pub mod aggregate;
pub mod calculate;
pub mod error;
pub mod export;
pub mod factors;
pub mod ingest;
pub mod matching;
pub mod model;
pub mod reconcile;
pub mod trace;

use aggregate::{aggregate, AggregateSummary};
use calculate::{calculate, CalculatedRow};
use error::GhgError;
use factors::{load_factor_file, FactorLibrary};
use matching::{match_rows, MatchOutcome, MatchedRow};
use model::ActivityTable;
use reconcile::RejectedEdit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trace::TraceBundle;

/// Build the factor library for a run: the built-in seed, then each factor
/// file merged on top in order. Later files overwrite earlier keys.
pub fn build_library(factor_files: &[PathBuf]) -> Result<FactorLibrary, GhgError> {
    let mut library = FactorLibrary::builtin()?;
    for path in factor_files {
        let file = load_factor_file(path)?;
        let added = library.extend_from_file(&file)?;
        tracing::info!(path = %path.display(), factors = added, "factor file loaded");
    }
    Ok(library)
}

/// Load an activity table from an `.xlsx` or `.json` file.
pub fn load_activity_table(path: &Path) -> Result<ActivityTable, GhgError> {
    let bytes = std::fs::read(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("xlsx") => ingest::xlsx::parse_activity_xlsx(&bytes),
        Some("json") => ingest::parse_activity_json(&bytes),
        _ => Err(GhgError::MalformedInput(format!(
            "unsupported activity file '{}', expected .xlsx or .json",
            path.display()
        ))),
    }
}

/// Match an activity table against one consistent revision of `library`.
pub fn match_activities(table: &ActivityTable, library: &FactorLibrary) -> MatchOutcome {
    let snapshot = library.snapshot();
    match_rows(&table.rows, &snapshot)
}

/// Matched rows as saved between steps. Accepts the output of a matching
/// pass or of a reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub rows: Vec<MatchedRow>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedEdit>,
}

pub fn load_snapshot(path: &Path) -> Result<RowSnapshot, GhgError> {
    let content = std::fs::read_to_string(path)?;
    parse_snapshot(&content)
}

pub fn parse_snapshot(json: &str) -> Result<RowSnapshot, GhgError> {
    let snapshot: RowSnapshot = serde_json::from_str(json)?;
    Ok(snapshot)
}

/// Calculated rows, their aggregates and the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionReport {
    pub rows: Vec<CalculatedRow>,
    pub summary: AggregateSummary,
    pub trace: TraceBundle,
}

/// Calculate and aggregate a matched table.
///
/// Always recomputes from `rows`; nothing is carried over from a previous
/// report. Fails only when an emission or a total is out of range.
pub fn build_report(
    rows: &[MatchedRow],
    rejected: &[RejectedEdit],
) -> Result<EmissionReport, GhgError> {
    let calculated = calculate(rows)?;
    let summary = aggregate(&calculated)?;
    let trace = trace::build_trace(&calculated, rejected);

    tracing::info!(
        rows = summary.row_count,
        total_tonnes = %summary.total_tonnes,
        unmatched = summary.unmatched_count,
        "report built"
    );

    Ok(EmissionReport {
        rows: calculated,
        summary,
        trace,
    })
}

/// Export a report as a formula-linked xlsx workbook.
pub fn export_report(report: &EmissionReport) -> Result<Vec<u8>, GhgError> {
    export::export_workbook(&report.rows, &report.summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ActivityRecord;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, "a,b").unwrap();
        assert!(matches!(
            load_activity_table(&path),
            Err(GhgError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_load_json_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.JSON");
        std::fs::write(
            &path,
            r#"[{"category":"Scope 1: direct","subcategory":"1.1","source":"coal","activity_quantity":"10"}]"#,
        )
        .unwrap();
        let table = load_activity_table(&path).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].activity_quantity, dec!(10));
    }

    #[test]
    fn test_build_library_merges_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.json");
        let second = dir.path().join("b.json");
        std::fs::write(
            &first,
            r#"{"name":"a","version":"1","factors":[{"key":"Stationary combustion-biomass","factor":"0.1","unit":"kgCO2/kg","ghg_type":"CO2"}]}"#,
        )
        .unwrap();
        std::fs::write(
            &second,
            r#"{"name":"b","version":"1","factors":[{"key":"Stationary combustion-biomass","factor":"0.2","unit":"kgCO2/kg","ghg_type":"CO2"}]}"#,
        )
        .unwrap();

        let lib = build_library(&[first, second]).unwrap();
        assert_eq!(lib.len(), 26);
        assert_eq!(lib.get("Stationary combustion-biomass").unwrap().factor, dec!(0.2));
    }

    #[test]
    fn test_snapshot_accepts_reconcile_output() {
        let json = r#"{
            "rows": [],
            "overridden": [],
            "rejected": [{"row": 0, "attempted": "-1", "retained": "2.38", "reason": "negative"}]
        }"#;
        let snap = parse_snapshot(json).unwrap();
        assert!(snap.rows.is_empty());
        assert_eq!(snap.rejected.len(), 1);
    }

    #[test]
    fn test_build_report() {
        let lib = FactorLibrary::builtin().unwrap();
        let table = ActivityTable {
            rows: vec![ActivityRecord {
                category: "Scope 2: indirect".into(),
                subcategory: "2.1 purchased electricity".into(),
                source: "grid electricity".into(),
                facility_or_process: String::new(),
                activity_quantity: dec!(1000),
                unit_of_measure: "kWh".into(),
            }],
        };
        let outcome = match_activities(&table, &lib);
        let report = build_report(&outcome.rows, &[]).unwrap();
        assert_eq!(report.summary.total_kg, dec!(570.3));
        assert_eq!(report.trace.entries.len(), 1);
    }
}
