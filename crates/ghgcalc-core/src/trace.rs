use crate::calculate::CalculatedRow;
use crate::matching::engine::derive_key;
use crate::matching::outcome::{Provenance, UNIDENTIFIED_KEY};
use crate::reconcile::RejectedEdit;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const TRACE_SCHEMA_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceSeverity {
    Important,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStepType {
    RuleCode,
    CandidateKey,
    LibraryLookup,
    ManualOverride,
    Compute,
    ScopeClassify,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub step_type: TraceStepType,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    pub entry_id: String,
    pub row: usize,
    pub subcategory: String,
    pub source: String,
    pub factor_key: String,
    pub factor: Decimal,
    pub emission_kg: Decimal,
    pub steps: Vec<TraceStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceWarning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    pub message: String,
    pub severity: TraceSeverity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceBundle {
    pub trace_schema_version: String,
    pub entries: Vec<TraceEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<TraceWarning>,
}

impl Default for TraceBundle {
    fn default() -> Self {
        Self {
            trace_schema_version: TRACE_SCHEMA_VERSION.to_string(),
            entries: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Build the audit trail for a calculated table.
pub fn build_trace(rows: &[CalculatedRow], rejected: &[RejectedEdit]) -> TraceBundle {
    let mut bundle = TraceBundle::default();

    for (idx, calc) in rows.iter().enumerate() {
        bundle.entries.push(build_entry_trace(idx, calc));

        if calc.row.factor.value.is_zero() {
            bundle.warnings.push(TraceWarning {
                row: Some(idx),
                message: format!(
                    "no factor for '{}', row contributes 0 until a value is entered",
                    calc.row.suggested_factor_key
                ),
                severity: TraceSeverity::Important,
            });
        }
    }

    for edit in rejected {
        bundle.warnings.push(TraceWarning {
            row: Some(edit.row),
            message: format!(
                "edit to {} rejected ({}), kept {}",
                edit.attempted, edit.reason, edit.retained
            ),
            severity: TraceSeverity::Important,
        });
    }

    bundle
}

pub fn build_entry_trace(idx: usize, calc: &CalculatedRow) -> TraceEntry {
    let row = &calc.row;
    let mut steps = Vec::new();

    match derive_key(&row.activity) {
        Some((pathway, key)) => {
            steps.push(TraceStep {
                step_type: TraceStepType::RuleCode,
                message: format!(
                    "Rule code {} found in '{}' -> {}",
                    pathway.code, row.activity.subcategory, pathway.name
                ),
            });
            steps.push(TraceStep {
                step_type: TraceStepType::CandidateKey,
                message: format!("Candidate key '{key}'"),
            });
        }
        None => steps.push(TraceStep {
            step_type: TraceStepType::RuleCode,
            message: format!(
                "No rule code or source in '{}', key '{}'",
                row.activity.subcategory, UNIDENTIFIED_KEY
            ),
        }),
    }

    steps.push(match row.provenance {
        Provenance::FactorLibrary => TraceStep {
            step_type: TraceStepType::LibraryLookup,
            message: format!(
                "Library factor {} {} ({})",
                row.factor.value, row.factor.unit, row.factor.ghg_type
            ),
        },
        Provenance::PendingManualEntry => TraceStep {
            step_type: TraceStepType::LibraryLookup,
            message: "Not in library, factor pending manual entry".to_string(),
        },
        Provenance::ManualOverride => TraceStep {
            step_type: TraceStepType::ManualOverride,
            message: format!("Manual factor {} {}", row.factor.value, row.factor.unit),
        },
    });

    steps.push(TraceStep {
        step_type: TraceStepType::Compute,
        message: format!(
            "{} x {} = {} kg = {} t",
            row.activity.activity_quantity,
            row.factor.value,
            calc.emission.emission_kg,
            calc.emission.emission_tonnes
        ),
    });
    steps.push(TraceStep {
        step_type: TraceStepType::ScopeClassify,
        message: format!("'{}' -> {}", row.activity.category, calc.emission.scope),
    });

    TraceEntry {
        entry_id: format!("row_{idx}"),
        row: idx,
        subcategory: row.activity.subcategory.clone(),
        source: row.activity.source.clone(),
        factor_key: row.suggested_factor_key.clone(),
        factor: row.factor.value,
        emission_kg: calc.emission.emission_kg,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::calculate;
    use crate::factors::FactorLibrary;
    use crate::matching::match_rows;
    use crate::model::ActivityRecord;
    use rust_decimal_macros::dec;

    fn activity(sub: &str, source: &str) -> ActivityRecord {
        ActivityRecord {
            category: "Scope 1: direct".into(),
            subcategory: sub.into(),
            source: source.into(),
            facility_or_process: String::new(),
            activity_quantity: dec!(100),
            unit_of_measure: String::new(),
        }
    }

    #[test]
    fn test_trace_steps_for_matched_row() {
        let lib = FactorLibrary::builtin().unwrap();
        let out = match_rows(&[activity("1.1 stationary", "coal")], &lib);
        let bundle = build_trace(&calculate(&out.rows).unwrap(), &[]);

        assert_eq!(bundle.trace_schema_version, TRACE_SCHEMA_VERSION);
        assert_eq!(bundle.entries.len(), 1);
        let types: Vec<_> = bundle.entries[0].steps.iter().map(|s| s.step_type).collect();
        assert_eq!(
            types,
            vec![
                TraceStepType::RuleCode,
                TraceStepType::CandidateKey,
                TraceStepType::LibraryLookup,
                TraceStepType::Compute,
                TraceStepType::ScopeClassify,
            ]
        );
        assert_eq!(bundle.entries[0].emission_kg, dec!(238));
        assert!(bundle.warnings.is_empty());
    }

    #[test]
    fn test_unmatched_row_warns() {
        let lib = FactorLibrary::builtin().unwrap();
        let out = match_rows(&[activity("1.1", "biomass"), activity("none", "x")], &lib);
        let bundle = build_trace(&calculate(&out.rows).unwrap(), &[]);
        assert_eq!(bundle.warnings.len(), 2);
        assert_eq!(bundle.warnings[1].row, Some(1));
    }

    #[test]
    fn test_rejected_edit_warns() {
        let rejected = RejectedEdit {
            row: 4,
            attempted: dec!(-2),
            retained: dec!(2.38),
            reason: "factor must not be negative".into(),
        };
        let bundle = build_trace(&[], &[rejected]);
        assert_eq!(bundle.warnings.len(), 1);
        assert!(bundle.warnings[0].message.contains("2.38"));
    }
}
