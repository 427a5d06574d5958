//! Manual-override reconciliation.
//!
//! Override detection is driven purely by factor-value drift between the
//! edited table and the snapshot it was edited from. Each pass compares
//! against the immediately preceding snapshot, never the original match.
//! When the value has not drifted, provenance comes from that snapshot;
//! whatever the edited row claims is ignored.

use crate::error::GhgError;
use crate::ingest::values::parse_decimal;
use crate::matching::outcome::{MatchStatus, MatchedRow, Provenance};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An edited factor value that was refused; the baseline value was kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedEdit {
    pub row: usize,
    pub attempted: Decimal,
    pub retained: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub rows: Vec<MatchedRow>,
    /// Indices of rows whose provenance is `ManualOverride` after this pass.
    pub overridden: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<RejectedEdit>,
}

impl ReconcileOutcome {
    /// The manually overridden subset, for separate review.
    pub fn overrides(&self) -> impl Iterator<Item = &MatchedRow> {
        self.overridden.iter().filter_map(|&i| self.rows.get(i))
    }
}

/// Reconcile a user-edited table against the snapshot it was edited from.
///
/// Rows are compared by index, so both tables must have the same length.
pub fn reconcile(
    baseline: &[MatchedRow],
    edited: Vec<MatchedRow>,
) -> Result<ReconcileOutcome, GhgError> {
    if baseline.len() != edited.len() {
        return Err(GhgError::MalformedInput(format!(
            "edited table has {} rows, its baseline has {}",
            edited.len(),
            baseline.len()
        )));
    }

    let mut rows = Vec::with_capacity(edited.len());
    let mut rejected = Vec::new();

    for (idx, (base, mut row)) in baseline.iter().zip(edited).enumerate() {
        if row.factor.value < Decimal::ZERO {
            tracing::warn!(
                row = idx,
                attempted = %row.factor.value,
                "negative factor edit rejected"
            );
            rejected.push(RejectedEdit {
                row: idx,
                attempted: row.factor.value,
                retained: base.factor.value,
                reason: "factor must not be negative".into(),
            });
            row.factor.value = base.factor.value;
        }

        reconcile_row(base, &mut row);
        rows.push(row);
    }

    let overridden: Vec<usize> = rows
        .iter()
        .enumerate()
        .filter(|(_, r)| r.provenance == Provenance::ManualOverride)
        .map(|(i, _)| i)
        .collect();

    tracing::info!(
        rows = rows.len(),
        overridden = overridden.len(),
        rejected = rejected.len(),
        "reconciliation pass complete"
    );

    Ok(ReconcileOutcome {
        rows,
        overridden,
        rejected,
    })
}

fn reconcile_row(base: &MatchedRow, row: &mut MatchedRow) {
    if row.factor.value != base.factor.value {
        tracing::debug!(
            key = %row.suggested_factor_key,
            from = %base.factor.value,
            to = %row.factor.value,
            "factor drift, marking manual override"
        );
        row.provenance = Provenance::ManualOverride;
        row.status = MatchStatus::ManuallyOverridden;
    } else if base.provenance == Provenance::ManualOverride {
        row.provenance = Provenance::ManualOverride;
        row.status = MatchStatus::ManuallyOverridden;
    } else if row.factor.value > Decimal::ZERO {
        row.status = MatchStatus::Matched;
        row.provenance = Provenance::FactorLibrary;
    }
}

/// Apply a factor value typed by the user to one row of a table.
///
/// The edit boundary: non-numeric or negative input is rejected and the
/// row keeps its prior value. Status is settled by the next [`reconcile`].
pub fn apply_factor_edit(rows: &mut [MatchedRow], index: usize, raw: &str) -> Result<(), GhgError> {
    let invalid = |reason: String| GhgError::InvalidManualValue {
        row: index,
        value: raw.trim().to_string(),
        reason,
    };

    let row_count = rows.len();
    let row = rows
        .get_mut(index)
        .ok_or_else(|| invalid(format!("table has {row_count} rows")))?;

    let value = parse_decimal(raw).map_err(|_| invalid("not a number".into()))?;
    if value < Decimal::ZERO {
        return Err(invalid("factor must not be negative".into()));
    }

    row.factor.value = value;
    Ok(())
}
