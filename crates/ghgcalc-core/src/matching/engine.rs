use crate::factors::FactorLookup;
use crate::matching::outcome::{
    MatchOutcome, MatchStatus, MatchedRow, Provenance, ResolvedFactor, UNIDENTIFIED_KEY,
};
use crate::matching::pathway::{find_pathway, Pathway};
use crate::model::ActivityRecord;
use std::collections::BTreeSet;

/// Match every activity row against a factor library.
///
/// Reads the library only. Given an unchanged library the result is
/// deterministic, so re-running a pass is idempotent.
pub fn match_rows(rows: &[ActivityRecord], library: &dyn FactorLookup) -> MatchOutcome {
    let matched: Vec<MatchedRow> = rows.iter().map(|row| match_row(row, library)).collect();

    let unmatched_keys: Vec<String> = matched
        .iter()
        .filter(|r| r.status == MatchStatus::Unmatched && r.suggested_factor_key != UNIDENTIFIED_KEY)
        .map(|r| r.suggested_factor_key.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let outcome = MatchOutcome {
        rows: matched,
        library_version: library.version(),
        unmatched_keys,
    };

    tracing::info!(
        rows = outcome.rows.len(),
        matched = outcome.matched_count(),
        unmatched = outcome.unmatched_count(),
        library_version = outcome.library_version,
        "matching pass complete"
    );

    outcome
}

/// Match a single activity row.
pub fn match_row(row: &ActivityRecord, library: &dyn FactorLookup) -> MatchedRow {
    let Some((_, key)) = derive_key(row) else {
        tracing::warn!(
            subcategory = %row.subcategory,
            source = %row.source,
            "no rule code or source, row left unidentified"
        );
        return unmatched(row, UNIDENTIFIED_KEY.to_string());
    };

    match library.lookup(&key) {
        Some(factor) => {
            tracing::debug!(%key, factor = %factor.factor, "factor matched");
            MatchedRow {
                activity: row.clone(),
                suggested_factor_key: key,
                factor: ResolvedFactor {
                    value: factor.factor,
                    unit: factor.unit.clone(),
                    ghg_type: factor.ghg_type,
                },
                status: MatchStatus::Matched,
                provenance: Provenance::FactorLibrary,
            }
        }
        None => {
            tracing::warn!(%key, "no library factor for candidate key");
            unmatched(row, key)
        }
    }
}

/// Derive the pathway and candidate factor key for a row.
///
/// `None` when the subcategory carries no known rule code or the source is
/// empty.
pub fn derive_key(row: &ActivityRecord) -> Option<(&'static Pathway, String)> {
    let pathway = find_pathway(&row.subcategory)?;
    if row.source.trim().is_empty() {
        return None;
    }
    Some((pathway, pathway.candidate_key(&row.source)))
}

fn unmatched(row: &ActivityRecord, key: String) -> MatchedRow {
    MatchedRow {
        activity: row.clone(),
        suggested_factor_key: key,
        factor: ResolvedFactor::pending(),
        status: MatchStatus::Unmatched,
        provenance: Provenance::PendingManualEntry,
    }
}
