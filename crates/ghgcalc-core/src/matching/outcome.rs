use crate::model::{ActivityRecord, GhgType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suggested key for rows whose subcategory or source yields no candidate.
pub const UNIDENTIFIED_KEY: &str = "unidentified";
/// Factor unit placed on rows awaiting a manual factor.
pub const PENDING_UNIT: &str = "pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Unmatched,
    ManuallyOverridden,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Matched => write!(f, "matched"),
            MatchStatus::Unmatched => write!(f, "unmatched"),
            MatchStatus::ManuallyOverridden => write!(f, "manual"),
        }
    }
}

/// Where a row's factor value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    FactorLibrary,
    PendingManualEntry,
    ManualOverride,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::FactorLibrary => write!(f, "Factor library"),
            Provenance::PendingManualEntry => write!(f, "Pending manual entry"),
            Provenance::ManualOverride => write!(f, "Manual override"),
        }
    }
}

/// Factor value, unit and gas assigned to a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFactor {
    /// Zero while the row is unresolved.
    pub value: Decimal,
    pub unit: String,
    pub ghg_type: GhgType,
}

impl ResolvedFactor {
    pub fn pending() -> Self {
        Self {
            value: Decimal::ZERO,
            unit: PENDING_UNIT.to_string(),
            ghg_type: GhgType::CO2,
        }
    }
}

/// An activity row decorated with its match result.
///
/// Status and provenance move together:
/// `Matched` <-> `FactorLibrary`, `ManuallyOverridden` <-> `ManualOverride`,
/// and `Unmatched` rows carry a zero factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedRow {
    pub activity: ActivityRecord,
    /// Candidate key, or [`UNIDENTIFIED_KEY`].
    pub suggested_factor_key: String,
    pub factor: ResolvedFactor,
    pub status: MatchStatus,
    pub provenance: Provenance,
}

/// Result of one matcher pass over an activity table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub rows: Vec<MatchedRow>,
    /// Library revision the pass read from.
    pub library_version: u64,
    /// Candidate keys with no library entry, sorted and deduplicated.
    pub unmatched_keys: Vec<String>,
}

impl MatchOutcome {
    pub fn matched_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == MatchStatus::Matched)
            .count()
    }

    pub fn unmatched_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == MatchStatus::Unmatched)
            .count()
    }
}
