use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category tokens marking direct (scope 1) emissions.
pub const DIRECT_TOKENS: [&str; 2] = ["direct", "直接"];
/// Category tokens marking indirect (scope 2) emissions. `indirect`
/// contains `direct` as a substring, so these have to be excluded explicitly.
pub const INDIRECT_TOKENS: [&str; 2] = ["indirect", "间接"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GhgType {
    #[default]
    CO2,
    CH4,
    N2O,
    HFCs,
    PFCs,
    SF6,
    NF3,
}

impl GhgType {
    pub const ALL: [GhgType; 7] = [
        GhgType::CO2,
        GhgType::CH4,
        GhgType::N2O,
        GhgType::HFCs,
        GhgType::PFCs,
        GhgType::SF6,
        GhgType::NF3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GhgType::CO2 => "CO2",
            GhgType::CH4 => "CH4",
            GhgType::N2O => "N2O",
            GhgType::HFCs => "HFCs",
            GhgType::PFCs => "PFCs",
            GhgType::SF6 => "SF6",
            GhgType::NF3 => "NF3",
        }
    }

    /// Case-insensitive lookup, also accepting subscript digits ("CO₂").
    pub fn from_str_loose(s: &str) -> Option<GhgType> {
        let folded: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '₂' => '2',
                '₃' => '3',
                '₄' => '4',
                '₆' => '6',
                other => other,
            })
            .collect::<String>()
            .to_lowercase();
        GhgType::ALL
            .into_iter()
            .find(|g| g.as_str().to_lowercase() == folded)
    }
}

impl fmt::Display for GhgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    ScopeOne,
    ScopeTwo,
}

impl Scope {
    /// Classify a free-text category.
    ///
    /// Case-insensitive so that it agrees with the `SUMIFS` criteria the
    /// workbook exporter writes for the same split.
    pub fn classify(category: &str) -> Scope {
        let lower = category.to_lowercase();
        let direct = DIRECT_TOKENS.iter().any(|t| lower.contains(t));
        let indirect = INDIRECT_TOKENS.iter().any(|t| lower.contains(t));
        if direct && !indirect {
            Scope::ScopeOne
        } else {
            Scope::ScopeTwo
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::ScopeOne => write!(f, "Scope 1"),
            Scope::ScopeTwo => write!(f, "Scope 2"),
        }
    }
}

/// One reported activity, as uploaded and edited by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub category: String,
    /// Carries the embedded rule code ("1.1", "2.1", ...).
    pub subcategory: String,
    pub source: String,
    /// Descriptive only, never used in computation.
    #[serde(default)]
    pub facility_or_process: String,
    pub activity_quantity: Decimal,
    #[serde(default)]
    pub unit_of_measure: String,
}

/// A validated activity table, ready for matching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityTable {
    pub rows: Vec<ActivityRecord>,
}
