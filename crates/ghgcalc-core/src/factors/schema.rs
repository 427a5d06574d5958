use crate::model::GhgType;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A file of emission factors, either the built-in seed or a user supplement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorFileDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    pub factors: Vec<EmissionFactor>,
}

/// A single emission factor record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactor {
    /// `<pathway>-<source>`, unique within a library.
    pub key: String,
    /// Emissions per unit of activity (as string for exact decimal).
    pub factor: Decimal,
    /// Numerator/denominator description, e.g. "kgCO2/kWh".
    pub unit: String,
    pub ghg_type: GhgType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
