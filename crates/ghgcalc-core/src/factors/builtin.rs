use crate::error::GhgError;
use crate::factors::schema::FactorFileDef;

const BUILTIN_FACTORS_JSON: &str = include_str!("../../../../factors/builtin.json");

/// Load the built-in seed factor set.
pub fn builtin_factors() -> Result<FactorFileDef, GhgError> {
    let file: FactorFileDef = serde_json::from_str(BUILTIN_FACTORS_JSON)?;
    Ok(file)
}
