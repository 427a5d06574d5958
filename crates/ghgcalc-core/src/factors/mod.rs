pub mod builtin;
pub mod library;
pub mod schema;

use crate::error::GhgError;
use rust_decimal::Decimal;
use schema::{EmissionFactor, FactorFileDef};
use std::collections::HashSet;
use std::path::Path;

pub use library::{FactorLibrary, FactorLookup, FactorSnapshot};

/// Load a factor file from JSON.
pub fn load_factor_file(path: &Path) -> Result<FactorFileDef, GhgError> {
    let content = std::fs::read_to_string(path).map_err(|e| GhgError::FactorLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_factor_file(&content, path)
}

/// Parse a factor file from a JSON string.
pub fn parse_factor_file(json: &str, source: &Path) -> Result<FactorFileDef, GhgError> {
    let file: FactorFileDef = serde_json::from_str(json).map_err(|e| GhgError::FactorLoad {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    validate_factor_file(&file)?;
    Ok(file)
}

/// Parse a factor file from a JSON string (no file path context).
pub fn parse_factor_file_str(json: &str) -> Result<FactorFileDef, GhgError> {
    let file: FactorFileDef = serde_json::from_str(json).map_err(GhgError::Json)?;
    validate_factor_file(&file)?;
    Ok(file)
}

/// Validate that a factor file is well-formed.
pub fn validate_factor_file(file: &FactorFileDef) -> Result<(), GhgError> {
    if file.factors.is_empty() {
        return Err(GhgError::InvalidFactor {
            key: file.name.clone(),
            reason: "factor file contains no factors".into(),
        });
    }

    let mut seen = HashSet::new();
    for factor in &file.factors {
        validate_factor(factor)?;
        if !seen.insert(factor.key.as_str()) {
            return Err(GhgError::InvalidFactor {
                key: factor.key.clone(),
                reason: "duplicate key within the same file".into(),
            });
        }
    }

    Ok(())
}

/// Validate a single factor before it enters a library.
///
/// A zero factor is the matcher's "unresolved" placeholder and is never
/// stored.
pub fn validate_factor(factor: &EmissionFactor) -> Result<(), GhgError> {
    let invalid = |reason: &str| GhgError::InvalidFactor {
        key: factor.key.clone(),
        reason: reason.to_string(),
    };

    let key = factor.key.trim();
    if key.is_empty() {
        return Err(invalid("key must not be empty"));
    }
    if !key.contains('-') {
        return Err(invalid("key must have the form '<pathway>-<source>'"));
    }
    if factor.unit.trim().is_empty() {
        return Err(invalid("unit must not be empty"));
    }
    if factor.factor <= Decimal::ZERO {
        return Err(invalid("factor must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_factor_file() {
        let json = r#"{
            "name": "Site factors",
            "version": "1.0",
            "factors": [
                { "key": "Stationary combustion-biomass", "factor": "0.112", "unit": "kgCO2/kg", "ghg_type": "CO2" }
            ]
        }"#;
        let file = parse_factor_file_str(json).unwrap();
        assert_eq!(file.name, "Site factors");
        assert_eq!(file.factors.len(), 1);
        assert_eq!(file.factors[0].factor, rust_decimal_macros::dec!(0.112));
    }

    #[test]
    fn test_empty_factor_list_rejected() {
        let json = r#"{ "name": "Bad", "version": "1.0", "factors": [] }"#;
        assert!(parse_factor_file_str(json).is_err());
    }

    #[test]
    fn test_zero_factor_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "factors": [
                { "key": "Stationary combustion-air", "factor": "0", "unit": "kgCO2/kg", "ghg_type": "CO2" }
            ]
        }"#;
        assert!(matches!(
            parse_factor_file_str(json),
            Err(GhgError::InvalidFactor { .. })
        ));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "factors": [
                { "key": "Purchased heat-steam", "factor": "110", "unit": "kgCO2/GJ", "ghg_type": "CO2" },
                { "key": "Purchased heat-steam", "factor": "95", "unit": "kgCO2/GJ", "ghg_type": "CO2" }
            ]
        }"#;
        assert!(parse_factor_file_str(json).is_err());
    }

    #[test]
    fn test_unknown_ghg_type_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "factors": [
                { "key": "Purchased heat-steam", "factor": "110", "unit": "kgCO2/GJ", "ghg_type": "H2O" }
            ]
        }"#;
        assert!(parse_factor_file_str(json).is_err());
    }

    #[test]
    fn test_key_without_pathway_rejected() {
        let json = r#"{
            "name": "Bad",
            "version": "1.0",
            "factors": [
                { "key": "steam", "factor": "110", "unit": "kgCO2/GJ", "ghg_type": "CO2" }
            ]
        }"#;
        assert!(parse_factor_file_str(json).is_err());
    }
}
