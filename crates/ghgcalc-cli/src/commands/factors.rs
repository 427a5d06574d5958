use ghgcalc_core::error::GhgError;
use ghgcalc_core::factors::schema::{EmissionFactor, FactorFileDef};
use ghgcalc_core::factors::{load_factor_file, validate_factor, validate_factor_file};
use ghgcalc_core::ingest::values::parse_decimal;
use ghgcalc_core::model::GhgType;
use std::path::{Path, PathBuf};

use crate::output;

pub fn list(factor_files: &[PathBuf]) -> Result<(), GhgError> {
    let library = ghgcalc_core::build_library(factor_files)?;
    println!("{} emission factor(s):\n", library.len());
    output::table::print_factors(library.iter());
    Ok(())
}

pub fn show(key: &str, factor_files: &[PathBuf]) -> Result<(), GhgError> {
    let library = ghgcalc_core::build_library(factor_files)?;
    let factor = library.require(key)?;

    println!("{}\n", factor.key);
    println!("  Factor:  {} {}", factor.factor, factor.unit);
    println!("  Gas:     {}", factor.ghg_type);
    if let Some(ref note) = factor.note {
        println!("  Note:    {note}");
    }
    Ok(())
}

pub fn validate(file: &Path) -> Result<(), GhgError> {
    let def = load_factor_file(file)?;

    println!("Factor file '{}' (v{}) is valid.", def.name, def.version);
    println!("  Factors: {}", def.factors.len());

    // Keys that would shadow a built-in factor are legal but worth knowing.
    let builtin = ghgcalc_core::factors::FactorLibrary::builtin()?;
    let shadowed: Vec<&str> = def
        .factors
        .iter()
        .filter(|f| builtin.get(&f.key).is_some())
        .map(|f| f.key.as_str())
        .collect();

    if !shadowed.is_empty() {
        println!("\nOverrides built-in factors:");
        for key in &shadowed {
            println!("  - {key}");
        }
    }

    Ok(())
}

pub fn add(
    file: &Path,
    key: String,
    factor: &str,
    unit: String,
    ghg: &str,
    note: Option<String>,
) -> Result<(), GhgError> {
    let invalid = |reason: String| GhgError::InvalidFactor {
        key: key.clone(),
        reason,
    };
    let value = parse_decimal(factor).map_err(|e| invalid(e.to_string()))?;
    let ghg_type =
        GhgType::from_str_loose(ghg).ok_or_else(|| invalid(format!("unknown gas '{ghg}'")))?;

    let entry = EmissionFactor {
        key: key.trim().to_string(),
        factor: value,
        unit,
        ghg_type,
        note,
    };
    validate_factor(&entry)?;

    let mut def = if file.exists() {
        load_factor_file(file)?
    } else {
        FactorFileDef {
            name: file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Custom factors".into()),
            description: None,
            version: "1.0".into(),
            factors: Vec::new(),
        }
    };

    let replaced = match def.factors.iter_mut().find(|f| f.key == entry.key) {
        Some(existing) => {
            *existing = entry.clone();
            true
        }
        None => {
            def.factors.push(entry.clone());
            false
        }
    };
    validate_factor_file(&def)?;
    output::json::write(file, &def)?;

    let verb = if replaced { "Replaced" } else { "Added" };
    println!(
        "{verb} '{}' = {} {} in {}",
        entry.key,
        entry.factor,
        entry.unit,
        file.display()
    );
    Ok(())
}

pub fn schema() -> Result<(), GhgError> {
    print!(
        r#"JSON Factor Schema
==================

A factor file supplies emission factors for the matcher. Files passed
with `--factors` are merged over the built-in factors in order; a later
entry with the same key replaces an earlier one.

Top-level fields:
  name          (string, required)  Human-readable name of the file
  description   (string, optional)  What these factors cover
  version       (string, required)  Version identifier (e.g., "2024.1")
  factors       (array, required)   List of factors (see below)

Each factor in the "factors" array:
  key           (string, required)  "<pathway>-<source>". The pathway is
                                    picked from the activity subcategory's
                                    rule code:
                                      1.1 Stationary combustion
                                      1.2 Mobile combustion
                                      1.3 Process emissions
                                      1.4 Fugitive emissions
                                      2.1 Purchased electricity
                                      2.2 Purchased heat
                                    The source is the activity's emission
                                    source as written. Any 2.1 source
                                    mentioning "electricity" uses
                                    "Purchased electricity-national grid average".
  factor        (string, required)  Emissions per unit of activity, as a
                                    quoted decimal (e.g., "2.1622").
                                    Must be greater than zero.
  unit          (string, required)  e.g. "kgCO2/m3"
  ghg_type      (string, required)  CO2, CH4, N2O, HFCs, PFCs, SF6 or NF3
  note          (string, optional)  Source or explanation.

Example:
{{
  "name": "Site factors",
  "description": "Supplier-specific factors for Site X",
  "version": "1.0",
  "factors": [
    {{
      "key": "Stationary combustion-biomass",
      "factor": "0.112",
      "unit": "kgCO2/kg",
      "ghg_type": "CO2",
      "note": "Supplier declaration 2024"
    }},
    {{
      "key": "Purchased electricity-national grid average",
      "factor": "0.5366",
      "unit": "kgCO2/kWh",
      "ghg_type": "CO2"
    }}
  ]
}}

Note: factor values must be quoted strings, not bare numbers,
to preserve exact decimal precision (e.g., "0.5366" not 0.5366).
"#
    );
    Ok(())
}
