use ghgcalc_core::error::GhgError;
use serde::Serialize;
use std::path::Path;

pub fn print<T: Serialize>(value: &T) -> Result<(), GhgError> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// Save a value as pretty JSON, e.g. a row snapshot between pipeline steps.
pub fn write<T: Serialize>(path: &Path, value: &T) -> Result<(), GhgError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
