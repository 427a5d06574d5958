use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GhgError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("invalid emission factor '{key}': {reason}")]
    InvalidFactor { key: String, reason: String },

    #[error("invalid manual factor value '{value}' for row {row}: {reason}")]
    InvalidManualValue {
        row: usize,
        value: String,
        reason: String,
    },

    #[error("failed to load factor file from {path}: {reason}")]
    FactorLoad { path: PathBuf, reason: String },

    #[error("unknown emission factor '{0}'")]
    UnknownFactor(String),

    #[error("workbook export failed while writing {part}: {reason}")]
    Export { part: String, reason: String },

    #[error("formula error: {0}")]
    Formula(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
