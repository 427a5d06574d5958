pub mod engine;
pub mod outcome;
pub mod pathway;

pub use engine::{match_row, match_rows};
pub use outcome::{MatchOutcome, MatchStatus, MatchedRow, Provenance, ResolvedFactor};
