pub mod edit;
pub mod export;
pub mod factors;
pub mod matching;
pub mod reconcile;
pub mod report;
