use crate::error::GhgError;
use crate::factors::builtin::builtin_factors;
use crate::factors::schema::{EmissionFactor, FactorFileDef};
use crate::factors::validate_factor;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read access to a set of emission factors.
pub trait FactorLookup {
    fn lookup(&self, key: &str) -> Option<&EmissionFactor>;

    /// Revision of the library the factors were read from.
    fn version(&self) -> u64;
}

/// Mutable factor store owned by the run context.
///
/// Copy-on-write: `put` never disturbs a [`FactorSnapshot`] taken earlier,
/// so a matcher pass always sees one consistent library revision.
#[derive(Debug, Clone, Default)]
pub struct FactorLibrary {
    factors: Arc<BTreeMap<String, EmissionFactor>>,
    version: u64,
}

/// Immutable view of a library at one revision.
#[derive(Debug, Clone)]
pub struct FactorSnapshot {
    factors: Arc<BTreeMap<String, EmissionFactor>>,
    version: u64,
}

impl FactorLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// A library seeded with the built-in factor set.
    pub fn builtin() -> Result<Self, GhgError> {
        let mut library = Self::new();
        library.extend_from_file(&builtin_factors()?)?;
        Ok(library)
    }

    pub fn get(&self, key: &str) -> Option<&EmissionFactor> {
        self.factors.get(key)
    }

    pub fn require(&self, key: &str) -> Result<&EmissionFactor, GhgError> {
        self.get(key.trim())
            .ok_or_else(|| GhgError::UnknownFactor(key.trim().to_string()))
    }

    /// Insert a factor, overwriting any entry with the same key.
    ///
    /// Returns the replaced entry, if any.
    pub fn put(&mut self, mut factor: EmissionFactor) -> Result<Option<EmissionFactor>, GhgError> {
        validate_factor(&factor)?;
        factor.key = factor.key.trim().to_string();
        let key = factor.key.clone();
        let previous = Arc::make_mut(&mut self.factors).insert(key, factor);
        self.version += 1;
        if let Some(ref prev) = previous {
            tracing::debug!(key = %prev.key, "factor overwritten");
        }
        Ok(previous)
    }

    /// Put every factor of a file, in file order. Returns how many were added.
    pub fn extend_from_file(&mut self, file: &FactorFileDef) -> Result<usize, GhgError> {
        for factor in &file.factors {
            self.put(factor.clone())?;
        }
        tracing::debug!(
            file = %file.name,
            count = file.factors.len(),
            version = self.version,
            "factor file merged"
        );
        Ok(file.factors.len())
    }

    pub fn snapshot(&self) -> FactorSnapshot {
        FactorSnapshot {
            factors: Arc::clone(&self.factors),
            version: self.version,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EmissionFactor> {
        self.factors.values()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Bumped by every successful `put`.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl FactorSnapshot {
    pub fn iter(&self) -> impl Iterator<Item = &EmissionFactor> {
        self.factors.values()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}

impl FactorLookup for FactorLibrary {
    fn lookup(&self, key: &str) -> Option<&EmissionFactor> {
        self.get(key)
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl FactorLookup for FactorSnapshot {
    fn lookup(&self, key: &str) -> Option<&EmissionFactor> {
        self.factors.get(key)
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GhgType;
    use rust_decimal_macros::dec;

    fn factor(key: &str, value: rust_decimal::Decimal) -> EmissionFactor {
        EmissionFactor {
            key: key.into(),
            factor: value,
            unit: "kgCO2/kg".into(),
            ghg_type: GhgType::CO2,
            note: None,
        }
    }

    #[test]
    fn test_builtin_library() {
        let lib = FactorLibrary::builtin().unwrap();
        assert_eq!(lib.len(), 25);
        assert_eq!(
            lib.get("Purchased heat-steam").map(|f| f.factor),
            Some(dec!(110))
        );
    }

    #[test]
    fn test_put_overwrites_by_key() {
        let mut lib = FactorLibrary::new();
        assert!(lib
            .put(factor("Stationary combustion-coal", dec!(2.38)))
            .unwrap()
            .is_none());
        let prev = lib
            .put(factor("Stationary combustion-coal", dec!(2.5)))
            .unwrap();
        assert_eq!(prev.map(|f| f.factor), Some(dec!(2.38)));
        assert_eq!(lib.len(), 1);
        assert_eq!(lib.get("Stationary combustion-coal").unwrap().factor, dec!(2.5));
    }

    #[test]
    fn test_put_rejects_non_positive() {
        let mut lib = FactorLibrary::new();
        assert!(lib.put(factor("Stationary combustion-coal", dec!(0))).is_err());
        assert!(lib.put(factor("Stationary combustion-coal", dec!(-1))).is_err());
        assert!(lib.is_empty());
        assert_eq!(lib.version(), 0);
    }

    #[test]
    fn test_snapshot_isolated_from_later_puts() {
        let mut lib = FactorLibrary::new();
        lib.put(factor("Stationary combustion-coal", dec!(2.38))).unwrap();
        let snap = lib.snapshot();

        lib.put(factor("Stationary combustion-coal", dec!(9))).unwrap();
        lib.put(factor("Stationary combustion-peat", dec!(1.1))).unwrap();

        assert_eq!(snap.lookup("Stationary combustion-coal").unwrap().factor, dec!(2.38));
        assert!(snap.lookup("Stationary combustion-peat").is_none());
        assert_eq!(snap.version(), 1);
        assert_eq!(lib.version(), 3);
    }

    #[test]
    fn test_require_unknown_key() {
        let lib = FactorLibrary::builtin().unwrap();
        assert!(lib.require(" Purchased heat-steam").is_ok());
        assert!(matches!(
            lib.require("Purchased heat-hot water"),
            Err(GhgError::UnknownFactor(_))
        ));
    }

    #[test]
    fn test_put_trims_key() {
        let mut lib = FactorLibrary::new();
        lib.put(factor("  Purchased heat-steam ", dec!(110))).unwrap();
        assert!(lib.get("Purchased heat-steam").is_some());
    }
}
