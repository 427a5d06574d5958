//! Activity-level emission computation.

use crate::error::GhgError;
use crate::matching::outcome::MatchedRow;
use crate::model::Scope;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const KG_PER_TONNE: Decimal = Decimal::ONE_THOUSAND;

/// Emission derived from one matched row. Never cached: recomputed from
/// the row every time it is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedEmission {
    pub emission_kg: Decimal,
    pub emission_tonnes: Decimal,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedRow {
    pub row: MatchedRow,
    pub emission: ComputedEmission,
}

/// Compute a row's emission: quantity x factor, then kg -> tonnes.
///
/// A zero (unresolved) factor or zero quantity yields zero. Units are taken
/// as given; the only conversion is the divide by 1000. Returns `None` when
/// the product does not fit a `Decimal`.
pub fn compute(row: &MatchedRow) -> Option<ComputedEmission> {
    let emission_kg = row
        .activity
        .activity_quantity
        .checked_mul(row.factor.value)?;
    Some(ComputedEmission {
        emission_kg,
        emission_tonnes: emission_kg / KG_PER_TONNE,
        scope: Scope::classify(&row.activity.category),
    })
}

pub fn calculate(rows: &[MatchedRow]) -> Result<Vec<CalculatedRow>, GhgError> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            let emission = compute(row).ok_or_else(|| {
                GhgError::MalformedInput(format!(
                    "row {idx}: {} x {} is out of range",
                    row.activity.activity_quantity, row.factor.value
                ))
            })?;
            Ok(CalculatedRow {
                row: row.clone(),
                emission,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::outcome::{MatchStatus, Provenance, ResolvedFactor};
    use crate::model::{ActivityRecord, GhgType};
    use rust_decimal_macros::dec;

    fn row(category: &str, qty: Decimal, factor: Decimal) -> MatchedRow {
        MatchedRow {
            activity: ActivityRecord {
                category: category.into(),
                subcategory: "1.1 stationary combustion".into(),
                source: "natural gas".into(),
                facility_or_process: String::new(),
                activity_quantity: qty,
                unit_of_measure: "m3".into(),
            },
            suggested_factor_key: "Stationary combustion-natural gas".into(),
            factor: ResolvedFactor {
                value: factor,
                unit: "kgCO2/m3".into(),
                ghg_type: GhgType::CO2,
            },
            status: MatchStatus::Matched,
            provenance: Provenance::FactorLibrary,
        }
    }

    #[test]
    fn test_natural_gas_scenario() {
        let e = compute(&row("Scope 1: direct", dec!(1239138), dec!(2.1622))).unwrap();
        assert_eq!(e.emission_kg, dec!(2679264.1836));
        assert_eq!(e.emission_tonnes, dec!(2679.2641836));
        assert_eq!(e.emission_tonnes.round_dp(2), dec!(2679.26));
        assert_eq!(e.scope, Scope::ScopeOne);
    }

    #[test]
    fn test_override_value_used() {
        let e = compute(&row("Scope 1: direct", dec!(1239138), dec!(2.5))).unwrap();
        assert_eq!(e.emission_kg, dec!(3097845));
    }

    #[test]
    fn test_zero_factor_yields_zero() {
        let e = compute(&row("Scope 1: direct", dec!(1239138), Decimal::ZERO)).unwrap();
        assert!(e.emission_kg.is_zero());
        assert!(e.emission_tonnes.is_zero());
    }

    #[test]
    fn test_zero_quantity_yields_zero() {
        let e = compute(&row("Scope 2: indirect", Decimal::ZERO, dec!(0.5703))).unwrap();
        assert!(e.emission_kg.is_zero());
        assert_eq!(e.scope, Scope::ScopeTwo);
    }

    #[test]
    fn test_calculate_preserves_rows() {
        let rows = vec![
            row("Scope 1: direct", dec!(10), dec!(2)),
            row("Scope 2: indirect", dec!(1000), dec!(0.5)),
        ];
        let out = calculate(&rows).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].row, rows[0]);
        assert_eq!(out[1].emission.emission_tonnes, dec!(0.5));
    }

    #[test]
    fn test_out_of_range_product_is_rejected() {
        let rows = vec![
            row("Scope 1: direct", dec!(10), dec!(2)),
            row("Scope 1: direct", Decimal::MAX, dec!(2088)),
        ];
        match calculate(&rows) {
            Err(GhgError::MalformedInput(msg)) => assert!(msg.starts_with("row 1:"), "{msg}"),
            other => panic!("expected MalformedInput, got {other:?}"),
        }
    }
}
