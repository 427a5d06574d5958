//! Roll-up of calculated rows into scope, gas and subcategory totals.

use crate::calculate::CalculatedRow;
use crate::error::GhgError;
use crate::matching::outcome::MatchStatus;
use crate::model::{GhgType, Scope};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// One slice of a partition of the grand total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket<K> {
    pub key: K,
    pub tonnes: Decimal,
    /// Share of the grand total, 0..=100. Zero when the total is zero.
    pub percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub total_kg: Decimal,
    pub total_tonnes: Decimal,
    pub row_count: usize,
    pub matched_count: usize,
    pub unmatched_count: usize,
    pub overridden_count: usize,
    pub by_scope: Vec<Bucket<Scope>>,
    pub by_ghg: Vec<Bucket<GhgType>>,
    pub by_subcategory: Vec<Bucket<String>>,
}

impl AggregateSummary {
    pub fn scope_tonnes(&self, scope: Scope) -> Decimal {
        self.by_scope
            .iter()
            .find(|b| b.key == scope)
            .map(|b| b.tonnes)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn ghg_tonnes(&self, ghg: GhgType) -> Decimal {
        self.by_ghg
            .iter()
            .find(|b| b.key == ghg)
            .map(|b| b.tonnes)
            .unwrap_or(Decimal::ZERO)
    }
}

/// `part / total * 100`, or zero for an empty total.
pub fn percent_of(part: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        Decimal::ZERO
    } else {
        part / total * Decimal::ONE_HUNDRED
    }
}

/// Aggregate calculated rows.
///
/// Each breakdown partitions the grand total: its buckets sum to
/// `total_tonnes`. Buckets are ordered by descending tonnes, ties keep
/// first-seen order. Both scopes are always present. Fails when a total
/// does not fit a `Decimal`.
pub fn aggregate(rows: &[CalculatedRow]) -> Result<AggregateSummary, GhgError> {
    let total_kg = checked_sum(rows.iter().map(|r| r.emission.emission_kg))?;
    let total_tonnes = checked_sum(rows.iter().map(|r| r.emission.emission_tonnes))?;

    let mut by_scope = partition(rows, total_tonnes, |r| r.emission.scope)?;
    for scope in [Scope::ScopeOne, Scope::ScopeTwo] {
        if !by_scope.iter().any(|b| b.key == scope) {
            by_scope.push(Bucket {
                key: scope,
                tonnes: Decimal::ZERO,
                percent: Decimal::ZERO,
            });
        }
    }

    let count = |status: MatchStatus| rows.iter().filter(|r| r.row.status == status).count();

    let summary = AggregateSummary {
        total_kg,
        total_tonnes,
        row_count: rows.len(),
        matched_count: count(MatchStatus::Matched),
        unmatched_count: count(MatchStatus::Unmatched),
        overridden_count: count(MatchStatus::ManuallyOverridden),
        by_scope,
        by_ghg: partition(rows, total_tonnes, |r| r.row.factor.ghg_type)?,
        by_subcategory: partition(rows, total_tonnes, |r| r.row.activity.subcategory.clone())?,
    };

    tracing::debug!(
        rows = summary.row_count,
        total_tonnes = %summary.total_tonnes,
        "aggregation complete"
    );

    Ok(summary)
}

fn overflow() -> GhgError {
    GhgError::MalformedInput("emission total is out of range".into())
}

fn checked_sum(mut values: impl Iterator<Item = Decimal>) -> Result<Decimal, GhgError> {
    values.try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v).ok_or_else(overflow))
}

fn partition<K, F>(
    rows: &[CalculatedRow],
    total: Decimal,
    key_of: F,
) -> Result<Vec<Bucket<K>>, GhgError>
where
    K: Eq + Hash + Clone,
    F: Fn(&CalculatedRow) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<Bucket<K>> = Vec::new();

    for row in rows {
        let key = key_of(row);
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            buckets.push(Bucket {
                key,
                tonnes: Decimal::ZERO,
                percent: Decimal::ZERO,
            });
            buckets.len() - 1
        });
        let bucket = &mut buckets[slot];
        bucket.tonnes = bucket
            .tonnes
            .checked_add(row.emission.emission_tonnes)
            .ok_or_else(overflow)?;
    }

    for bucket in &mut buckets {
        bucket.percent = percent_of(bucket.tonnes, total);
    }
    // sort_by is stable
    buckets.sort_by(|a, b| b.tonnes.cmp(&a.tonnes));
    Ok(buckets)
}
