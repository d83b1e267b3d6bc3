//! Supply snapshot data model. All amounts are base-10 integer strings in atomic units.

use crate::vesting::{EndDate, LockedPortion};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Supply figures observed at one block height. Never mutated once built; a refresh
/// produces a new snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplySnapshot {
    pub denom: String,
    pub height: i64,
    /// Block time of `height`.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub etag: String,
    /// Fingerprint of the policy that selected the cohorts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_etag: Option<String>,
    pub total: String,
    pub circulating: String,
    pub max: Option<String>,
    pub non_circulating: NonCirculatingBreakdown,
    /// Cohorts or addresses left out because their remote queries failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonCirculatingBreakdown {
    pub sum: String,
    pub cohorts: Vec<CohortEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortEntry {
    pub name: String,
    pub reason: String,
    /// Single-address cohorts (module accounts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Per-address cohorts; `amount` is the sum of item amounts. Absent when no
    /// address could be evaluated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<AddressItem>>,
    pub amount: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressItem {
    pub address: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "EndDate::is_none")]
    pub end_date: EndDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub cohort: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub reason: String,
}

impl SkippedEntry {
    pub fn cohort(cohort: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            cohort: cohort.into(),
            address: None,
            reason: reason.to_string(),
        }
    }

    pub fn address(
        cohort: impl Into<String>,
        address: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self {
            cohort: cohort.into(),
            address: Some(address.into()),
            reason: reason.to_string(),
        }
    }
}

impl CohortEntry {
    /// Whole cohort counted as one figure (escrow, community pool).
    pub fn aggregate(name: &str, reason: &str, amount: &BigUint) -> Self {
        Self {
            name: name.to_string(),
            reason: reason.to_string(),
            address: None,
            items: None,
            amount: amount.to_string(),
        }
    }

    /// Whole balance of one account.
    pub fn account(name: String, reason: &str, address: String, amount: &BigUint) -> Self {
        Self {
            name,
            reason: reason.to_string(),
            address: Some(address),
            items: None,
            amount: amount.to_string(),
        }
    }
}

/// Accumulates per-address items and their exact sum.
#[derive(Default)]
pub(crate) struct ItemsBuilder {
    items: Vec<AddressItem>,
    sum: BigUint,
}

impl ItemsBuilder {
    pub(crate) fn push(&mut self, address: &str, portion: LockedPortion) {
        self.sum += &portion.amount;
        self.items.push(AddressItem {
            address: address.to_string(),
            amount: portion.amount.to_string(),
            end_date: portion.end,
        });
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn finish(self, name: &str, reason: &str) -> (CohortEntry, BigUint) {
        let entry = CohortEntry {
            name: name.to_string(),
            reason: reason.to_string(),
            address: None,
            items: (!self.items.is_empty()).then_some(self.items),
            amount: self.sum.to_string(),
        };
        (entry, self.sum)
    }
}

