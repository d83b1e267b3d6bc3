//! The remote data contract consumed by the snapshot computer.

use crate::chain::lcd::FetchError;
use async_trait::async_trait;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

/// Lock discipline of an on-chain account, resolved once from its `@type` URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockKind {
    Delayed,
    Continuous,
    Periodic,
    Clawback,
    Permanent,
    Unknown,
}

impl LockKind {
    pub fn from_type_url(type_url: &str) -> Self {
        let name = type_url.rsplit('.').next().unwrap_or(type_url);
        match name {
            "DelayedVestingAccount" => Self::Delayed,
            "ContinuousVestingAccount" => Self::Continuous,
            "PeriodicVestingAccount" => Self::Periodic,
            "ClawbackVestingAccount" => Self::Clawback,
            "PermanentLockedAccount" => Self::Permanent,
            _ => Self::Unknown,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VestingPeriod {
    pub length_secs: i64,
    pub amount: Vec<Coin>,
}

/// Lock metadata of one account. An account without lock fields decodes to an
/// empty `original_vesting`, meaning nothing is locked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountLock {
    pub type_url: String,
    pub kind: LockKind,
    pub original_vesting: Vec<Coin>,
    pub start_time: Option<OffsetDateTime>,
    pub end_time: Option<OffsetDateTime>,
    pub vesting_periods: Vec<VestingPeriod>,
    pub lockup_periods: Vec<VestingPeriod>,
}

impl AccountLock {
    /// A plain account: nothing locked.
    pub fn unlocked(type_url: impl Into<String>) -> Self {
        let type_url = type_url.into();
        Self {
            kind: LockKind::from_type_url(&type_url),
            type_url,
            original_vesting: vec![],
            start_time: None,
            end_time: None,
            vesting_periods: vec![],
            lockup_periods: vec![],
        }
    }

    pub fn original_for(&self, denom: &str) -> Option<&str> {
        self.original_vesting
            .iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount.as_str())
    }
}

/// Claim-delayed unlock tier. Tier `n` (1..=4) unlocks `6 * n` months after the claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClaimTier(u8);

impl ClaimTier {
    pub const ALL: [ClaimTier; 4] = [ClaimTier(1), ClaimTier(2), ClaimTier(3), ClaimTier(4)];

    pub fn new(tier: u8) -> Option<Self> {
        (1..=4).contains(&tier).then_some(Self(tier))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn unlock_months(self) -> u32 {
        u32::from(self.0) * 6
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimRecord {
    pub address: String,
    pub claim_time: Option<OffsetDateTime>,
    /// Claimed amount for the requested denom, when the record carries one.
    pub amount: Option<BigUint>,
}

/// Remote ledger queries. Every call is independent; implementations bound each call
/// with their own timeout so a hung upstream surfaces as an error.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    async fn latest_height_and_time(&self) -> Result<(i64, OffsetDateTime), FetchError>;

    async fn total_supply(&self, denom: &str) -> Result<BigUint, FetchError>;

    async fn total_escrow(&self, denom: &str) -> Result<BigUint, FetchError>;

    /// Community pool balance as the raw decimal string; callers truncate.
    async fn community_pool_balance(&self, denom: &str) -> Result<String, FetchError>;

    async fn balance_of(&self, address: &str, denom: &str) -> Result<BigUint, FetchError>;

    async fn resolve_module_address(&self, name: &str) -> Result<String, FetchError>;

    async fn account_lock_state(&self, address: &str) -> Result<AccountLock, FetchError>;

    async fn claimed_accounts(
        &self,
        tier: ClaimTier,
        denom: &str,
    ) -> Result<Vec<ClaimRecord>, FetchError>;
}
