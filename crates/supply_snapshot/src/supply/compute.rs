//! Snapshot computation: one observed height, independent best-effort cohorts,
//! exact integer aggregation.

use crate::chain::{
    add_months, truncate_decimal, ChainDataSource, ClaimRecord, ClaimTier, FetchError,
};
use crate::policy::{BootstrapEntry, Policy};
use crate::supply::fingerprint::snapshot_etag;
use crate::supply::types::{
    CohortEntry, ItemsBuilder, NonCirculatingBreakdown, SkippedEntry, SupplySnapshot,
};
use crate::vesting::{delayed_locked, locked_at, EndDate, LockedPortion};
use num_bigint::BigUint;
use num_traits::Zero;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

const IBC_ESCROW: &str = "ibc_escrow";
const COMMUNITY_POOL: &str = "community_pool";
const MODULE_PREFIX: &str = "module:";
const FOUNDATION_GENESIS: &str = "foundation_genesis";
const SUPERNODE_BOOTSTRAPS: &str = "supernode_bootstraps";
const CLAIM_DELAYED: &str = "claim_delayed";

/// Fatal failures. Anything else degrades the breakdown instead.
#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("latest height: {0}")]
    Height(#[source] FetchError),
    #[error("total supply: {0}")]
    TotalSupply(#[source] FetchError),
}

/// What one cohort contributed: counted entries with their exact amounts, and the
/// parts that had to be left out.
#[derive(Default)]
struct CohortOutcome {
    counted: Vec<(CohortEntry, BigUint)>,
    skipped: Vec<SkippedEntry>,
}

impl From<Result<(CohortEntry, BigUint), SkippedEntry>> for CohortOutcome {
    fn from(r: Result<(CohortEntry, BigUint), SkippedEntry>) -> Self {
        match r {
            Ok(counted) => Self {
                counted: vec![counted],
                skipped: vec![],
            },
            Err(skip) => Self {
                counted: vec![],
                skipped: vec![skip],
            },
        }
    }
}

fn fold(outcomes: Vec<CohortOutcome>) -> (NonCirculatingBreakdown, BigUint, Vec<SkippedEntry>) {
    let mut sum = BigUint::zero();
    let mut cohorts = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        for (entry, amount) in outcome.counted {
            sum += amount;
            cohorts.push(entry);
        }
        for skip in outcome.skipped {
            warn!(
                cohort = %skip.cohort,
                address = skip.address.as_deref().unwrap_or(""),
                reason = %skip.reason,
                "non-circulating entry skipped"
            );
            skipped.push(skip);
        }
    }
    let breakdown = NonCirculatingBreakdown {
        sum: sum.to_string(),
        cohorts,
    };
    (breakdown, sum, skipped)
}

/// Builds supply snapshots from a chain data source and a policy.
pub struct SnapshotComputer<S> {
    source: S,
    policy: Policy,
    policy_etag: Option<String>,
}

impl<S: ChainDataSource> SnapshotComputer<S> {
    pub fn new(source: S, policy: Policy) -> Self {
        let policy_etag = match policy.fingerprint() {
            Ok(etag) => Some(etag),
            Err(e) => {
                warn!(error = %e, "policy fingerprint unavailable");
                None
            }
        };
        Self {
            source,
            policy,
            policy_etag,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn policy_etag(&self) -> Option<&str> {
        self.policy_etag.as_deref()
    }

    /// Compute a snapshot at the latest height. Height/time and total supply are
    /// required; every cohort is best-effort.
    pub async fn compute_snapshot(&self, denom: &str) -> Result<SupplySnapshot, ComputeError> {
        let (height, now) = self
            .source
            .latest_height_and_time()
            .await
            .map_err(ComputeError::Height)?;
        let total = self
            .source
            .total_supply(denom)
            .await
            .map_err(ComputeError::TotalSupply)?;
        debug!(denom, height, %total, "computing snapshot");

        let (escrow, pool, modules, foundation, bootstrap, claims) = tokio::join!(
            self.escrow_cohort(denom),
            self.community_pool_cohort(denom),
            self.module_cohorts(denom),
            self.foundation_cohort(denom, now),
            self.bootstrap_cohort(denom, now),
            self.claim_delayed_cohort(denom, now),
        );
        let (non_circulating, non_circ_sum, skipped) = fold(vec![
            escrow.into(),
            pool.into(),
            modules,
            foundation,
            bootstrap,
            claims,
        ]);

        let circulating = if total >= non_circ_sum {
            &total - &non_circ_sum
        } else {
            warn!(
                denom,
                %total,
                non_circulating = %non_circ_sum,
                "non-circulating exceeds total; clamping circulating to 0"
            );
            BigUint::zero()
        };

        let total = total.to_string();
        let circulating = circulating.to_string();
        let etag = snapshot_etag(denom, &total, &circulating, &non_circulating.sum, height);
        info!(
            denom,
            height,
            %total,
            %circulating,
            non_circulating = %non_circulating.sum,
            cohorts = non_circulating.cohorts.len(),
            skipped = skipped.len(),
            "snapshot computed"
        );

        Ok(SupplySnapshot {
            denom: denom.to_string(),
            height,
            updated_at: now,
            etag,
            policy_etag: self.policy_etag.clone(),
            total,
            circulating,
            max: self.policy.max_supply.clone(),
            non_circulating,
            skipped,
        })
    }

    async fn escrow_cohort(&self, denom: &str) -> Result<(CohortEntry, BigUint), SkippedEntry> {
        let amount = self
            .source
            .total_escrow(denom)
            .await
            .map_err(|e| SkippedEntry::cohort(IBC_ESCROW, e))?;
        let entry = CohortEntry::aggregate(IBC_ESCROW, "ICS20 transfer escrows", &amount);
        Ok((entry, amount))
    }

    async fn community_pool_cohort(
        &self,
        denom: &str,
    ) -> Result<(CohortEntry, BigUint), SkippedEntry> {
        let raw = self
            .source
            .community_pool_balance(denom)
            .await
            .map_err(|e| SkippedEntry::cohort(COMMUNITY_POOL, e))?;
        let amount = truncate_decimal(&raw).map_err(|e| SkippedEntry::cohort(COMMUNITY_POOL, e))?;
        let entry = CohortEntry::aggregate(COMMUNITY_POOL, "distribution community pool", &amount);
        Ok((entry, amount))
    }

    async fn module_cohorts(&self, denom: &str) -> CohortOutcome {
        let mut out = CohortOutcome::default();
        for name in &self.policy.module_accounts {
            let cohort = format!("{MODULE_PREFIX}{name}");
            let address = match self.source.resolve_module_address(name).await {
                Ok(a) => a,
                Err(e) => {
                    out.skipped.push(SkippedEntry::cohort(cohort, format!("resolve: {e}")));
                    continue;
                }
            };
            match self.source.balance_of(&address, denom).await {
                Ok(amount) => {
                    let entry = CohortEntry::account(
                        cohort,
                        "protocol-controlled module account",
                        address,
                        &amount,
                    );
                    out.counted.push((entry, amount));
                }
                Err(e) => out
                    .skipped
                    .push(SkippedEntry::address(cohort, address, format!("balance: {e}"))),
            }
        }
        out
    }

    async fn locked_from_account(
        &self,
        address: &str,
        denom: &str,
        now: OffsetDateTime,
    ) -> Result<LockedPortion, String> {
        let lock = self
            .source
            .account_lock_state(address)
            .await
            .map_err(|e| format!("account: {e}"))?;
        locked_at(&lock, denom, now).map_err(|e| format!("lock: {e}"))
    }

    async fn foundation_cohort(&self, denom: &str, now: OffsetDateTime) -> CohortOutcome {
        let entries = &self.policy.disclosed_lockups.foundation_genesis;
        let mut out = CohortOutcome::default();
        if entries.is_empty() {
            return out;
        }
        let mut items = ItemsBuilder::default();
        for e in entries {
            match self.locked_from_account(&e.address, denom, now).await {
                Ok(portion) => items.push(&e.address, portion),
                Err(reason) => out
                    .skipped
                    .push(SkippedEntry::address(FOUNDATION_GENESIS, &e.address, reason)),
            }
        }
        out.counted.push(items.finish(
            FOUNDATION_GENESIS,
            "protocol/foundation vesting locked portion",
        ));
        out
    }

    /// Lock derived from policy hints, or `None` when the entry carries no hint.
    async fn bootstrap_hint(
        &self,
        e: &BootstrapEntry,
        denom: &str,
        now: OffsetDateTime,
    ) -> Option<Result<LockedPortion, String>> {
        let end = if e.permanent {
            EndDate::Forever
        } else if let Some(months) = e.duration_months {
            match add_months(e.start_time.unwrap_or(now), months) {
                Ok(t) => EndDate::At(t),
                Err(err) => return Some(Err(format!("duration: {err}"))),
            }
        } else if let Some(t) = e.end_time {
            EndDate::At(t)
        } else {
            return None;
        };
        let balance = match self.source.balance_of(&e.address, denom).await {
            Ok(b) => b,
            Err(err) => return Some(Err(format!("balance: {err}"))),
        };
        let amount = match end {
            EndDate::At(t) => delayed_locked(&balance, now, t),
            _ => balance,
        };
        Some(Ok(LockedPortion { amount, end }))
    }

    async fn bootstrap_item(
        &self,
        e: &BootstrapEntry,
        denom: &str,
        now: OffsetDateTime,
    ) -> Result<LockedPortion, String> {
        let onchain = self.locked_from_account(&e.address, denom, now).await;
        if matches!(&onchain, Ok(p) if !p.amount.is_zero()) {
            return onchain;
        }
        match self.bootstrap_hint(e, denom, now).await {
            Some(Ok(portion)) => Ok(portion),
            Some(Err(hint_err)) => onchain.map_err(|err| format!("{err}; fallback {hint_err}")),
            None => onchain,
        }
    }

    async fn bootstrap_cohort(&self, denom: &str, now: OffsetDateTime) -> CohortOutcome {
        let entries = &self.policy.disclosed_lockups.bootstraps;
        let mut out = CohortOutcome::default();
        if entries.is_empty() {
            return out;
        }
        let mut items = ItemsBuilder::default();
        for e in entries {
            match self.bootstrap_item(e, denom, now).await {
                Ok(portion) => items.push(&e.address, portion),
                Err(reason) => out
                    .skipped
                    .push(SkippedEntry::address(SUPERNODE_BOOTSTRAPS, &e.address, reason)),
            }
        }
        out.counted
            .push(items.finish(SUPERNODE_BOOTSTRAPS, "protocol supernode bootstrap locks"));
        out
    }

    /// On-chain lock when the account can be read; otherwise a delayed lock from the
    /// claim time plus the tier window over the claimed (or current) amount.
    async fn claim_item(
        &self,
        r: &ClaimRecord,
        tier: ClaimTier,
        denom: &str,
        now: OffsetDateTime,
    ) -> Result<LockedPortion, String> {
        let onchain_err = match self.locked_from_account(&r.address, denom, now).await {
            Ok(portion) => return Ok(portion),
            Err(e) => e,
        };
        debug!(
            address = %r.address,
            tier = tier.number(),
            error = %onchain_err,
            "claim lock from claim record"
        );
        let start = r.claim_time.unwrap_or(now);
        let end = add_months(start, tier.unlock_months())
            .map_err(|e| format!("claim window: {e}"))?;
        let amount = match &r.amount {
            Some(a) => a.clone(),
            None => self
                .source
                .balance_of(&r.address, denom)
                .await
                .map_err(|e| format!("{onchain_err}; balance: {e}"))?,
        };
        Ok(LockedPortion {
            amount: delayed_locked(&amount, now, end),
            end: EndDate::At(end),
        })
    }

    async fn claim_delayed_cohort(&self, denom: &str, now: OffsetDateTime) -> CohortOutcome {
        let mut out = CohortOutcome::default();
        let mut items = ItemsBuilder::default();
        for tier in ClaimTier::ALL {
            let records = match self.source.claimed_accounts(tier, denom).await {
                Ok(r) => r,
                Err(e) => {
                    out.skipped.push(SkippedEntry::cohort(
                        CLAIM_DELAYED,
                        format!("tier {}: {e}", tier.number()),
                    ));
                    continue;
                }
            };
            for r in &records {
                match self.claim_item(r, tier, denom, now).await {
                    Ok(portion) => items.push(&r.address, portion),
                    Err(reason) => out
                        .skipped
                        .push(SkippedEntry::address(CLAIM_DELAYED, &r.address, reason)),
                }
            }
        }
        if !items.is_empty() {
            out.counted.push(items.finish(
                CLAIM_DELAYED,
                "claim module delayed locks (6/12/18/24m), on-chain vesting preferred",
            ));
        }
        out
    }
}
