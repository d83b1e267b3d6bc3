//! In-memory chain data source for unit tests.

use crate::chain::{AccountLock, ChainDataSource, ClaimRecord, ClaimTier, Coin, FetchError};
use async_trait::async_trait;
use num_bigint::BigUint;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use time::macros::datetime;
use time::OffsetDateTime;

pub(crate) const NOW: OffsetDateTime = datetime!(2025-06-01 00:00:00 UTC);

pub(crate) fn amt(n: u64) -> BigUint {
    BigUint::from(n)
}

fn coins(amount: u64) -> Vec<Coin> {
    vec![Coin {
        denom: "ulume".into(),
        amount: amount.to_string(),
    }]
}

pub(crate) fn permanent_lock(amount: u64) -> AccountLock {
    AccountLock {
        original_vesting: coins(amount),
        ..AccountLock::unlocked("/cosmos.vesting.v1beta1.PermanentLockedAccount")
    }
}

pub(crate) fn delayed_lock(amount: u64, end: OffsetDateTime) -> AccountLock {
    AccountLock {
        original_vesting: coins(amount),
        end_time: Some(end),
        ..AccountLock::unlocked("/cosmos.vesting.v1beta1.DelayedVestingAccount")
    }
}

fn unavailable(what: &str) -> FetchError {
    FetchError::Api(503, format!("{what} unavailable"))
}

#[derive(Clone)]
pub(crate) struct MockState {
    pub height: i64,
    pub time: OffsetDateTime,
    pub height_fails: bool,
    pub total: Option<BigUint>,
    pub escrow: Option<BigUint>,
    pub community_pool: Option<String>,
    pub balances: HashMap<String, BigUint>,
    pub failing_balances: HashSet<String>,
    pub modules: HashMap<String, String>,
    pub accounts: HashMap<String, AccountLock>,
    pub failing_accounts: HashSet<String>,
    pub claims: HashMap<u8, Vec<ClaimRecord>>,
    pub failing_tiers: HashSet<u8>,
    pub delay: Option<Duration>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            height: 12345,
            time: NOW,
            height_fails: false,
            total: Some(amt(1_000_000)),
            escrow: Some(amt(0)),
            community_pool: Some("0".into()),
            balances: HashMap::new(),
            failing_balances: HashSet::new(),
            modules: HashMap::new(),
            accounts: HashMap::new(),
            failing_accounts: HashSet::new(),
            claims: HashMap::new(),
            failing_tiers: HashSet::new(),
            delay: None,
        }
    }
}

pub(crate) struct MockSource {
    state: Mutex<MockState>,
    height_calls: AtomicUsize,
}

impl MockSource {
    pub(crate) fn new(state: MockState) -> Self {
        Self {
            state: Mutex::new(state),
            height_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().unwrap());
    }

    /// Number of computations started (each begins with a height query).
    pub(crate) fn height_calls(&self) -> usize {
        self.height_calls.load(Ordering::SeqCst)
    }

    fn state(&self) -> MockState {
        self.state.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainDataSource for MockSource {
    async fn latest_height_and_time(&self) -> Result<(i64, OffsetDateTime), FetchError> {
        self.height_calls.fetch_add(1, Ordering::SeqCst);
        let s = self.state();
        if let Some(d) = s.delay {
            tokio::time::sleep(d).await;
        }
        if s.height_fails {
            return Err(unavailable("latest block"));
        }
        Ok((s.height, s.time))
    }

    async fn total_supply(&self, _denom: &str) -> Result<BigUint, FetchError> {
        self.state().total.ok_or_else(|| unavailable("supply"))
    }

    async fn total_escrow(&self, _denom: &str) -> Result<BigUint, FetchError> {
        self.state().escrow.ok_or_else(|| unavailable("escrow"))
    }

    async fn community_pool_balance(&self, _denom: &str) -> Result<String, FetchError> {
        self.state()
            .community_pool
            .ok_or_else(|| unavailable("community pool"))
    }

    async fn balance_of(&self, address: &str, _denom: &str) -> Result<BigUint, FetchError> {
        let s = self.state();
        if s.failing_balances.contains(address) {
            return Err(unavailable("balance"));
        }
        Ok(s.balances.get(address).cloned().unwrap_or_default())
    }

    async fn resolve_module_address(&self, name: &str) -> Result<String, FetchError> {
        self.state()
            .modules
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::Api(404, format!("module {name} not found")))
    }

    async fn account_lock_state(&self, address: &str) -> Result<AccountLock, FetchError> {
        let s = self.state();
        if s.failing_accounts.contains(address) {
            return Err(unavailable("account"));
        }
        Ok(s
            .accounts
            .get(address)
            .cloned()
            .unwrap_or_else(|| AccountLock::unlocked("/cosmos.auth.v1beta1.BaseAccount")))
    }

    async fn claimed_accounts(
        &self,
        tier: ClaimTier,
        _denom: &str,
    ) -> Result<Vec<ClaimRecord>, FetchError> {
        let s = self.state();
        if s.failing_tiers.contains(&tier.number()) {
            return Err(unavailable("claim list"));
        }
        Ok(s.claims.get(&tier.number()).cloned().unwrap_or_default())
    }
}
