//! supply_snapshot: circulating, non-circulating and total supply for a Cosmos-SDK token.
//!
//! Computes one consistent breakdown at a single observed height from LCD queries and a
//! policy allowlist of non-circulating cohorts, and serves it through a TTL-bounded cache.
//! Read-only; no keys; no transaction signing.

pub mod cache;
pub mod chain;
pub mod policy;
pub mod supply;
pub mod vesting;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheError, CacheOptions, CachedSnapshot, SnapshotCache};
pub use chain::{ChainDataSource, FetchError, LcdClient, LcdConfig};
pub use policy::{Policy, PolicyError};
pub use supply::{
    CohortEntry, ComputeError, NonCirculatingBreakdown, SkippedEntry, SnapshotComputer,
    SupplySnapshot,
};
pub use vesting::{EndDate, LockedPortion};
