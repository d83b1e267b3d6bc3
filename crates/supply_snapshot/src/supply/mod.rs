//! Snapshot data model, fingerprinting, and the snapshot computer.

mod compute;
mod fingerprint;
mod types;

pub use compute::{ComputeError, SnapshotComputer};
pub use fingerprint::{canonical_json, sha256_hex, snapshot_etag};
pub use types::{AddressItem, CohortEntry, NonCirculatingBreakdown, SkippedEntry, SupplySnapshot};
