//! Single-snapshot cache with TTL freshness and a periodic refresher.
//!
//! Built once at startup and shared as `Arc<SnapshotCache<_>>` for the life of the
//! process. Readers never wait on remote queries: the write lock is taken only to
//! swap in a finished snapshot.

use crate::chain::ChainDataSource;
use crate::supply::{ComputeError, SnapshotComputer, SupplySnapshot};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache holds {configured} snapshots, not {requested}")]
    Denom {
        configured: String,
        requested: String,
    },
    #[error(transparent)]
    Compute(#[from] ComputeError),
}

#[derive(Clone, Debug)]
pub struct CacheOptions {
    pub ttl: Duration,
    /// Serialize concurrent `update` calls; a caller that waited behind another
    /// build returns that build's result instead of recomputing.
    pub single_flight: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            single_flight: false,
        }
    }
}

/// A stored snapshot and the instant it was stored.
#[derive(Clone, Debug)]
pub struct CachedSnapshot {
    pub snapshot: Arc<SupplySnapshot>,
    pub stored_at: Instant,
}

/// Snapshot cache for one denomination.
pub struct SnapshotCache<S> {
    computer: SnapshotComputer<S>,
    denom: String,
    ttl: Duration,
    single_flight: bool,
    slot: RwLock<Option<CachedSnapshot>>,
    build_gate: tokio::sync::Mutex<()>,
}

impl<S: ChainDataSource + 'static> SnapshotCache<S> {
    pub fn new(
        computer: SnapshotComputer<S>,
        denom: impl Into<String>,
        options: CacheOptions,
    ) -> Self {
        let ttl = if options.ttl.is_zero() {
            DEFAULT_TTL
        } else {
            options.ttl
        };
        Self {
            computer,
            denom: denom.into(),
            ttl,
            single_flight: options.single_flight,
            slot: RwLock::new(None),
            build_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn denom(&self) -> &str {
        &self.denom
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn computer(&self) -> &SnapshotComputer<S> {
        &self.computer
    }

    fn current(&self) -> Option<CachedSnapshot> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The stored snapshot, if any, and whether it is within the TTL. Stale
    /// snapshots are still returned.
    pub fn get(&self) -> (Option<Arc<SupplySnapshot>>, bool) {
        match self.current() {
            Some(c) => {
                let fresh = c.stored_at.elapsed() <= self.ttl;
                (Some(c.snapshot), fresh)
            }
            None => (None, false),
        }
    }

    /// Recompute and replace the stored snapshot. On error the previous snapshot
    /// stays in place. `denom` must be the configured denomination.
    pub async fn update(&self, denom: &str) -> Result<Arc<SupplySnapshot>, CacheError> {
        if denom != self.denom {
            return Err(CacheError::Denom {
                configured: self.denom.clone(),
                requested: denom.to_string(),
            });
        }
        let _gate = if self.single_flight {
            let requested_at = Instant::now();
            let guard = self.build_gate.lock().await;
            if let Some(c) = self.current() {
                if c.stored_at > requested_at {
                    debug!(denom, height = c.snapshot.height, "reusing concurrent build");
                    return Ok(c.snapshot);
                }
            }
            Some(guard)
        } else {
            None
        };

        let snapshot = Arc::new(self.computer.compute_snapshot(denom).await?);
        let cached = CachedSnapshot {
            snapshot: Arc::clone(&snapshot),
            stored_at: Instant::now(),
        };
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(cached);
        Ok(snapshot)
    }

    /// Refresh once per TTL, forever. Failures are logged and the loop continues.
    pub async fn run_refresher(self: Arc<Self>) {
        let denom = self.denom.as_str();
        info!(denom, ttl_secs = self.ttl.as_secs(), "snapshot refresher started");
        loop {
            match self.update(denom).await {
                Ok(s) => debug!(denom, height = s.height, etag = %s.etag, "snapshot refreshed"),
                Err(e) => warn!(denom, error = %e, "snapshot refresh failed"),
            }
            tokio::time::sleep(self.ttl).await;
        }
    }

    pub fn spawn_refresher(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_refresher())
    }
}
