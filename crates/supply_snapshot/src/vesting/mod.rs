//! Vesting-lock arithmetic and per-account lock evaluation.

mod engine;
mod schedule;

pub use engine::{
    clawback_locked, continuous_locked, delayed_locked, periodic_locked, permanent_locked, Tranche,
};
pub use schedule::{locked_at, EndDate, LockError, LockedPortion};
