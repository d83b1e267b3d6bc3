//! Evaluate an account's on-chain lock metadata at a given instant.

use crate::chain::normalize::{format_rfc3339, parse_amount, parse_time_rfc3339, NormalizeError};
use crate::chain::{AccountLock, LockKind, VestingPeriod};
use crate::vesting::engine::{
    clawback_locked, continuous_locked, delayed_locked, periodic_locked, permanent_locked, Tranche,
};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::warn;

pub const FOREVER: &str = "forever";

/// When a locked amount becomes transferable. Serialized as an RFC3339 string,
/// `"forever"`, or omitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EndDate {
    #[default]
    None,
    At(OffsetDateTime),
    Forever,
}

impl EndDate {
    pub fn is_none(&self) -> bool {
        matches!(self, EndDate::None)
    }
}

impl std::fmt::Display for EndDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndDate::None => Ok(()),
            EndDate::At(t) => f.write_str(&format_rfc3339(*t)),
            EndDate::Forever => f.write_str(FOREVER),
        }
    }
}

impl Serialize for EndDate {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EndDate {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        match s.as_str() {
            "" => Ok(EndDate::None),
            FOREVER => Ok(EndDate::Forever),
            other => parse_time_rfc3339(other)
                .map(EndDate::At)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockedPortion {
    pub amount: BigUint,
    pub end: EndDate,
}

impl LockedPortion {
    pub fn nothing() -> Self {
        Self {
            amount: BigUint::zero(),
            end: EndDate::None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("{kind:?} account without {field}")]
    Incomplete { kind: LockKind, field: &'static str },
    #[error("schedule time out of range")]
    OutOfRange,
    #[error(transparent)]
    Amount(#[from] NormalizeError),
}

fn required(
    value: Option<OffsetDateTime>,
    kind: LockKind,
    field: &'static str,
) -> Result<OffsetDateTime, LockError> {
    value.ok_or(LockError::Incomplete { kind, field })
}

fn amount_for(coins: &[crate::chain::Coin], denom: &str) -> Result<BigUint, NormalizeError> {
    coins
        .iter()
        .find(|c| c.denom == denom)
        .map_or_else(|| Ok(BigUint::zero()), |c| parse_amount(&c.amount))
}

/// Cumulative tranches: period `i` ends at `start + sum(length[0..=i])`.
fn tranches(
    start: OffsetDateTime,
    periods: &[VestingPeriod],
    denom: &str,
) -> Result<Vec<Tranche>, LockError> {
    let mut elapsed: i64 = 0;
    periods
        .iter()
        .map(|p| -> Result<Tranche, LockError> {
            elapsed = elapsed.saturating_add(p.length_secs);
            let end = start
                .checked_add(Duration::seconds(elapsed))
                .ok_or(LockError::OutOfRange)?;
            Ok(Tranche {
                end,
                amount: amount_for(&p.amount, denom)?,
            })
        })
        .collect()
}

fn periodic(
    lock: &AccountLock,
    denom: &str,
    now: OffsetDateTime,
) -> Result<LockedPortion, LockError> {
    let start = required(lock.start_time, lock.kind, "start_time")?;
    let steps = tranches(start, &lock.vesting_periods, denom)?;
    let end = steps.last().map_or(EndDate::None, |t| EndDate::At(t.end));
    Ok(LockedPortion {
        amount: periodic_locked(&steps, now),
        end,
    })
}

/// Locked amount of `denom` held by `lock` at `now`, with its unlock date.
pub fn locked_at(
    lock: &AccountLock,
    denom: &str,
    now: OffsetDateTime,
) -> Result<LockedPortion, LockError> {
    let original = match lock.original_for(denom) {
        Some(a) => parse_amount(a)?,
        None => BigUint::zero(),
    };
    if original.is_zero() {
        return Ok(LockedPortion::nothing());
    }
    let kind = lock.kind;
    match kind {
        LockKind::Permanent => Ok(LockedPortion {
            amount: permanent_locked(&original),
            end: EndDate::Forever,
        }),
        LockKind::Delayed => {
            let end = required(lock.end_time, kind, "end_time")?;
            Ok(LockedPortion {
                amount: delayed_locked(&original, now, end),
                end: EndDate::At(end),
            })
        }
        LockKind::Continuous => {
            let start = required(lock.start_time, kind, "start_time")?;
            let end = required(lock.end_time, kind, "end_time")?;
            Ok(LockedPortion {
                amount: continuous_locked(&original, now, start, end),
                end: EndDate::At(end),
            })
        }
        LockKind::Periodic => periodic(lock, denom, now),
        LockKind::Clawback if !lock.vesting_periods.is_empty() => periodic(lock, denom, now),
        LockKind::Clawback => {
            let start = required(lock.start_time, kind, "start_time")?;
            let end = required(lock.end_time, kind, "end_time")?;
            let lockup: i64 = lock
                .lockup_periods
                .iter()
                .fold(0i64, |acc, p| acc.saturating_add(p.length_secs));
            let cliff = start
                .checked_add(Duration::seconds(lockup))
                .ok_or(LockError::OutOfRange)?;
            Ok(LockedPortion {
                amount: clawback_locked(&original, now, start, cliff, end),
                end: EndDate::At(end),
            })
        }
        LockKind::Unknown => {
            warn!(
                type_url = %lock.type_url,
                "unrecognized lock type with original vesting; treating as unlocked"
            );
            Ok(LockedPortion::nothing())
        }
    }
}
