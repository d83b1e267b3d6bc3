//! Locked portion for each lock discipline. Pure integer arithmetic on atomic units.

use num_bigint::BigUint;
use num_traits::Zero;
use time::OffsetDateTime;

/// Everything locked until `end`; nothing from `end` on.
pub fn delayed_locked(total: &BigUint, now: OffsetDateTime, end: OffsetDateTime) -> BigUint {
    if now < end {
        total.clone()
    } else {
        BigUint::zero()
    }
}

/// Linear unlock over `[start, end)`: `total * (end - now) / (end - start)`, floored.
/// A degenerate interval (`end <= start`) counts as fully vested.
pub fn continuous_locked(
    total: &BigUint,
    now: OffsetDateTime,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> BigUint {
    if end <= start || now >= end {
        return BigUint::zero();
    }
    if now < start {
        return total.clone();
    }
    let remaining = nanos_between(now, end);
    let span = nanos_between(start, end);
    total * remaining / span
}

fn nanos_between(from: OffsetDateTime, to: OffsetDateTime) -> BigUint {
    let nanos = (to - from).whole_nanoseconds();
    BigUint::from(u128::try_from(nanos).unwrap_or(0))
}

/// One step of a periodic schedule: `amount` unlocks at `end`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tranche {
    pub end: OffsetDateTime,
    pub amount: BigUint,
}

/// Sum of tranches whose `end` is strictly after `now`.
pub fn periodic_locked(tranches: &[Tranche], now: OffsetDateTime) -> BigUint {
    tranches
        .iter()
        .filter(|t| now < t.end)
        .fold(BigUint::zero(), |acc, t| acc + &t.amount)
}

/// Fully locked before `cliff`, then linear from `start` to `end`.
pub fn clawback_locked(
    total: &BigUint,
    now: OffsetDateTime,
    start: OffsetDateTime,
    cliff: OffsetDateTime,
    end: OffsetDateTime,
) -> BigUint {
    if now < cliff {
        return total.clone();
    }
    continuous_locked(total, now, start, end)
}

pub fn permanent_locked(total: &BigUint) -> BigUint {
    total.clone()
}
