//! Normalization of LCD amounts and timestamps.

use num_bigint::BigUint;
use num_traits::Zero;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),
    #[error("invalid decimal: {0:?}")]
    InvalidDecimal(String),
    #[error("invalid time: {0}")]
    InvalidTime(String),
    #[error("time out of range")]
    TimeOutOfRange,
}

/// Parse a non-negative base-10 integer amount in atomic units.
pub fn parse_amount(s: &str) -> Result<BigUint, NormalizeError> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NormalizeError::InvalidAmount(s.to_string()));
    }
    BigUint::parse_bytes(s.as_bytes(), 10)
        .ok_or_else(|| NormalizeError::InvalidAmount(s.to_string()))
}

/// Floor-truncate a non-negative decimal string (e.g. a `DecCoin` amount) to its integer part.
pub fn truncate_decimal(s: &str) -> Result<BigUint, NormalizeError> {
    let s = s.trim();
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    if s.is_empty() || !digits(int_part) || !digits(frac_part) {
        return Err(NormalizeError::InvalidDecimal(s.to_string()));
    }
    if int_part.is_empty() {
        return Ok(BigUint::zero());
    }
    parse_amount(int_part).map_err(|_| NormalizeError::InvalidDecimal(s.to_string()))
}

/// Parse RFC3339 timestamp.
pub fn parse_time_rfc3339(s: &str) -> Result<OffsetDateTime, NormalizeError> {
    OffsetDateTime::parse(s.trim(), &Rfc3339)
        .map_err(|e| NormalizeError::InvalidTime(e.to_string()))
}

/// Parse a Unix-seconds string as used by vesting accounts and claim records.
/// Empty and `"0"` mean "not set".
pub fn parse_epoch_secs(s: &str) -> Result<Option<OffsetDateTime>, NormalizeError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let secs = s
        .parse::<i64>()
        .map_err(|_| NormalizeError::InvalidTime(s.to_string()))?;
    if secs == 0 {
        return Ok(None);
    }
    OffsetDateTime::from_unix_timestamp(secs)
        .map(Some)
        .map_err(|e| NormalizeError::InvalidTime(e.to_string()))
}

/// Add calendar months keeping the time of day. A day past the end of the target
/// month overflows into the next one (Jan 31 + 1 month = Mar 3 in a common year).
pub fn add_months(t: OffsetDateTime, months: u32) -> Result<OffsetDateTime, NormalizeError> {
    let date = t.date();
    let index = i64::from(date.year()) * 12
        + i64::from(u8::from(date.month()) - 1)
        + i64::from(months);
    let year = i32::try_from(index.div_euclid(12)).map_err(|_| NormalizeError::TimeOutOfRange)?;
    let month = Month::January.nth_next(index.rem_euclid(12) as u8);
    let first =
        Date::from_calendar_date(year, month, 1).map_err(|_| NormalizeError::TimeOutOfRange)?;
    let shifted = first
        .checked_add(Duration::days(i64::from(date.day()) - 1))
        .ok_or(NormalizeError::TimeOutOfRange)?;
    Ok(t.replace_date(shifted))
}

/// RFC3339 in UTC at whole-second precision.
pub fn format_rfc3339(t: OffsetDateTime) -> String {
    let utc = t.to_offset(UtcOffset::UTC);
    let whole = utc - Duration::nanoseconds(i64::from(utc.nanosecond()));
    whole.format(&Rfc3339).unwrap_or_default()
}
