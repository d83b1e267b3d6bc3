//! Decoding of heterogeneous LCD record shapes: vesting accounts and claim lists.

use crate::chain::lcd::FetchError;
use crate::chain::normalize::{parse_amount, parse_epoch_secs, parse_time_rfc3339, NormalizeError};
use crate::chain::source::{AccountLock, ClaimRecord, Coin, LockKind, VestingPeriod};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use time::OffsetDateTime;

#[derive(Deserialize)]
struct RawAccount {
    #[serde(rename = "@type", default)]
    type_url: String,
    #[serde(default)]
    base_vesting_account: Option<RawBaseVesting>,
    #[serde(default, deserialize_with = "string_or_number")]
    start_time: Option<String>,
    #[serde(default)]
    vesting_periods: Option<Vec<RawPeriod>>,
    #[serde(default)]
    lockup_periods: Option<Vec<RawPeriod>>,
}

#[derive(Deserialize)]
struct RawBaseVesting {
    #[serde(default)]
    original_vesting: Option<Vec<Coin>>,
    #[serde(default, deserialize_with = "string_or_number")]
    end_time: Option<String>,
}

#[derive(Deserialize)]
struct RawPeriod {
    #[serde(default, deserialize_with = "string_or_number")]
    length: Option<String>,
    #[serde(default)]
    amount: Option<Vec<Coin>>,
}

/// Proto-JSON renders int64 as strings, but some gateways emit bare numbers.
fn string_or_number<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Epoch seconds (cosmos vesting) or RFC3339 (protobuf Timestamp on some forks).
fn parse_account_time(s: Option<&str>) -> Result<Option<OffsetDateTime>, NormalizeError> {
    let Some(s) = s.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match parse_epoch_secs(s) {
        Ok(t) => Ok(t),
        Err(_) => parse_time_rfc3339(s).map(Some),
    }
}

fn convert_periods(raw: Option<Vec<RawPeriod>>) -> Result<Vec<VestingPeriod>, NormalizeError> {
    raw.unwrap_or_default()
        .into_iter()
        .map(|p| {
            let length = p.length.unwrap_or_default();
            let length_secs = length
                .trim()
                .parse::<i64>()
                .map_err(|_| NormalizeError::InvalidTime(format!("period length {length:?}")))?;
            Ok(VestingPeriod {
                length_secs,
                amount: p.amount.unwrap_or_default(),
            })
        })
        .collect()
}

/// Decode the `account` object of `/cosmos/auth/v1beta1/accounts/{address}`.
pub fn decode_account(account: Value) -> Result<AccountLock, FetchError> {
    let raw: RawAccount = serde_json::from_value(account)?;
    let kind = LockKind::from_type_url(&raw.type_url);
    let (original_vesting, end_time) = match raw.base_vesting_account {
        Some(b) => (b.original_vesting.unwrap_or_default(), b.end_time),
        None => (vec![], None),
    };
    Ok(AccountLock {
        kind,
        type_url: raw.type_url,
        original_vesting,
        start_time: parse_account_time(raw.start_time.as_deref())?,
        end_time: parse_account_time(end_time.as_deref())?,
        vesting_periods: convert_periods(raw.vesting_periods)?,
        lockup_periods: convert_periods(raw.lockup_periods)?,
    })
}

const LIST_ADDRESS_KEYS: &[&str] = &["address", "addr", "destAddress"];
const LIST_TIME_KEYS: &[&str] = &["claim_time", "time"];

fn claim_time(v: &Value) -> Option<OffsetDateTime> {
    match v {
        Value::String(s) => parse_time_rfc3339(s)
            .ok()
            .or_else(|| parse_epoch_secs(s).ok().flatten()),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .filter(|secs| *secs > 0)
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok()),
        _ => None,
    }
}

fn balance_for(item: &Value, denom: &str) -> Option<num_bigint::BigUint> {
    item.get("balance")?
        .as_array()?
        .iter()
        .find(|c| c.get("denom").and_then(Value::as_str) == Some(denom))
        .and_then(|c| c.get("amount").and_then(Value::as_str))
        .filter(|a| !a.is_empty())
        .and_then(|a| parse_amount(a).ok())
}

fn claim_item(
    item: &Value,
    address_keys: &[&str],
    time_keys: &[&str],
    denom: &str,
) -> Option<ClaimRecord> {
    let address = address_keys
        .iter()
        .find_map(|k| item.get(*k).and_then(Value::as_str))
        .filter(|a| !a.is_empty())?;
    let claim_time = time_keys.iter().find_map(|k| item.get(*k)).and_then(claim_time);
    Some(ClaimRecord {
        address: address.to_string(),
        claim_time,
        amount: balance_for(item, denom),
    })
}

/// Parse a `list_claimed` response. Known shapes:
///
/// - `{"claims": [{"destAddress", "claimTime", "balance": [coin]}]}`
/// - `{"records" | "claimed" | "list": [{"address" | "addr" | "destAddress",
///   "claim_time" | "time", "balance"?}]}` with RFC3339, epoch-second string or number times.
///
/// Anything else yields an empty list.
pub fn parse_claim_list(body: &str, denom: &str) -> Result<Vec<ClaimRecord>, serde_json::Error> {
    let raw: Value = serde_json::from_str(body)?;
    let Some(obj) = raw.as_object() else {
        return Ok(vec![]);
    };
    if let Some(claims) = obj.get("claims").and_then(Value::as_array) {
        return Ok(claims
            .iter()
            .filter_map(|c| claim_item(c, &["destAddress"], &["claimTime"], denom))
            .collect());
    }
    let list = ["records", "claimed", "list"]
        .iter()
        .find_map(|k| obj.get(*k))
        .and_then(Value::as_array);
    Ok(list
        .map(|items| {
            items
                .iter()
                .filter_map(|it| claim_item(it, LIST_ADDRESS_KEYS, LIST_TIME_KEYS, denom))
                .collect()
        })
        .unwrap_or_default())
}
