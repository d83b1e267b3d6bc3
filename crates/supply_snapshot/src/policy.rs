//! Non-circulating policy: which accounts and cohorts are excluded from circulation.
//!
//! Only cohorts named here are non-circulating (plus IBC escrow and the community pool,
//! which are always counted). Ordinary user vesting accounts stay circulating.
//!
//! Load from: `--policy` / env `SUPPLY_POLICY_PATH`, default `./policy.json`.

use crate::chain::parse_amount;
use crate::supply::{canonical_json, sha256_hex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use time::OffsetDateTime;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid policy: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Protocol maximum supply in atomic units, reported as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_supply: Option<String>,

    /// Module account names (e.g. `distribution`), resolved to addresses on-chain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub module_accounts: Vec<String>,

    #[serde(default)]
    pub disclosed_lockups: DisclosedLockups,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedLockups {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foundation_genesis: Vec<FoundationEntry>,

    #[serde(
        default,
        rename = "supernode_bootstraps",
        alias = "bootstraps",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub bootstraps: Vec<BootstrapEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundationEntry {
    pub name: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custody: Option<String>,
}

/// Bootstrap lock. On-chain vesting wins; the hints apply only when the account
/// shows nothing locked: `permanent`, then `duration_months` from `start_time`
/// (default: the observed block time), then an explicit `end_time`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub address: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub permanent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_months: Option<u32>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<OffsetDateTime>,
}

impl Policy {
    /// Read, parse and validate a policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PolicyError> {
        let policy: Policy = serde_json::from_str(content)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if let Some(max) = &self.max_supply {
            parse_amount(max).map_err(|_| {
                PolicyError::Invalid(format!("max_supply {max:?} is not an integer"))
            })?;
        }
        for (i, name) in self.module_accounts.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(PolicyError::Invalid(format!("module_accounts[{i}] is empty")));
            }
        }
        for (i, e) in self.disclosed_lockups.foundation_genesis.iter().enumerate() {
            if e.name.is_empty() {
                return Err(PolicyError::Invalid(format!(
                    "disclosed_lockups.foundation_genesis[{i}] missing name"
                )));
            }
            if e.address.is_empty() {
                return Err(PolicyError::Invalid(format!(
                    "disclosed_lockups.foundation_genesis[{i}] missing address"
                )));
            }
        }
        for (i, e) in self.disclosed_lockups.bootstraps.iter().enumerate() {
            if e.address.is_empty() {
                return Err(PolicyError::Invalid(format!(
                    "disclosed_lockups.supernode_bootstraps[{i}] missing address"
                )));
            }
            if e.duration_months == Some(0) {
                return Err(PolicyError::Invalid(format!(
                    "disclosed_lockups.supernode_bootstraps[{i}] duration_months must be positive"
                )));
            }
        }
        Ok(())
    }

    /// SHA-256 over the key-sorted compact JSON rendering; stable across formatting
    /// and key order of the source file.
    pub fn fingerprint(&self) -> Result<String, PolicyError> {
        let value = serde_json::to_value(self)?;
        Ok(sha256_hex(canonical_json(&value)?.as_bytes()))
    }

    pub fn is_empty(&self) -> bool {
        self.module_accounts.is_empty()
            && self.disclosed_lockups.foundation_genesis.is_empty()
            && self.disclosed_lockups.bootstraps.is_empty()
    }
}
