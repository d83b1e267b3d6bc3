//! SHA-256 fingerprints: snapshot ETag and canonical JSON hashing.

use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// ETag over the externally visible figures. Fields are NUL-separated so that
/// adjacent values cannot run into each other.
pub fn snapshot_etag(
    denom: &str,
    total: &str,
    circulating: &str,
    non_circulating: &str,
    height: i64,
) -> String {
    let mut hasher = Sha256::new();
    for part in [denom, total, circulating, non_circulating] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(height.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Normalize JSON for hashing: sort keys and no whitespace.
pub fn canonical_json(value: &serde_json::Value) -> Result<String, serde_json::Error> {
    serde_json::to_string(&sort_json_keys(value))
}

fn sort_json_keys(v: &serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(m) => {
            let sorted: std::collections::BTreeMap<&String, serde_json::Value> =
                m.iter().map(|(k, v)| (k, sort_json_keys(v))).collect();
            serde_json::Value::Object(
                sorted.into_iter().map(|(k, v)| (k.clone(), v)).collect(),
            )
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_json_keys).collect())
        }
        other => other.clone(),
    }
}
