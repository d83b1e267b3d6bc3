//! Integration tests against a mocked LCD, using saved response fixtures.

use httpmock::prelude::*;
use num_bigint::BigUint;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use supply_snapshot::chain::{decode_account, parse_claim_list, LockKind};
use supply_snapshot::supply::snapshot_etag;
use supply_snapshot::vesting::locked_at;
use supply_snapshot::{
    CacheOptions, ChainDataSource, EndDate, FetchError, LcdClient, LcdConfig, Policy,
    SnapshotCache, SnapshotComputer,
};
use time::macros::datetime;

fn fixture_path(path: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../testdata")
        .join(path)
}

fn load_fixture<T: serde::de::DeserializeOwned>(path: &str) -> T {
    let full = fixture_path(path);
    let s =
        std::fs::read_to_string(&full).unwrap_or_else(|e| panic!("read {}: {}", full.display(), e));
    serde_json::from_str(&s).unwrap_or_else(|e| panic!("parse {}: {}", path, e))
}

fn client(server: &MockServer) -> LcdClient {
    LcdClient::new(LcdConfig {
        base_url: server.base_url(),
        timeout: Duration::from_secs(2),
        max_retries: 2,
        retry_backoff_ms: 1,
    })
    .unwrap()
}

fn account_fixture(address: &str) -> Value {
    let accounts: Value = load_fixture("accounts.json");
    accounts[address].clone()
}

async fn mock_amount(server: &MockServer, path: &str, denom: &str, amount: &str) {
    server
        .mock_async(|when, then| {
            when.method(GET).path(path.to_string());
            then.status(200)
                .json_body(json!({ "amount": { "denom": denom, "amount": amount } }));
        })
        .await;
}

async fn mock_balance(server: &MockServer, address: &str, amount: &str) {
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/cosmos/bank/v1beta1/balances/{address}/by_denom"))
                .query_param("denom", "ulume");
            then.status(200)
                .json_body(json!({ "balance": { "denom": "ulume", "amount": amount } }));
        })
        .await;
}

async fn mock_account(server: &MockServer, address: &str) {
    let account = account_fixture(address);
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(format!("/cosmos/auth/v1beta1/accounts/{address}"));
            then.status(200).json_body(json!({ "account": account }));
        })
        .await;
}

/// Chain state whose non-circulating cohorts add up to 30000 of a 1_000_000 supply:
/// escrow 8000, community pool 5000, distribution module 5000, foundation 7000,
/// bootstrap 3000, tier-1 claim 2000.
async fn mock_chain(server: &MockServer) {
    let block: Value = load_fixture("latest_block.json");
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cosmos/base/tendermint/v1beta1/blocks/latest");
            then.status(200).json_body(block);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cosmos/bank/v1beta1/supply/by_denom")
                .query_param("denom", "ulume");
            then.status(200)
                .json_body(json!({ "amount": { "denom": "ulume", "amount": "1000000" } }));
        })
        .await;
    mock_amount(
        server,
        "/ibc/apps/transfer/v1/denoms/ulume/total_escrow",
        "ulume",
        "8000",
    )
    .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cosmos/distribution/v1beta1/community_pool");
            then.status(200).json_body(json!({ "pool": [
                { "denom": "uatom", "amount": "123.5" },
                { "denom": "ulume", "amount": "5000.750000000000000000" }
            ] }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cosmos/auth/v1beta1/module_accounts/distribution");
            then.status(200).json_body(json!({ "account": {
                "@type": "/cosmos.auth.v1beta1.ModuleAccount",
                "base_account": { "address": "lumera1distribution", "account_number": "2" },
                "name": "distribution",
                "permissions": []
            } }));
        })
        .await;
    mock_balance(server, "lumera1distribution", "5000").await;
    mock_account(server, "lumera1foundation").await;
    mock_account(server, "lumera1bootstrap").await;

    let tier1: Value = load_fixture("claims_tier1.json");
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/LumeraProtocol/lumera/claim/list_claimed/1");
            then.status(200).json_body(tier1);
        })
        .await;
    for tier in 2..=4 {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/LumeraProtocol/lumera/claim/list_claimed/{tier}"));
                then.status(200).json_body(json!({ "claims": [] }));
            })
            .await;
    }
}

#[test]
fn integration_fixture_accounts_decode() {
    let permanent = decode_account(account_fixture("lumera1foundation")).unwrap();
    assert_eq!(permanent.kind, LockKind::Permanent);
    assert_eq!(permanent.end_time, None);

    let periodic = decode_account(account_fixture("lumera1periodic")).unwrap();
    assert_eq!(periodic.kind, LockKind::Periodic);
    assert_eq!(periodic.vesting_periods.len(), 3);
    assert_eq!(periodic.start_time, Some(datetime!(2025-01-01 00:00:00 UTC)));

    let portion = locked_at(&periodic, "ulume", datetime!(2025-06-01 00:00:00 UTC)).unwrap();
    assert_eq!(portion.amount, BigUint::from(900u32));
    assert_eq!(portion.end, EndDate::At(datetime!(2026-06-25 00:00:00 UTC)));

    let portion = locked_at(&periodic, "ulume", datetime!(2025-07-01 00:00:00 UTC)).unwrap();
    assert_eq!(portion.amount, BigUint::from(600u32));
}

#[test]
fn integration_fixture_claim_lists_parse() {
    let claims = std::fs::read_to_string(fixture_path("claims_tier1.json")).unwrap();
    let recs = parse_claim_list(&claims, "ulume").unwrap();
    assert_eq!(recs.len(), 1);
    assert_eq!(recs[0].address, "lumera1claimer");
    assert_eq!(recs[0].claim_time, Some(datetime!(2025-03-01 00:00:00 UTC)));
    assert_eq!(recs[0].amount, Some(BigUint::from(2000u32)));

    let records = std::fs::read_to_string(fixture_path("claims_records.json")).unwrap();
    let recs = parse_claim_list(&records, "ulume").unwrap();
    let addrs: Vec<&str> = recs.iter().map(|r| r.address.as_str()).collect();
    assert_eq!(
        addrs,
        vec!["lumera1recordone", "lumera1recordtwo", "lumera1recordthree"]
    );
    assert!(recs
        .iter()
        .all(|r| r.claim_time == Some(datetime!(2024-12-01 00:00:00 UTC))));
    assert_eq!(recs[1].amount, Some(BigUint::from(55u32)));
}

#[test]
fn integration_fixture_policy_loads() {
    let policy = Policy::load(fixture_path("policy.json")).unwrap();
    assert_eq!(policy.module_accounts, vec!["distribution".to_string()]);
    assert_eq!(policy.disclosed_lockups.bootstraps.len(), 1);
    assert_eq!(policy.disclosed_lockups.bootstraps[0].duration_months, Some(12));
    let fp = policy.fingerprint().unwrap();
    assert_eq!(fp.len(), 64);
    assert_eq!(fp, Policy::load(fixture_path("policy.json")).unwrap().fingerprint().unwrap());
}

#[tokio::test]
async fn integration_lcd_reads() {
    let server = MockServer::start_async().await;
    mock_chain(&server).await;
    let lcd = client(&server);

    let (height, time) = lcd.latest_height_and_time().await.unwrap();
    assert_eq!(height, 12345);
    assert_eq!(time.date(), datetime!(2025-06-01 00:00:00 UTC).date());
    assert_eq!(
        lcd.total_supply("ulume").await.unwrap(),
        BigUint::from(1_000_000u32)
    );
    assert_eq!(lcd.total_escrow("ulume").await.unwrap(), BigUint::from(8000u32));
    assert_eq!(
        lcd.community_pool_balance("ulume").await.unwrap(),
        "5000.750000000000000000"
    );
    assert_eq!(lcd.community_pool_balance("unone").await.unwrap(), "0");
    assert_eq!(
        lcd.resolve_module_address("distribution").await.unwrap(),
        "lumera1distribution"
    );
    assert_eq!(
        lcd.balance_of("lumera1distribution", "ulume").await.unwrap(),
        BigUint::from(5000u32)
    );
    let lock = lcd.account_lock_state("lumera1bootstrap").await.unwrap();
    assert_eq!(lock.kind, LockKind::Delayed);
    assert_eq!(lock.end_time, Some(datetime!(2026-01-01 00:00:00 UTC)));
    assert!(lcd.request_count() >= 8);
}

#[tokio::test]
async fn integration_lcd_retries_server_errors() {
    let server = MockServer::start_async().await;
    let failing = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cosmos/bank/v1beta1/supply/by_denom");
            then.status(503).body("upstream unavailable");
        })
        .await;
    let lcd = client(&server);
    let err = lcd.total_supply("ulume").await.unwrap_err();
    assert!(matches!(err, FetchError::Api(503, _)), "{err}");
    assert_eq!(failing.hits_async().await, 3);
}

#[tokio::test]
async fn integration_lcd_does_not_retry_client_errors() {
    let server = MockServer::start_async().await;
    let missing = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cosmos/auth/v1beta1/module_accounts/nope");
            then.status(404).body(r#"{"code":5,"message":"account not found"}"#);
        })
        .await;
    let lcd = client(&server);
    let err = lcd.resolve_module_address("nope").await.unwrap_err();
    assert!(matches!(err, FetchError::Api(404, _)));
    assert_eq!(missing.hits_async().await, 1);
}

#[tokio::test]
async fn integration_lcd_malformed_amount_is_error() {
    let server = MockServer::start_async().await;
    mock_amount(
        &server,
        "/ibc/apps/transfer/v1/denoms/ulume/total_escrow",
        "ulume",
        "-5",
    )
    .await;
    let lcd = client(&server);
    assert!(matches!(
        lcd.total_escrow("ulume").await,
        Err(FetchError::Normalize(_))
    ));
}

#[tokio::test]
async fn integration_snapshot_end_to_end() {
    let server = MockServer::start_async().await;
    mock_chain(&server).await;
    let policy = Policy::load(fixture_path("policy.json")).unwrap();
    let computer = SnapshotComputer::new(client(&server), policy);

    let snap = computer.compute_snapshot("ulume").await.unwrap();
    assert_eq!(snap.height, 12345);
    assert_eq!(snap.total, "1000000");
    assert_eq!(snap.non_circulating.sum, "30000");
    assert_eq!(snap.circulating, "970000");
    assert_eq!(snap.max.as_deref(), Some("1000000000000000"));
    assert!(snap.skipped.is_empty(), "{:?}", snap.skipped);
    assert_eq!(
        snap.etag,
        snapshot_etag("ulume", "1000000", "970000", "30000", 12345)
    );

    let names: Vec<&str> = snap
        .non_circulating
        .cohorts
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "ibc_escrow",
            "community_pool",
            "module:distribution",
            "foundation_genesis",
            "supernode_bootstraps",
            "claim_delayed",
        ]
    );
    let claims = &snap.non_circulating.cohorts[5];
    let items = claims.items.as_ref().unwrap();
    assert_eq!(items[0].address, "lumera1claimer");
    assert_eq!(items[0].end_date, EndDate::At(datetime!(2025-09-01 00:00:00 UTC)));

    let body = serde_json::to_value(&snap).unwrap();
    assert_eq!(body["non_circulating"]["sum"], "30000");
    assert_eq!(
        body["non_circulating"]["cohorts"][3]["items"][0]["end_date"],
        "forever"
    );
}

#[tokio::test]
async fn integration_snapshot_degrades_on_cohort_failures() {
    let server = MockServer::start_async().await;
    let block: Value = load_fixture("latest_block.json");
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/cosmos/base/tendermint/v1beta1/blocks/latest");
            then.status(200).json_body(block);
        })
        .await;
    mock_amount(&server, "/cosmos/bank/v1beta1/supply/by_denom", "ulume", "500").await;
    let policy = Policy::load(fixture_path("policy.json")).unwrap();
    let computer = SnapshotComputer::new(client(&server), policy);

    let snap = computer.compute_snapshot("ulume").await.unwrap();
    assert_eq!(snap.total, "500");
    assert_eq!(snap.non_circulating.sum, "0");
    assert_eq!(snap.circulating, "500");
    assert!(!snap.skipped.is_empty());
    assert!(snap.skipped.iter().any(|s| s.cohort == "ibc_escrow"));
}

#[tokio::test]
async fn integration_cache_serves_last_snapshot() {
    let server = MockServer::start_async().await;
    mock_chain(&server).await;
    let policy = Policy::load(fixture_path("policy.json")).unwrap();
    let cache = Arc::new(SnapshotCache::new(
        SnapshotComputer::new(client(&server), policy),
        "ulume",
        CacheOptions::default(),
    ));
    assert!(cache.get().0.is_none());

    let built = cache.update("ulume").await.unwrap();
    let (snap, fresh) = cache.get();
    assert!(fresh);
    assert_eq!(snap.unwrap().etag, built.etag);
}
