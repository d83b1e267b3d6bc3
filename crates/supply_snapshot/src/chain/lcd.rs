//! Cosmos-SDK LCD (REST gateway) client with bounded timeouts and retries.

use crate::chain::normalize::{parse_amount, parse_time_rfc3339, NormalizeError};
use crate::chain::records::{decode_account, parse_claim_list};
use crate::chain::source::{AccountLock, ChainDataSource, ClaimRecord, ClaimTier};
use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

const DEFAULT_LCD_URL: &str = "http://localhost:1317";
const TIMEOUT_SECS: u64 = 5;
const MAX_RETRIES: u32 = 2;
const RETRY_BACKOFF_MS: u64 = 250;
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// `base_ms * 2^attempt`, capped at `MAX_BACKOFF`.
fn backoff(base_ms: u64, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

#[derive(Clone, Debug)]
pub struct LcdConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LcdConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LCD_URL.to_string(),
            timeout: Duration::from_secs(TIMEOUT_SECS),
            max_retries: MAX_RETRIES,
            retry_backoff_ms: RETRY_BACKOFF_MS,
        }
    }
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid base url: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("normalize: {0}")]
    Normalize(#[from] NormalizeError),
    #[error("api error: status {0} body {1}")]
    Api(u16, String),
    #[error("missing field: {0}")]
    Missing(&'static str),
}

#[derive(Deserialize)]
struct LatestBlock {
    block: Block,
}

#[derive(Deserialize)]
struct Block {
    header: Header,
}

#[derive(Deserialize)]
struct Header {
    height: String,
    time: String,
}

#[derive(Deserialize)]
struct AmountEnvelope {
    amount: Option<AmountInner>,
}

#[derive(Deserialize)]
struct AmountInner {
    amount: String,
}

#[derive(Deserialize)]
struct BalanceEnvelope {
    balance: Option<AmountInner>,
}

#[derive(Deserialize)]
struct CommunityPool {
    #[serde(default)]
    pool: Vec<DecCoin>,
}

#[derive(Deserialize)]
struct DecCoin {
    denom: String,
    amount: String,
}

#[derive(Deserialize)]
struct ModuleAccountEnvelope {
    account: ModuleAccount,
}

#[derive(Deserialize)]
struct ModuleAccount {
    base_account: Option<BaseAccount>,
}

#[derive(Deserialize)]
struct BaseAccount {
    address: String,
}

#[derive(Deserialize)]
struct AccountEnvelope {
    account: serde_json::Value,
}

/// LCD client. Each request is bounded by `LcdConfig::timeout`; transport errors,
/// 5xx and 429 responses are retried with exponential backoff.
pub struct LcdClient {
    config: LcdConfig,
    base_url: String,
    client: reqwest::Client,
    request_count: AtomicU64,
}

impl LcdClient {
    pub fn new(config: LcdConfig) -> Result<Self, FetchError> {
        let parsed = url::Url::parse(&config.base_url)?;
        let base_url = parsed.as_str().trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            config,
            base_url,
            client,
            request_count: AtomicU64::new(0),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_text(&self, path: &str) -> Result<String, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            let err = match self.client.get(&url).send().await {
                Ok(r) => {
                    let status = r.status();
                    self.request_count.fetch_add(1, Ordering::Relaxed);
                    let body = r.text().await.unwrap_or_default();
                    if status.is_success() {
                        debug!(%url, "lcd ok");
                        return Ok(body);
                    }
                    let retryable =
                        status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
                    let err = FetchError::Api(status.as_u16(), body);
                    if !retryable {
                        return Err(err);
                    }
                    err
                }
                Err(e) => FetchError::Request(e),
            };
            if attempt >= self.config.max_retries {
                return Err(err);
            }
            let delay = backoff(self.config.retry_backoff_ms, attempt);
            warn!(%url, attempt, ms = delay.as_millis() as u64, error = %err, "retry after error");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let body = self.get_text(path).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ChainDataSource for LcdClient {
    async fn latest_height_and_time(&self) -> Result<(i64, OffsetDateTime), FetchError> {
        let out: LatestBlock = self
            .get_json("/cosmos/base/tendermint/v1beta1/blocks/latest")
            .await?;
        let height = out
            .block
            .header
            .height
            .trim()
            .parse::<i64>()
            .map_err(|_| NormalizeError::InvalidAmount(out.block.header.height.clone()))?;
        let time = parse_time_rfc3339(&out.block.header.time)?;
        Ok((height, time))
    }

    async fn total_supply(&self, denom: &str) -> Result<BigUint, FetchError> {
        let path = format!(
            "/cosmos/bank/v1beta1/supply/by_denom?denom={}",
            urlencoding::encode(denom)
        );
        let out: AmountEnvelope = self.get_json(&path).await?;
        let amount = out.amount.ok_or(FetchError::Missing("amount"))?;
        Ok(parse_amount(&amount.amount)?)
    }

    async fn total_escrow(&self, denom: &str) -> Result<BigUint, FetchError> {
        let path = format!(
            "/ibc/apps/transfer/v1/denoms/{}/total_escrow",
            urlencoding::encode(denom)
        );
        let out: AmountEnvelope = self.get_json(&path).await?;
        let amount = out.amount.ok_or(FetchError::Missing("amount"))?;
        Ok(parse_amount(&amount.amount)?)
    }

    async fn community_pool_balance(&self, denom: &str) -> Result<String, FetchError> {
        let out: CommunityPool = self
            .get_json("/cosmos/distribution/v1beta1/community_pool")
            .await?;
        Ok(out
            .pool
            .into_iter()
            .find(|c| c.denom == denom)
            .map(|c| c.amount)
            .unwrap_or_else(|| "0".to_string()))
    }

    async fn balance_of(&self, address: &str, denom: &str) -> Result<BigUint, FetchError> {
        let path = format!(
            "/cosmos/bank/v1beta1/balances/{}/by_denom?denom={}",
            urlencoding::encode(address),
            urlencoding::encode(denom)
        );
        let out: BalanceEnvelope = self.get_json(&path).await?;
        let balance = out.balance.ok_or(FetchError::Missing("balance"))?;
        Ok(parse_amount(&balance.amount)?)
    }

    async fn resolve_module_address(&self, name: &str) -> Result<String, FetchError> {
        let path = format!(
            "/cosmos/auth/v1beta1/module_accounts/{}",
            urlencoding::encode(name)
        );
        let out: ModuleAccountEnvelope = self.get_json(&path).await?;
        out.account
            .base_account
            .map(|b| b.address)
            .filter(|a| !a.is_empty())
            .ok_or(FetchError::Missing("account.base_account.address"))
    }

    async fn account_lock_state(&self, address: &str) -> Result<AccountLock, FetchError> {
        let path = format!("/cosmos/auth/v1beta1/accounts/{}", urlencoding::encode(address));
        let out: AccountEnvelope = self.get_json(&path).await?;
        decode_account(out.account)
    }

    async fn claimed_accounts(
        &self,
        tier: ClaimTier,
        denom: &str,
    ) -> Result<Vec<ClaimRecord>, FetchError> {
        let path = format!("/LumeraProtocol/lumera/claim/list_claimed/{}", tier.number());
        let body = self.get_text(&path).await?;
        let records = parse_claim_list(&body, denom)?;
        debug!(tier = tier.number(), count = records.len(), "claimed accounts");
        Ok(records)
    }
}
