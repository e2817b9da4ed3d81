//! Log Fetcher
//!
//! Retrieves pool log entries across a block range. Primary path is a direct
//! eth_getLogs query through the alloy provider; when that path fails on
//! transport (but not on rate limits) the unfiltered query falls back to the
//! Etherscan V2 `logs/getLogs` HTTP API with the same address/range filter.
//!
//! Failure semantics matter here: a rate-limited range must surface as
//! `FetchError::RateLimited` so the monitor backs off and retries the same
//! range — returning it as "no events" would silently drop swaps.

use crate::contracts::{UniswapV3Pool, SWAP_EVENT_TOPIC};
use crate::types::RawLogEntry;
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Etherscan V2 unified API base (same host serves all chain ids)
const ETHERSCAN_API_URL: &str = "https://api.etherscan.io/v2/api";

/// Network timeout for one fallback HTTP query
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors crossing the fetch boundary. Everything the monitor sees is one
/// of these — raw transport errors never leak past this module.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Provider asked us to slow down. Retry the same range after backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Timeouts, connection resets, malformed responses.
    #[error("transport error: {0}")]
    Transport(String),
    /// The fallback API answered but reported a failure.
    #[error("log API error: {0}")]
    Api(String),
}

impl FetchError {
    /// Classify a transport-level error by its message text. Providers bury
    /// 429s inside JSON-RPC error strings, so string matching is all we get.
    pub fn from_transport(err: impl std::fmt::Display) -> Self {
        let msg = err.to_string();
        if is_rate_limited(&msg) {
            FetchError::RateLimited(msg)
        } else {
            FetchError::Transport(msg)
        }
    }
}

/// Does this error text indicate a rate limit?
pub fn is_rate_limited(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    msg.contains("429") || lower.contains("too many requests") || lower.contains("rate limit")
}

/// Seam between the monitor and the chain. The production implementation is
/// [`RpcLogSource`]; tests inject a scripted fake.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Current chain head block number.
    async fn head_block(&self) -> Result<u64, FetchError>;

    /// Logs matching the Swap event signature for one pool and range.
    async fn swap_logs(
        &self,
        pool: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLogEntry>, FetchError>;

    /// All logs for one pool and range, regardless of event type. Used to
    /// probe for non-Swap pool activity when the primary query comes back
    /// empty. May route through the fallback HTTP API.
    async fn all_logs(
        &self,
        pool: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLogEntry>, FetchError>;

    /// The pool's (token0, token1) ordering from on-chain view calls.
    async fn pool_tokens(&self, pool: Address) -> Result<(Address, Address), FetchError>;
}

/// Production log source: alloy HTTP provider + optional Etherscan fallback.
pub struct RpcLogSource<P> {
    provider: Arc<P>,
    fallback: Option<EtherscanLogs>,
}

impl<P: Provider + 'static> RpcLogSource<P> {
    pub fn new(provider: Arc<P>, fallback: Option<EtherscanLogs>) -> Self {
        Self { provider, fallback }
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<RawLogEntry>, FetchError> {
        let logs = self
            .provider
            .get_logs(filter)
            .await
            .map_err(FetchError::from_transport)?;

        // Logs without a tx hash / block number are pending — we only poll
        // confirmed ranges, so just drop them.
        Ok(logs
            .iter()
            .filter_map(|log| {
                Some(RawLogEntry {
                    tx_hash: log.transaction_hash?,
                    block_number: log.block_number?,
                    topics: log.topics().to_vec(),
                    data: log.inner.data.data.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl<P: Provider + 'static> LogSource for RpcLogSource<P> {
    async fn head_block(&self) -> Result<u64, FetchError> {
        self.provider
            .get_block_number()
            .await
            .map_err(FetchError::from_transport)
    }

    async fn swap_logs(
        &self,
        pool: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLogEntry>, FetchError> {
        let filter = Filter::new()
            .address(pool)
            .from_block(from_block)
            .to_block(to_block)
            .event_signature(vec![*SWAP_EVENT_TOPIC]);
        self.get_logs(&filter).await
    }

    async fn all_logs(
        &self,
        pool: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLogEntry>, FetchError> {
        let filter = Filter::new()
            .address(pool)
            .from_block(from_block)
            .to_block(to_block);

        match self.get_logs(&filter).await {
            Ok(logs) => Ok(logs),
            // Rate limits are a backoff signal, never a fallback trigger
            Err(FetchError::RateLimited(msg)) => Err(FetchError::RateLimited(msg)),
            Err(e) => match &self.fallback {
                Some(es) => {
                    warn!("RPC get_logs failed ({}), trying Etherscan fallback", e);
                    es.get_logs(pool, from_block, to_block).await
                }
                None => Err(e),
            },
        }
    }

    async fn pool_tokens(&self, pool: Address) -> Result<(Address, Address), FetchError> {
        let contract = UniswapV3Pool::new(pool, self.provider.clone());
        let token0_call = contract.token0();
        let token1_call = contract.token1();
        let (token0, token1) = tokio::join!(token0_call.call(), token1_call.call());
        Ok((
            token0.map_err(FetchError::from_transport)?,
            token1.map_err(FetchError::from_transport)?,
        ))
    }
}

// ── Etherscan fallback ──────────────────────────────────────────────

#[derive(Deserialize)]
struct EtherscanLogResponse {
    status: String,
    message: String,
    result: serde_json::Value,
}

#[derive(Deserialize)]
struct EtherscanLog {
    topics: Vec<String>,
    data: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
}

/// Secondary log-query path through the Etherscan V2 HTTP API.
pub struct EtherscanLogs {
    client: reqwest::Client,
    api_key: String,
    chain_id: u64,
}

impl EtherscanLogs {
    pub fn new(api_key: impl Into<String>, chain_id: u64) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            chain_id,
        }
    }

    pub async fn get_logs(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLogEntry>, FetchError> {
        let resp = self
            .client
            .get(ETHERSCAN_API_URL)
            .query(&[
                ("chainid", self.chain_id.to_string()),
                ("module", "logs".to_string()),
                ("action", "getLogs".to_string()),
                ("fromBlock", from_block.to_string()),
                ("toBlock", to_block.to_string()),
                ("address", format!("{:?}", address)),
                ("apikey", self.api_key.clone()),
            ])
            .timeout(FALLBACK_TIMEOUT)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let body: EtherscanLogResponse =
            resp.json().await.map_err(FetchError::from_transport)?;

        if body.status != "1" {
            // "No records found" is a legitimate empty range, not an error
            if body.message.starts_with("No records") {
                return Ok(Vec::new());
            }
            if is_rate_limited(&body.message) {
                return Err(FetchError::RateLimited(body.message));
            }
            return Err(FetchError::Api(body.message));
        }

        let raw: Vec<EtherscanLog> = serde_json::from_value(body.result)
            .map_err(|e| FetchError::Api(format!("unexpected getLogs result shape: {}", e)))?;

        let mut entries = Vec::with_capacity(raw.len());
        for log in raw {
            match parse_etherscan_log(&log) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    debug!("skipping unparseable fallback log: {}", e);
                }
            }
        }
        Ok(entries)
    }
}

fn parse_etherscan_log(log: &EtherscanLog) -> Result<RawLogEntry, String> {
    let tx_hash: B256 = log
        .transaction_hash
        .parse()
        .map_err(|_| format!("bad tx hash {}", log.transaction_hash))?;
    let block_number = parse_hex_u64(&log.block_number)?;
    let mut topics = Vec::with_capacity(log.topics.len());
    for t in &log.topics {
        topics.push(t.parse::<B256>().map_err(|_| format!("bad topic {}", t))?);
    }
    let data: Bytes = log
        .data
        .parse()
        .map_err(|_| format!("bad data payload ({} chars)", log.data.len()))?;
    Ok(RawLogEntry {
        tx_hash,
        block_number,
        topics,
        data,
    })
}

fn parse_hex_u64(s: &str) -> Result<u64, String> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(trimmed, 16).map_err(|_| format!("bad hex number {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_detection() {
        assert!(is_rate_limited("server returned an error response: 429"));
        assert!(is_rate_limited("Too Many Requests"));
        assert!(is_rate_limited("compute unit rate limit exceeded"));
        assert!(!is_rate_limited("connection reset by peer"));
        assert!(!is_rate_limited("invalid block range"));
    }

    #[test]
    fn test_from_transport_classifies() {
        assert!(matches!(
            FetchError::from_transport("HTTP 429 Too Many Requests"),
            FetchError::RateLimited(_)
        ));
        assert!(matches!(
            FetchError::from_transport("connection timed out"),
            FetchError::Transport(_)
        ));
    }

    #[test]
    fn test_parse_etherscan_log() {
        let log = EtherscanLog {
            topics: vec![
                "0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67".to_string(),
            ],
            data: "0x00000000000000000000000000000000000000000000000000000000000000ff".to_string(),
            block_number: "0x12d687".to_string(),
            transaction_hash:
                "0x1111111111111111111111111111111111111111111111111111111111111111".to_string(),
        };
        let entry = parse_etherscan_log(&log).unwrap();
        assert_eq!(entry.block_number, 0x12d687);
        assert_eq!(entry.topics.len(), 1);
        assert_eq!(entry.data.len(), 32);
    }

    #[test]
    fn test_empty_range_is_not_an_error() {
        let json = r#"{"status":"0","message":"No records found","result":[]}"#;
        let body: EtherscanLogResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.status, "0");
        assert!(body.message.starts_with("No records"));
    }
}
