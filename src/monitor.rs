//! Chain Event Monitor
//!
//! One monitor task per tracked token. Each iteration reads the chain head,
//! catches the block cursor up in bounded chunks, classifies whatever swaps
//! it finds, and feeds priced swaps into the round book. Classified swaps
//! and round resolutions go out over an mpsc channel as [`SwapNotice`]s for
//! whatever frontend is listening.
//!
//! Cursor discipline: the cursor only advances past a chunk once that chunk
//! was fetched successfully. A rate-limited chunk leaves the cursor at the
//! last completed boundary so the same range is retried after backoff —
//! swaps are never silently skipped. Falling too far behind the head is the
//! one exception: past the skip threshold we jump to near-head and accept
//! the gap rather than burn provider credits on stale blocks.

use crate::classifier::classify;
use crate::config::{TrackedToken, CATCHUP_MARGIN};
use crate::contracts::event_name;
use crate::fetcher::{FetchError, LogSource};
use crate::oracle::PriceOracle;
use crate::rounds::{RoundBook, RoundResolution};
use crate::types::{ClassifiedSwap, PoolSide, RawLogEntry, SwapDirection};
use alloy::primitives::B256;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Block lookback for on-demand recent-swap queries
const RECENT_LOOKBACK_BLOCKS: u64 = 5_000;

/// Dedup-set size cap; old hashes are forgotten wholesale past this
const PROCESSED_CAP: usize = 10_000;

/// Event pushed to the frontend channel.
#[derive(Debug, Clone)]
pub enum SwapNotice {
    Swap {
        token_key: String,
        symbol: String,
        swap: ClassifiedSwap,
        tx_url: String,
    },
    RoundResolved {
        token_key: String,
        symbol: String,
        resolution: RoundResolution,
    },
}

/// Per-network polling knobs, bundled so tests can tighten them.
#[derive(Debug, Clone, Copy)]
pub struct PollTuning {
    pub poll_interval: Duration,
    pub max_blocks_per_call: u64,
    pub skip_threshold: u64,
    pub catchup_margin: u64,
    pub rate_limit_backoff: Duration,
    pub error_backoff: Duration,
}

impl PollTuning {
    pub fn for_network(network: crate::config::Network) -> Self {
        Self {
            poll_interval: network.poll_interval(),
            max_blocks_per_call: network.max_blocks_per_call(),
            skip_threshold: network.skip_threshold(),
            catchup_margin: CATCHUP_MARGIN,
            rate_limit_backoff: Duration::from_secs(30),
            error_backoff: Duration::from_secs(10),
        }
    }
}

/// Poll loop state for one token's pool.
pub struct ChainMonitor<S: LogSource> {
    token: TrackedToken,
    source: Arc<S>,
    oracle: Arc<PriceOracle>,
    rounds: Arc<RoundBook>,
    notices: mpsc::Sender<SwapNotice>,
    running: Arc<AtomicBool>,
    tuning: PollTuning,
    /// Tx hashes already dispatched, so overlapping ranges stay idempotent
    processed: HashSet<B256>,
    /// Last block fully processed
    cursor: u64,
    /// Which pool leg is the tracked token. None until resolved on-chain.
    side: Option<PoolSide>,
}

impl<S: LogSource> ChainMonitor<S> {
    pub fn new(
        token: TrackedToken,
        source: Arc<S>,
        oracle: Arc<PriceOracle>,
        rounds: Arc<RoundBook>,
        notices: mpsc::Sender<SwapNotice>,
        running: Arc<AtomicBool>,
        tuning: PollTuning,
    ) -> Self {
        Self {
            token,
            source,
            oracle,
            rounds,
            notices,
            running,
            tuning,
            processed: HashSet::new(),
            cursor: 0,
            side: None,
        }
    }

    /// Poll until the running flag drops. Never returns early on chain
    /// errors; those back off and retry.
    pub async fn run(mut self) {
        info!(
            token = %self.token.key,
            pool = %self.token.pool_address,
            network = %self.token.network,
            "monitor starting"
        );

        self.resolve_pool_side().await;

        // Start just behind the head; history before launch is not replayed
        while self.running.load(Ordering::SeqCst) {
            match self.source.head_block().await {
                Ok(head) => {
                    self.cursor = head.saturating_sub(self.tuning.catchup_margin);
                    break;
                }
                Err(e) => {
                    warn!(token = %self.token.key, "initial head query failed: {}", e);
                    sleep(self.tuning.error_backoff).await;
                }
            }
        }

        while self.running.load(Ordering::SeqCst) {
            let head = match self.source.head_block().await {
                Ok(head) => head,
                Err(e) => {
                    warn!(token = %self.token.key, "head query failed: {}", e);
                    sleep(self.backoff_for(&e)).await;
                    continue;
                }
            };

            if let Err(e) = self.catch_up(head).await {
                warn!(
                    token = %self.token.key,
                    cursor = self.cursor,
                    "catch-up interrupted: {}",
                    e
                );
                sleep(self.backoff_for(&e)).await;
                continue;
            }

            sleep(self.tuning.poll_interval).await;
        }

        info!(token = %self.token.key, "monitor stopped");
    }

    fn backoff_for(&self, err: &FetchError) -> Duration {
        match err {
            FetchError::RateLimited(_) => self.tuning.rate_limit_backoff,
            _ => self.tuning.error_backoff,
        }
    }

    /// Figure out which pool leg the tracked token is. Transient chain
    /// errors retry; a token that matches neither leg is logged once and
    /// left unresolved (swaps then classify as UNKNOWN, display-only).
    async fn resolve_pool_side(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            match self.source.pool_tokens(self.token.pool_address).await {
                Ok((token0, token1)) => {
                    self.side = if token0 == self.token.token_address {
                        Some(PoolSide::Token0)
                    } else if token1 == self.token.token_address {
                        Some(PoolSide::Token1)
                    } else {
                        warn!(
                            token = %self.token.key,
                            %token0,
                            %token1,
                            "tracked token is not a leg of its configured pool"
                        );
                        None
                    };
                    if let Some(side) = self.side {
                        debug!(token = %self.token.key, ?side, "pool side resolved");
                    }
                    return;
                }
                Err(e) => {
                    warn!(token = %self.token.key, "pool side lookup failed: {}", e);
                    sleep(self.tuning.error_backoff).await;
                }
            }
        }
    }

    /// Advance the cursor to `head` in bounded chunks. On error the cursor
    /// stays at the last fully processed block and the error is returned
    /// for the caller to back off on.
    async fn catch_up(&mut self, head: u64) -> Result<(), FetchError> {
        if head <= self.cursor {
            return Ok(());
        }

        let behind = head - self.cursor;
        if behind > self.tuning.skip_threshold {
            let resume = head.saturating_sub(self.tuning.catchup_margin);
            warn!(
                token = %self.token.key,
                behind,
                skipped_to = resume,
                "too far behind head, skipping forward"
            );
            self.cursor = self.cursor.max(resume);
        }

        while self.cursor < head {
            let from = self.cursor + 1;
            let to = head.min(self.cursor + self.tuning.max_blocks_per_call);
            self.process_chunk(from, to).await?;
            self.cursor = to;
        }
        Ok(())
    }

    /// Fetch and dispatch one block range. A successful empty primary query
    /// falls back to the unfiltered query; whatever that returns goes through
    /// the same dedup/classify/dispatch loop (non-swap entries classify
    /// Unknown and never reach the round book). Fallback failures never fail
    /// the chunk.
    async fn process_chunk(&mut self, from: u64, to: u64) -> Result<(), FetchError> {
        let mut logs = self
            .source
            .swap_logs(self.token.pool_address, from, to)
            .await?;

        if logs.is_empty() {
            logs = self.fallback_logs(from, to).await;
        }
        if logs.is_empty() {
            return Ok(());
        }

        // Cap check sits between chunks so hashes dispatched earlier in this
        // batch are never forgotten mid-batch
        if self.processed.len() > PROCESSED_CAP {
            self.processed.clear();
        }

        let eth_usd = self.oracle.eth_usd().await;
        for entry in &logs {
            if !self.processed.insert(entry.tx_hash) {
                debug!(token = %self.token.key, tx = %entry.tx_hash, "duplicate tx, skipping");
                continue;
            }

            let swap = classify(entry, self.side, eth_usd);
            info!(
                token = %self.token.key,
                tx = %swap.tx_hash,
                block = swap.block_number,
                direction = %swap.direction,
                amount = swap.token_amount,
                price = ?swap.price_usd,
                "swap observed"
            );

            let tx_url = format!("{}/tx/{}", self.token.explorer_url, swap.tx_hash);
            let _ = self
                .notices
                .send(SwapNotice::Swap {
                    token_key: self.token.key.clone(),
                    symbol: self.token.symbol.clone(),
                    swap: swap.clone(),
                    tx_url,
                })
                .await;

            // Unpriced and unclassified swaps never touch the game
            if swap.direction != SwapDirection::Unknown {
                if let Some(price) = swap.price_usd {
                    if let Some(resolution) = self.rounds.on_price_tick(&self.token.key, price) {
                        let _ = self
                            .notices
                            .send(SwapNotice::RoundResolved {
                                token_key: self.token.key.clone(),
                                symbol: self.token.symbol.clone(),
                                resolution,
                            })
                            .await;
                    }
                }
            }
        }
        Ok(())
    }

    /// Unfiltered query for when the signature filter came back empty. Names
    /// each event for the debug log and hands the entries back for normal
    /// dispatch — a Swap the primary filter missed still gets through here.
    async fn fallback_logs(&self, from: u64, to: u64) -> Vec<RawLogEntry> {
        match self.source.all_logs(self.token.pool_address, from, to).await {
            Ok(logs) => {
                for entry in &logs {
                    if let Some(topic) = entry.topics.first() {
                        let name = event_name(topic).unwrap_or("unrecognized");
                        debug!(
                            token = %self.token.key,
                            block = entry.block_number,
                            event = name,
                            "pool activity via fallback"
                        );
                    }
                }
                logs
            }
            Err(e) => {
                debug!(token = %self.token.key, "fallback log query failed: {}", e);
                Vec::new()
            }
        }
    }
}

/// On-demand query: the newest `count` classified swaps within the last
/// [`RECENT_LOOKBACK_BLOCKS`] blocks. Used by the recent-swaps command, not
/// by the poll loop.
pub async fn recent_swaps<S: LogSource>(
    source: &S,
    token: &TrackedToken,
    side: Option<PoolSide>,
    eth_usd: Option<f64>,
    count: usize,
) -> Result<Vec<ClassifiedSwap>, FetchError> {
    let head = source.head_block().await?;
    let from = head.saturating_sub(RECENT_LOOKBACK_BLOCKS);
    let logs = source.swap_logs(token.pool_address, from, head).await?;

    let mut swaps: Vec<ClassifiedSwap> = logs
        .iter()
        .map(|entry| classify(entry, side, eth_usd))
        .filter(|s| s.direction != SwapDirection::Unknown)
        .collect();
    swaps.sort_by(|a, b| b.block_number.cmp(&a.block_number));
    swaps.truncate(count);
    Ok(swaps)
}
