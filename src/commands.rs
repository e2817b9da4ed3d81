//! Bot Command Surface
//!
//! [`BotCore`] owns the shared state (config, oracle, round book, stats) and
//! exposes the operations a frontend wires user input to: start/stop a
//! token's monitor, place a bet, read stats and leaderboards, list recent
//! swaps. Frontends stay thin; everything stateful happens here.

use crate::config::{AppConfig, TrackedToken, PRICE_CACHE_SECS};
use crate::fetcher::{EtherscanLogs, FetchError, LogSource, RpcLogSource};
use crate::monitor::{self, ChainMonitor, PollTuning, SwapNotice};
use crate::oracle::PriceOracle;
use crate::rounds::{BetDirection, BetError, RoundBook};
use crate::stats::StatsLedger;
use crate::types::{ClassifiedSwap, PoolSide};
use alloy::providers::{Provider, ProviderBuilder};
use dashmap::DashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown token: {0}")]
    UnknownToken(String),
    #[error("already monitoring {0}")]
    AlreadyMonitoring(String),
    #[error("not monitoring {0}")]
    NotMonitoring(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Bet(#[from] BetError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

struct MonitorHandle {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Shared bot state plus the operations commands map onto.
pub struct BotCore {
    config: AppConfig,
    oracle: Arc<PriceOracle>,
    rounds: Arc<RoundBook>,
    stats: Arc<StatsLedger>,
    monitors: DashMap<String, MonitorHandle>,
    notices: mpsc::Sender<SwapNotice>,
}

impl BotCore {
    pub fn new(config: AppConfig, notices: mpsc::Sender<SwapNotice>) -> Self {
        let stats = Arc::new(StatsLedger::new());
        let oracle = Arc::new(PriceOracle::new(
            config.etherscan_api_key.clone().unwrap_or_default(),
            Duration::from_secs(PRICE_CACHE_SECS),
        ));
        Self {
            config,
            oracle,
            rounds: Arc::new(RoundBook::new(stats.clone())),
            stats,
            monitors: DashMap::new(),
            notices,
        }
    }

    pub fn tokens(&self) -> &[TrackedToken] {
        &self.config.tokens
    }

    fn token(&self, key: &str) -> Result<&TrackedToken, CommandError> {
        self.config
            .token(key)
            .ok_or_else(|| CommandError::UnknownToken(key.to_string()))
    }

    /// Spawn the poll loop for one token. One monitor per token; a second
    /// start is rejected, not restarted.
    pub fn start_monitor(&self, key: &str) -> Result<(), CommandError> {
        let token = self.token(key)?.clone();
        if self.monitors.contains_key(key) {
            return Err(CommandError::AlreadyMonitoring(key.to_string()));
        }

        let source = Arc::new(self.log_source(&token)?);
        let running = Arc::new(AtomicBool::new(true));
        let monitor = ChainMonitor::new(
            token.clone(),
            source,
            self.oracle.clone(),
            self.rounds.clone(),
            self.notices.clone(),
            running.clone(),
            PollTuning::for_network(token.network),
        );
        let task = tokio::spawn(monitor.run());

        self.monitors
            .insert(key.to_string(), MonitorHandle { running, task });
        info!(token = key, "monitor launched");
        Ok(())
    }

    /// Signal one token's monitor to stop. The task drains its current
    /// iteration and exits on its own.
    pub fn stop_monitor(&self, key: &str) -> Result<(), CommandError> {
        let (_, handle) = self
            .monitors
            .remove(key)
            .ok_or_else(|| CommandError::NotMonitoring(key.to_string()))?;
        handle.running.store(false, Ordering::SeqCst);
        info!(token = key, "monitor stop requested");
        Ok(())
    }

    /// Stop every running monitor and wait for the tasks to finish.
    pub async fn stop_all(&self) {
        let keys: Vec<String> = self.monitors.iter().map(|e| e.key().clone()).collect();
        let mut tasks = Vec::new();
        for key in keys {
            if let Some((_, handle)) = self.monitors.remove(&key) {
                handle.running.store(false, Ordering::SeqCst);
                handle.task.abort();
                tasks.push(handle.task);
            }
        }
        for result in futures::future::join_all(tasks).await {
            if let Err(e) = result {
                if !e.is_cancelled() {
                    warn!("monitor task ended abnormally: {}", e);
                }
            }
        }
    }

    pub fn is_monitoring(&self, key: &str) -> bool {
        self.monitors.contains_key(key)
    }

    /// Place a higher/lower call in the token's open round.
    pub fn place_bet(
        &self,
        key: &str,
        player: &str,
        direction: BetDirection,
    ) -> Result<(), CommandError> {
        self.token(key)?;
        self.rounds.place_bet(key, player, direction)?;
        Ok(())
    }

    /// Today's leaderboard as display text.
    pub fn leaderboard(&self) -> String {
        let rows = self.stats.leaderboard(10);
        if rows.is_empty() {
            return "No points scored yet today.".to_string();
        }
        let mut out = String::from("Daily leaderboard (GMT):\n");
        for (rank, (player, stats)) in rows.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} — {} pts today | {}/{} lifetime ({:.0}%)",
                rank + 1,
                player,
                stats.daily_points,
                stats.correct_bets,
                stats.total_bets,
                stats.accuracy() * 100.0
            );
        }
        out
    }

    /// One player's stats as display text.
    pub fn player_stats(&self, player: &str) -> String {
        match self.stats.get_stats(player) {
            Some(stats) => format!(
                "{}: {} pts today | {} bets, {} correct ({:.0}%)",
                player,
                stats.daily_points,
                stats.total_bets,
                stats.correct_bets,
                stats.accuracy() * 100.0
            ),
            None => format!("{} has not placed any bets yet.", player),
        }
    }

    /// Opening price of the token's current round, if one is open.
    pub fn current_round_price(&self, key: &str) -> Result<Option<f64>, CommandError> {
        self.token(key)?;
        Ok(self.rounds.current_round(key).map(|r| r.opening_price))
    }

    /// Fetch the newest `count` swaps for a token on demand. Builds its own
    /// connection; works whether or not the token's monitor is running.
    pub async fn recent_swaps(
        &self,
        key: &str,
        count: usize,
    ) -> Result<Vec<ClassifiedSwap>, CommandError> {
        let token = self.token(key)?.clone();
        let source = self.log_source(&token)?;

        let (token0, token1) = source.pool_tokens(token.pool_address).await?;
        let side = if token0 == token.token_address {
            Some(PoolSide::Token0)
        } else if token1 == token.token_address {
            Some(PoolSide::Token1)
        } else {
            None
        };

        let eth_usd = self.oracle.eth_usd().await;
        Ok(monitor::recent_swaps(&source, &token, side, eth_usd, count).await?)
    }

    /// Current oracle readings for display.
    pub async fn prices(&self) -> (Option<f64>, Option<f64>) {
        (self.oracle.eth_usd().await, self.oracle.btc_usd().await)
    }

    fn log_source(
        &self,
        token: &TrackedToken,
    ) -> Result<RpcLogSource<impl Provider + 'static>, CommandError> {
        let url = self.config.rpc_url(token.network).ok_or_else(|| {
            CommandError::Config(format!("no RPC endpoint configured for {}", token.network))
        })?;
        let parsed = url
            .parse()
            .map_err(|e| CommandError::Config(format!("bad RPC URL for {}: {}", token.network, e)))?;
        let provider = ProviderBuilder::new().connect_http(parsed);

        let fallback = self
            .config
            .etherscan_api_key
            .as_ref()
            .map(|key| EtherscanLogs::new(key.clone(), token.network.chain_id()));

        Ok(RpcLogSource::new(Arc::new(provider), fallback))
    }
}
