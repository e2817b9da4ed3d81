// Core data structures shared across the monitor pipeline

use alloy::primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One raw on-chain log record, as returned by the Log Fetcher.
///
/// Produced by either the direct RPC path or the Etherscan fallback path,
/// normalized to the same shape so the decoder doesn't care where it came from.
#[derive(Debug, Clone)]
pub struct RawLogEntry {
    pub tx_hash: B256,
    pub block_number: u64,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// Which side of the pool the tracked token sits on.
///
/// V3 pools sort tokens by address, so the tracked token can land on either
/// side. Resolved once per pool via token0()/token1() view calls and cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSide {
    Token0,
    Token1,
}

/// Swap direction relative to the tracked token.
///
/// Buy means the pool emitted tracked token to the trader (negative delta),
/// Sell means the pool received tracked token (positive delta). Anything
/// else — zero delta, non-swap event shape, token not in pool — is Unknown
/// and must never reach the round state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    Buy,
    Sell,
    Unknown,
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SwapDirection::Buy => write!(f, "BUY"),
            SwapDirection::Sell => write!(f, "SELL"),
            SwapDirection::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// A decoded and oriented swap, ready for display and (if priced) round input.
#[derive(Debug, Clone)]
pub struct ClassifiedSwap {
    pub tx_hash: B256,
    pub block_number: u64,
    pub direction: SwapDirection,
    /// Tracked-token amount, decimal-adjusted (always non-negative)
    pub token_amount: f64,
    /// Counter-asset (ETH leg) amount, decimal-adjusted (always non-negative)
    pub counter_amount: f64,
    /// USD price per tracked-token unit. None when the oracle had no price
    /// or the tracked amount was zero — such swaps are display-only.
    pub price_usd: Option<f64>,
}

impl ClassifiedSwap {
    /// An unclassifiable log entry (non-swap shape, unknown pool side, ...).
    pub fn unclassified(entry: &RawLogEntry) -> Self {
        Self {
            tx_hash: entry.tx_hash,
            block_number: entry.block_number,
            direction: SwapDirection::Unknown,
            token_amount: 0.0,
            counter_amount: 0.0,
            price_usd: None,
        }
    }
}
