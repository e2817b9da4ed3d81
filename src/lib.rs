//! Pool Watch Bot Library
//!
//! Components for monitoring Uniswap V3 pool swaps across chains,
//! classifying them as buys/sells with derived USD prices, and running the
//! higher/lower prediction game on top of the resulting price stream.

pub mod classifier;
pub mod commands;
pub mod config;
pub mod contracts;
pub mod fetcher;
pub mod monitor;
pub mod oracle;
pub mod rounds;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use commands::{BotCore, CommandError};
pub use config::{AppConfig, Network, TrackedToken};
pub use fetcher::{FetchError, LogSource};
pub use monitor::{ChainMonitor, PollTuning, SwapNotice};
pub use oracle::PriceOracle;
pub use rounds::{BetDirection, RoundBook, RoundOutcome, RoundResolution};
pub use stats::StatsLedger;
pub use types::{ClassifiedSwap, PoolSide, SwapDirection};
