//! Configuration management
//! Load RPC endpoints and API keys from .env, plus the built-in
//! tracked-token table and per-network poll tuning.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use std::fmt;
use std::time::Duration;

/// How many blocks behind the head we restart from after a catch-up skip
pub const CATCHUP_MARGIN: u64 = 2;

/// Price-feed cache TTL in seconds
pub const PRICE_CACHE_SECS: u64 = 60;

/// Chains we monitor pools on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Ethereum,
    Arbitrum,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => 1,
            Network::Arbitrum => 42161,
        }
    }

    /// Delay between poll iterations. Ethereum blocks every ~12s so 15s is
    /// plenty; Arbitrum produces blocks sub-second and needs a tight loop.
    pub fn poll_interval(&self) -> Duration {
        match self {
            Network::Ethereum => Duration::from_secs(15),
            Network::Arbitrum => Duration::from_secs(1),
        }
    }

    /// Largest block range per eth_getLogs call. Conservative on Ethereum
    /// where providers rate-limit aggressively.
    pub fn max_blocks_per_call(&self) -> u64 {
        match self {
            Network::Ethereum => 5,
            Network::Arbitrum => 50,
        }
    }

    /// If we fall further behind than this, skip forward instead of
    /// burning credits catching up block by block.
    pub fn skip_threshold(&self) -> u64 {
        match self {
            Network::Ethereum => 8,
            Network::Arbitrum => 100,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Network::Ethereum => write!(f, "ethereum"),
            Network::Arbitrum => write!(f, "arbitrum"),
        }
    }
}

/// Static configuration for one tracked token. Immutable after load.
#[derive(Debug, Clone)]
pub struct TrackedToken {
    /// Short key used in commands and log prefixes ("emp", "talos")
    pub key: String,
    pub name: String,
    pub symbol: String,
    pub token_address: Address,
    pub pool_address: Address,
    pub network: Network,
    /// Both pool legs are assumed 18-decimal
    pub decimals: u8,
    pub explorer_url: String,
}

/// Process-wide configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub eth_rpc_url: Option<String>,
    pub arbitrum_rpc_url: Option<String>,
    pub etherscan_api_key: Option<String>,
    pub tokens: Vec<TrackedToken>,
}

impl AppConfig {
    /// Load from environment. Missing RPC URLs are not fatal here — a token
    /// whose network has no endpoint fails at start_monitor time only, so
    /// other tokens keep working.
    pub fn load() -> Result<AppConfig> {
        dotenv::dotenv().ok();

        Ok(AppConfig {
            eth_rpc_url: std::env::var("ETH_RPC_URL")
                .or_else(|_| std::env::var("INFURA_URL"))
                .ok(),
            arbitrum_rpc_url: std::env::var("ARBITRUM_RPC_URL").ok(),
            etherscan_api_key: std::env::var("ETHERSCAN_API_KEY").ok(),
            tokens: default_tokens()?,
        })
    }

    pub fn token(&self, key: &str) -> Option<&TrackedToken> {
        self.tokens.iter().find(|t| t.key == key)
    }

    pub fn rpc_url(&self, network: Network) -> Option<&str> {
        match network {
            Network::Ethereum => self.eth_rpc_url.as_deref(),
            Network::Arbitrum => self.arbitrum_rpc_url.as_deref(),
        }
    }
}

/// The built-in token table: EMP/WETH on Ethereum mainnet, Talos/WETH on
/// Arbitrum. Both pools are Uniswap V3 with 18-decimal legs.
fn default_tokens() -> Result<Vec<TrackedToken>> {
    Ok(vec![
        TrackedToken {
            key: "emp".to_string(),
            name: "Empyreal".to_string(),
            symbol: "EMP".to_string(),
            token_address: "0x39D5313C3750140E5042887413bA8AA6145a9bd2"
                .parse()
                .context("Invalid EMP token address")?,
            pool_address: "0xe092769bc1fa5262D4f48353f90890Dcc339BF80"
                .parse()
                .context("Invalid EMP pool address")?,
            network: Network::Ethereum,
            decimals: 18,
            explorer_url: "https://etherscan.io".to_string(),
        },
        TrackedToken {
            key: "talos".to_string(),
            name: "Talos".to_string(),
            symbol: "T".to_string(),
            token_address: "0x30a538eFFD91ACeFb1b12CE9Bc0074eD18c9dFc9"
                .parse()
                .context("Invalid Talos token address")?,
            pool_address: "0xdaAe914e4Bae2AAe4f536006C353117B90Fb37e3"
                .parse()
                .context("Invalid Talos pool address")?,
            network: Network::Arbitrum,
            decimals: 18,
            explorer_url: "https://arbiscan.io".to_string(),
        },
    ])
}
