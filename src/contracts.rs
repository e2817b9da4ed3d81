//! Centralized Contract Definitions
//!
//! Solidity interfaces for the pool monitor, defined with alloy's `sol!`
//! macro. `#[sol(rpc)]` generates instance types that issue view calls
//! through any alloy Provider.
//!
//! Also holds the keccak256 event-signature topics the decoder matches on.
//! Mint/Burn/Flash are only used to name non-swap pool activity in debug
//! logs — they never produce a classified swap.

use alloy::primitives::{keccak256, B256};
use alloy::sol;
use once_cell::sync::Lazy;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

sol! {
    #[sol(rpc)]
    interface UniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── Event signature topics ──────────────────────────────────────────

pub static SWAP_EVENT_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"Swap(address,address,int256,int256,uint160,uint128,int24)"));

pub static MINT_EVENT_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"Mint(address,address,int24,int24,uint128,uint256,uint256)"));

pub static BURN_EVENT_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"Burn(address,int24,int24,uint128,uint256,uint256)"));

pub static FLASH_EVENT_TOPIC: Lazy<B256> =
    Lazy::new(|| keccak256(b"Flash(address,address,uint256,uint256,uint256,uint256)"));

/// Name a pool event signature for diagnostics. Unknown topics return None.
pub fn event_name(topic: &B256) -> Option<&'static str> {
    if *topic == *SWAP_EVENT_TOPIC {
        Some("Swap")
    } else if *topic == *MINT_EVENT_TOPIC {
        Some("Mint")
    } else if *topic == *BURN_EVENT_TOPIC {
        Some("Burn")
    } else if *topic == *FLASH_EVENT_TOPIC {
        Some("Flash")
    } else {
        None
    }
}
