//! Swap Decoder / Classifier
//!
//! Turns a raw pool log into a classified BUY/SELL swap with a derived USD
//! price, or an explicit non-swap tag. Everything here is pure — the pool
//! token ordering and the oracle price are resolved by the caller and passed
//! in, so the same inputs always produce the same output.
//!
//! V3 Swap event layout:
//!     topics: [signature, sender, recipient]
//!     data:   [amount0 int256, amount1 int256, sqrtPriceX96 uint160,
//!              liquidity uint128, tick int24] — five 32-byte words
//!
//! amount0/amount1 are signed from the pool's perspective: negative means
//! the pool paid that token out to the trader. A trade therefore always has
//! one negative and one positive leg; Mint/Burn/Flash events have different
//! topic counts and payload widths and decode as NotASwap/Malformed.

use crate::contracts::SWAP_EVENT_TOPIC;
use crate::types::{ClassifiedSwap, PoolSide, RawLogEntry, SwapDirection};
use alloy::primitives::{I256, U256};

/// Decimal precision assumed for both pool legs
const TOKEN_DECIMALS_FACTOR: f64 = 1e18;

/// Q64.96 fixed-point divisor for sqrtPriceX96
const Q96: f64 = 7.922816251426434e28; // 2^96

/// Decoded payload of one Swap event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapEventData {
    pub amount0: I256,
    pub amount1: I256,
    pub sqrt_price_x96: U256,
    pub liquidity: u128,
    pub tick: i32,
}

/// Tagged decode result. Callers branch on the tag instead of sniffing
/// payload lengths themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwapDecode {
    /// A well-formed Swap event
    Swap(SwapEventData),
    /// Some other pool event (Mint, Burn, Flash, ...) — expected, not an error
    NotASwap,
    /// Swap signature but a payload too short to decode
    Malformed,
}

/// Decode one raw log entry against the expected Swap event shape.
pub fn decode_swap_log(entry: &RawLogEntry) -> SwapDecode {
    match entry.topics.first() {
        Some(topic) if *topic == *SWAP_EVENT_TOPIC => {}
        _ => return SwapDecode::NotASwap,
    }
    // Swap carries two indexed address topics after the signature
    if entry.topics.len() < 3 {
        return SwapDecode::NotASwap;
    }
    let data = entry.data.as_ref();
    if data.len() < 160 {
        return SwapDecode::Malformed;
    }

    let amount0 = I256::from_raw(U256::from_be_slice(&data[0..32]));
    let amount1 = I256::from_raw(U256::from_be_slice(&data[32..64]));
    let sqrt_price_x96 = U256::from_be_slice(&data[64..96]);
    let liquidity = u128::try_from(U256::from_be_slice(&data[96..128])).unwrap_or(0);
    // int24 sign-extended to 32 bytes; the low 4 bytes carry the value
    let tick = i32::from_be_bytes([data[156], data[157], data[158], data[159]]);

    SwapDecode::Swap(SwapEventData {
        amount0,
        amount1,
        sqrt_price_x96,
        liquidity,
        tick,
    })
}

/// Classify one log entry relative to the tracked token.
///
/// `side` is the tracked token's position in the pool (None when the token
/// matched neither pool asset). `eth_usd` is the oracle reference price for
/// the counter asset; None or zero leaves the swap price-unavailable.
pub fn classify(
    entry: &RawLogEntry,
    side: Option<PoolSide>,
    eth_usd: Option<f64>,
) -> ClassifiedSwap {
    let decoded = match decode_swap_log(entry) {
        SwapDecode::Swap(d) => d,
        SwapDecode::NotASwap | SwapDecode::Malformed => {
            return ClassifiedSwap::unclassified(entry)
        }
    };

    let side = match side {
        Some(s) => s,
        None => return ClassifiedSwap::unclassified(entry),
    };

    let (tracked_raw, counter_raw) = match side {
        PoolSide::Token0 => (decoded.amount0, decoded.amount1),
        PoolSide::Token1 => (decoded.amount1, decoded.amount0),
    };

    // Pool paid tracked token out → trader bought it
    let direction = if tracked_raw.is_negative() {
        SwapDirection::Buy
    } else if tracked_raw.is_zero() {
        SwapDirection::Unknown
    } else {
        SwapDirection::Sell
    };

    let token_amount = amount_units(tracked_raw);
    let counter_amount = amount_units(counter_raw);

    // Price the swap off its ETH leg and the reference feed. Division by a
    // zero token amount or a missing feed price yields None, never 0/inf.
    let price_usd = match eth_usd {
        Some(p) if p > 0.0 && token_amount > 0.0 => {
            let counter_usd = counter_amount * p;
            if counter_usd > 0.0 {
                Some(counter_usd / token_amount)
            } else {
                None
            }
        }
        _ => None,
    };

    ClassifiedSwap {
        tx_hash: entry.tx_hash,
        block_number: entry.block_number,
        direction,
        token_amount,
        counter_amount,
        price_usd,
    }
}

/// Pool spot price (token1 per token0) from sqrtPriceX96, decimal-adjusted.
/// Display helper only — round input always uses the counter-leg derivation.
pub fn pool_spot_price(sqrt_price_x96: U256, token0_decimals: u8, token1_decimals: u8) -> f64 {
    let sqrt = u256_to_f64(sqrt_price_x96) / Q96;
    let raw = sqrt * sqrt;
    raw * 10f64.powi(token0_decimals as i32 - token1_decimals as i32)
}

/// Magnitude of a signed fixed-point amount in whole-token units.
fn amount_units(raw: I256) -> f64 {
    u256_to_f64(raw.unsigned_abs()) / TOKEN_DECIMALS_FACTOR
}

/// Lossy conversion for display/price math. Fine for token quantities;
/// never used where wei-exactness matters.
pub fn u256_to_f64(v: U256) -> f64 {
    v.as_limbs()
        .iter()
        .rev()
        .fold(0.0, |acc, &limb| acc * 1.8446744073709552e19 + limb as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, B256};

    /// Build a Swap-shaped log with the given signed amounts (in wei).
    fn swap_log(amount0: i128, amount1: i128) -> RawLogEntry {
        let mut data = Vec::with_capacity(160);
        data.extend_from_slice(&I256::try_from(amount0).unwrap().to_be_bytes::<32>());
        data.extend_from_slice(&I256::try_from(amount1).unwrap().to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(1u64).to_be_bytes::<32>()); // sqrtPriceX96
        data.extend_from_slice(&U256::from(1u64).to_be_bytes::<32>()); // liquidity
        data.extend_from_slice(&U256::ZERO.to_be_bytes::<32>()); // tick

        RawLogEntry {
            tx_hash: B256::repeat_byte(0xab),
            block_number: 1000,
            topics: vec![*SWAP_EVENT_TOPIC, B256::repeat_byte(1), B256::repeat_byte(2)],
            data: Bytes::from(data),
        }
    }

    const ONE_TOKEN: i128 = 1_000_000_000_000_000_000; // 10^18

    #[test]
    fn test_decode_valid_swap() {
        let entry = swap_log(-5 * ONE_TOKEN, ONE_TOKEN);
        match decode_swap_log(&entry) {
            SwapDecode::Swap(d) => {
                assert_eq!(d.amount0, I256::try_from(-5 * ONE_TOKEN).unwrap());
                assert_eq!(d.amount1, I256::try_from(ONE_TOKEN).unwrap());
            }
            other => panic!("expected Swap, got {:?}", other),
        }
    }

    #[test]
    fn test_mint_shaped_log_is_not_a_swap() {
        // One topic, 64-byte payload — the shape the fallback path returns
        // for Mint events. Must classify Unknown, never error.
        let entry = RawLogEntry {
            tx_hash: B256::repeat_byte(0xcd),
            block_number: 1001,
            topics: vec![B256::repeat_byte(0x7a)],
            data: Bytes::from(vec![0u8; 64]),
        };
        assert_eq!(decode_swap_log(&entry), SwapDecode::NotASwap);
        let swap = classify(&entry, Some(PoolSide::Token0), Some(3000.0));
        assert_eq!(swap.direction, SwapDirection::Unknown);
        assert_eq!(swap.price_usd, None);
    }

    #[test]
    fn test_swap_topic_with_short_payload_is_malformed() {
        let mut entry = swap_log(ONE_TOKEN, -ONE_TOKEN);
        entry.data = Bytes::from(vec![0u8; 96]);
        assert_eq!(decode_swap_log(&entry), SwapDecode::Malformed);
    }

    #[test]
    fn test_buy_when_tracked_token_flows_out_of_pool() {
        // Tracked token on side 0, pool pays 5 tokens out for 1 ETH in
        let entry = swap_log(-5 * ONE_TOKEN, ONE_TOKEN);
        let swap = classify(&entry, Some(PoolSide::Token0), Some(3000.0));
        assert_eq!(swap.direction, SwapDirection::Buy);
        assert!((swap.token_amount - 5.0).abs() < 1e-9);
        assert!((swap.counter_amount - 1.0).abs() < 1e-9);
        // 1 ETH * $3000 / 5 tokens = $600
        assert!((swap.price_usd.unwrap() - 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_sell_when_tracked_token_flows_into_pool() {
        let entry = swap_log(10 * ONE_TOKEN, -2 * ONE_TOKEN);
        let swap = classify(&entry, Some(PoolSide::Token0), Some(3000.0));
        assert_eq!(swap.direction, SwapDirection::Sell);
        assert!((swap.price_usd.unwrap() - 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_orientation_flips_with_pool_side() {
        // Same log, tracked token on side 1 → amount1 is the tracked leg
        let entry = swap_log(ONE_TOKEN, -5 * ONE_TOKEN);
        let swap = classify(&entry, Some(PoolSide::Token1), Some(3000.0));
        assert_eq!(swap.direction, SwapDirection::Buy);
        assert!((swap.token_amount - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_when_token_not_in_pool() {
        let entry = swap_log(-ONE_TOKEN, ONE_TOKEN);
        let swap = classify(&entry, None, Some(3000.0));
        assert_eq!(swap.direction, SwapDirection::Unknown);
    }

    #[test]
    fn test_price_unavailable_without_oracle() {
        let entry = swap_log(-5 * ONE_TOKEN, ONE_TOKEN);
        let swap = classify(&entry, Some(PoolSide::Token0), None);
        // Still classified for display, just unpriced
        assert_eq!(swap.direction, SwapDirection::Buy);
        assert_eq!(swap.price_usd, None);

        let swap = classify(&entry, Some(PoolSide::Token0), Some(0.0));
        assert_eq!(swap.price_usd, None);
    }

    #[test]
    fn test_price_unavailable_on_zero_tracked_amount() {
        let entry = swap_log(0, ONE_TOKEN);
        let swap = classify(&entry, Some(PoolSide::Token0), Some(3000.0));
        assert_eq!(swap.direction, SwapDirection::Unknown);
        assert_eq!(swap.price_usd, None);
    }

    #[test]
    fn test_classify_is_pure() {
        let entry = swap_log(-3 * ONE_TOKEN, 2 * ONE_TOKEN);
        let a = classify(&entry, Some(PoolSide::Token0), Some(2500.0));
        let b = classify(&entry, Some(PoolSide::Token0), Some(2500.0));
        assert_eq!(a.direction, b.direction);
        assert_eq!(a.token_amount, b.token_amount);
        assert_eq!(a.counter_amount, b.counter_amount);
        assert_eq!(a.price_usd, b.price_usd);
    }

    #[test]
    fn test_u256_to_f64() {
        assert_eq!(u256_to_f64(U256::ZERO), 0.0);
        assert_eq!(u256_to_f64(U256::from(1_000_000u64)), 1e6);
        let wei = U256::from(10u64).pow(U256::from(18u64));
        assert_eq!(u256_to_f64(wei), 1e18);
    }

    #[test]
    fn test_pool_spot_price_equal_decimals() {
        // sqrtPriceX96 = 2^96 → raw price exactly 1.0
        let q96 = U256::from(1u64) << 96;
        let price = pool_spot_price(q96, 18, 18);
        assert!((price - 1.0).abs() < 1e-12);
    }
}
