//! Pool Watch Bot
//!
//! Main entry point. Loads configuration, starts one chain monitor per
//! selected token, and prints the resulting swap/round feed until Ctrl-C.
//!
//! The binary runs the headless feed; bets and stats queries go through
//! [`poolwatch_bot::BotCore`] when a chat frontend is wired on top.

use anyhow::Result;
use clap::Parser;
use poolwatch_bot::monitor::SwapNotice;
use poolwatch_bot::rounds::RoundOutcome;
use poolwatch_bot::{AppConfig, BotCore};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Uniswap V3 pool swap monitor with a higher/lower prediction game
#[derive(Parser)]
#[command(name = "poolwatch-bot")]
struct Args {
    /// Token keys to monitor (comma-separated). Defaults to every
    /// configured token.
    #[arg(short, long, env = "WATCH_TOKENS", value_delimiter = ',')]
    tokens: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = AppConfig::load()?;

    let selected: Vec<String> = if args.tokens.is_empty() {
        config.tokens.iter().map(|t| t.key.clone()).collect()
    } else {
        args.tokens
    };
    info!("Pool Watch Bot starting — tokens: {}", selected.join(", "));

    let (notice_tx, mut notice_rx) = mpsc::channel(256);
    let core = BotCore::new(config, notice_tx);

    let mut started = 0;
    for key in &selected {
        match core.start_monitor(key) {
            Ok(()) => started += 1,
            Err(e) => error!("could not start monitor for '{}': {}", key, e),
        }
    }
    if started == 0 {
        anyhow::bail!("no monitors started — check token keys and RPC configuration");
    }

    // Feed consumer: render swaps and round settlements to the log
    let feed = tokio::spawn(async move {
        while let Some(notice) = notice_rx.recv().await {
            match notice {
                SwapNotice::Swap {
                    symbol, swap, tx_url, ..
                } => {
                    let price = swap
                        .price_usd
                        .map(|p| format!("${:.6}", p))
                        .unwrap_or_else(|| "price n/a".to_string());
                    info!(
                        "{} {} | {:.4} {} for {:.6} ETH | {} | {}",
                        swap.direction, symbol, swap.token_amount, symbol, swap.counter_amount,
                        price, tx_url
                    );
                }
                SwapNotice::RoundResolved {
                    symbol, resolution, ..
                } => match resolution.outcome {
                    RoundOutcome::Unchanged => {
                        info!(
                            "{} round: ${:.6} → ${:.6} | unchanged, no winners",
                            symbol, resolution.opening_price, resolution.closing_price
                        );
                    }
                    outcome => {
                        info!(
                            "{} round: ${:.6} → ${:.6} | {:?} | {} winner(s), {} loser(s)",
                            symbol,
                            resolution.opening_price,
                            resolution.closing_price,
                            outcome,
                            resolution.winners.len(),
                            resolution.losers.len()
                        );
                    }
                },
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping monitors...");
    core.stop_all().await;
    feed.abort();
    info!("Pool Watch Bot stopped");
    Ok(())
}
