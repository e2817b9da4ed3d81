//! Round State Machine
//!
//! The higher/lower prediction game. Each tracked token has at most one open
//! round at a time; a round captures the price of the swap that opened it,
//! collects one bet per player, and is settled by the next priced swap. The
//! settling swap's price resolves the old round and opens the new one in a
//! single map operation, so there is never a window with zero or two open
//! rounds for a token.

use crate::stats::StatsLedger;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// A player's call on where the next priced swap lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetDirection {
    Higher,
    Lower,
}

impl fmt::Display for BetDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BetDirection::Higher => write!(f, "higher"),
            BetDirection::Lower => write!(f, "lower"),
        }
    }
}

/// How a round resolved relative to its opening price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    Higher,
    Lower,
    /// Exact price match. Nobody wins, nobody loses.
    Unchanged,
}

/// One open round on a token.
#[derive(Debug, Clone)]
pub struct Round {
    pub opening_price: f64,
    pub bets: HashMap<String, BetDirection>,
    pub opened_at: DateTime<Utc>,
}

impl Round {
    fn new(opening_price: f64) -> Self {
        Self {
            opening_price,
            bets: HashMap::new(),
            opened_at: Utc::now(),
        }
    }
}

/// Settlement record for one resolved round.
#[derive(Debug, Clone)]
pub struct RoundResolution {
    pub opening_price: f64,
    pub closing_price: f64,
    pub outcome: RoundOutcome,
    pub winners: Vec<String>,
    pub losers: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BetError {
    #[error("no active round for this token")]
    NoActiveRound,
    /// Carries the original call so callers can report what stands.
    #[error("bet already placed this round: {0}")]
    DuplicateBet(BetDirection),
}

/// All open rounds, keyed by token key, plus the stats ledger they settle
/// into. Lock ordering is always rounds before stats.
pub struct RoundBook {
    rounds: DashMap<String, Round>,
    stats: Arc<StatsLedger>,
}

impl RoundBook {
    pub fn new(stats: Arc<StatsLedger>) -> Self {
        Self {
            rounds: DashMap::new(),
            stats,
        }
    }

    /// Feed one priced swap into a token's round. Resolves the open round
    /// (if any) against `price` and opens the next round at `price`. The
    /// swap of the resolved round never bets into the new one.
    ///
    /// Returns the resolution when a round was settled; None means this
    /// price only opened the token's first round.
    pub fn on_price_tick(&self, token_key: &str, price: f64) -> Option<RoundResolution> {
        // insert returns the displaced round, making resolve+reopen atomic
        let previous = self.rounds.insert(token_key.to_string(), Round::new(price));
        let round = previous?;

        let outcome = if price > round.opening_price {
            RoundOutcome::Higher
        } else if price < round.opening_price {
            RoundOutcome::Lower
        } else {
            RoundOutcome::Unchanged
        };

        let mut winners = Vec::new();
        let mut losers = Vec::new();
        if outcome != RoundOutcome::Unchanged {
            for (player, bet) in &round.bets {
                let won = matches!(
                    (outcome, bet),
                    (RoundOutcome::Higher, BetDirection::Higher)
                        | (RoundOutcome::Lower, BetDirection::Lower)
                );
                if won {
                    winners.push(player.clone());
                } else {
                    losers.push(player.clone());
                }
            }
            winners.sort();
            losers.sort();
            for player in &winners {
                self.stats.award_point(player);
            }
        }

        info!(
            token = token_key,
            opening = round.opening_price,
            closing = price,
            outcome = ?outcome,
            winners = winners.len(),
            losers = losers.len(),
            "round resolved"
        );

        Some(RoundResolution {
            opening_price: round.opening_price,
            closing_price: price,
            outcome,
            winners,
            losers,
        })
    }

    /// Place one bet in the token's open round. First call per player per
    /// round wins; repeats keep the original and report it back.
    pub fn place_bet(
        &self,
        token_key: &str,
        player: &str,
        direction: BetDirection,
    ) -> Result<(), BetError> {
        let mut round = self
            .rounds
            .get_mut(token_key)
            .ok_or(BetError::NoActiveRound)?;

        if let Some(existing) = round.bets.get(player) {
            return Err(BetError::DuplicateBet(*existing));
        }
        round.bets.insert(player.to_string(), direction);
        drop(round);

        self.stats.record_bet(player);
        Ok(())
    }

    /// Opening price of the token's current round, if one is open.
    pub fn current_round(&self, token_key: &str) -> Option<Round> {
        self.rounds.get(token_key).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> RoundBook {
        RoundBook::new(Arc::new(StatsLedger::new()))
    }

    #[test]
    fn test_first_tick_opens_without_resolving() {
        let book = book();
        assert!(book.on_price_tick("emp", 100.0).is_none());
        assert_eq!(book.current_round("emp").unwrap().opening_price, 100.0);
    }

    #[test]
    fn test_higher_outcome_splits_winners_and_losers() {
        let stats = Arc::new(StatsLedger::new());
        let book = RoundBook::new(stats.clone());

        book.on_price_tick("emp", 100.0);
        book.place_bet("emp", "alice", BetDirection::Higher).unwrap();
        book.place_bet("emp", "bob", BetDirection::Lower).unwrap();
        book.place_bet("emp", "carol", BetDirection::Higher).unwrap();

        let res = book.on_price_tick("emp", 105.0).unwrap();
        assert_eq!(res.outcome, RoundOutcome::Higher);
        assert_eq!(res.winners, vec!["alice".to_string(), "carol".to_string()]);
        assert_eq!(res.losers, vec!["bob".to_string()]);

        // Winners credited, losers only carry their placement count
        assert_eq!(stats.get_stats("alice").unwrap().daily_points, 1);
        assert_eq!(stats.get_stats("bob").unwrap().daily_points, 0);
        assert_eq!(stats.get_stats("bob").unwrap().total_bets, 1);

        // The resolving tick opened the next round at the closing price
        let next = book.current_round("emp").unwrap();
        assert_eq!(next.opening_price, 105.0);
        assert!(next.bets.is_empty());
    }

    #[test]
    fn test_unchanged_price_is_a_push() {
        let stats = Arc::new(StatsLedger::new());
        let book = RoundBook::new(stats.clone());

        book.on_price_tick("emp", 100.0);
        book.place_bet("emp", "alice", BetDirection::Higher).unwrap();
        book.place_bet("emp", "bob", BetDirection::Lower).unwrap();

        let res = book.on_price_tick("emp", 100.0).unwrap();
        assert_eq!(res.outcome, RoundOutcome::Unchanged);
        assert!(res.winners.is_empty());
        assert!(res.losers.is_empty());
        assert_eq!(stats.get_stats("alice").unwrap().daily_points, 0);
    }

    #[test]
    fn test_duplicate_bet_keeps_original() {
        let book = book();
        book.on_price_tick("emp", 100.0);
        book.place_bet("emp", "alice", BetDirection::Higher).unwrap();

        let err = book
            .place_bet("emp", "alice", BetDirection::Lower)
            .unwrap_err();
        assert_eq!(err, BetError::DuplicateBet(BetDirection::Higher));

        // Original call still stands
        let round = book.current_round("emp").unwrap();
        assert_eq!(round.bets["alice"], BetDirection::Higher);
    }

    #[test]
    fn test_bet_without_round_rejected() {
        let book = book();
        let err = book
            .place_bet("emp", "alice", BetDirection::Higher)
            .unwrap_err();
        assert_eq!(err, BetError::NoActiveRound);
    }

    #[test]
    fn test_zero_participant_round_resolves_quietly() {
        let book = book();
        book.on_price_tick("emp", 100.0);
        let res = book.on_price_tick("emp", 90.0).unwrap();
        assert_eq!(res.outcome, RoundOutcome::Lower);
        assert!(res.winners.is_empty());
        assert!(res.losers.is_empty());
    }

    #[test]
    fn test_tokens_round_independently() {
        let book = book();
        book.on_price_tick("emp", 100.0);
        assert!(book.on_price_tick("talos", 2.0).is_none());
        assert!(book.current_round("emp").is_some());
        assert!(book.current_round("talos").is_some());
    }
}
