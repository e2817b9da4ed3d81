//! Player Stats Ledger
//!
//! Per-player counters for the prediction game: daily points (reset at GMT
//! midnight), lifetime bets placed, and lifetime correct calls. All methods
//! take effect against a caller-supplied date through the `*_at` variants so
//! the reset rule is testable without waiting for midnight.

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStats {
    pub daily_points: u64,
    pub total_bets: u64,
    pub correct_bets: u64,
    pub last_reset_date: NaiveDate,
}

impl PlayerStats {
    fn new(today: NaiveDate) -> Self {
        Self {
            daily_points: 0,
            total_bets: 0,
            correct_bets: 0,
            last_reset_date: today,
        }
    }

    /// Lifetime hit rate in [0, 1]. Zero bets reads as 0.
    pub fn accuracy(&self) -> f64 {
        if self.total_bets == 0 {
            0.0
        } else {
            self.correct_bets as f64 / self.total_bets as f64
        }
    }

    /// Zero the daily counter if a GMT midnight has passed since the last
    /// reset. Lifetime counters are never touched.
    fn apply_reset(&mut self, today: NaiveDate) {
        if today > self.last_reset_date {
            self.daily_points = 0;
            self.last_reset_date = today;
        }
    }
}

/// Concurrent stats store keyed by player id.
#[derive(Default)]
pub struct StatsLedger {
    players: DashMap<String, PlayerStats>,
}

impl StatsLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one bet placed. Called at placement time, so a bet counts
    /// toward lifetime totals whether or not its round ever resolves.
    pub fn record_bet(&self, player: &str) {
        self.record_bet_at(player, Utc::now().date_naive());
    }

    pub fn record_bet_at(&self, player: &str, today: NaiveDate) {
        let mut entry = self
            .players
            .entry(player.to_string())
            .or_insert_with(|| PlayerStats::new(today));
        entry.apply_reset(today);
        entry.total_bets += 1;
    }

    /// Credit a winning call: one daily point, one lifetime correct.
    pub fn award_point(&self, player: &str) {
        self.award_point_at(player, Utc::now().date_naive());
    }

    pub fn award_point_at(&self, player: &str, today: NaiveDate) {
        let mut entry = self
            .players
            .entry(player.to_string())
            .or_insert_with(|| PlayerStats::new(today));
        entry.apply_reset(today);
        entry.daily_points += 1;
        entry.correct_bets += 1;
    }

    /// Read one player's stats with the daily reset applied. Players who
    /// never bet get None rather than a phantom zero row.
    pub fn get_stats(&self, player: &str) -> Option<PlayerStats> {
        self.get_stats_at(player, Utc::now().date_naive())
    }

    pub fn get_stats_at(&self, player: &str, today: NaiveDate) -> Option<PlayerStats> {
        let mut entry = self.players.get_mut(player)?;
        entry.apply_reset(today);
        Some(entry.clone())
    }

    /// Top players by today's points, descending. Ties break by player id
    /// so the ordering is stable across calls.
    pub fn leaderboard(&self, top_n: usize) -> Vec<(String, PlayerStats)> {
        self.leaderboard_at(top_n, Utc::now().date_naive())
    }

    pub fn leaderboard_at(&self, top_n: usize, today: NaiveDate) -> Vec<(String, PlayerStats)> {
        let mut rows: Vec<(String, PlayerStats)> = self
            .players
            .iter_mut()
            .map(|mut entry| {
                entry.apply_reset(today);
                (entry.key().clone(), entry.clone())
            })
            .collect();
        rows.sort_by(|a, b| {
            b.1.daily_points
                .cmp(&a.1.daily_points)
                .then_with(|| a.0.cmp(&b.0))
        });
        rows.truncate(top_n);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_bet_and_award_counters() {
        let ledger = StatsLedger::new();
        let d = day("2026-08-26");

        ledger.record_bet_at("alice", d);
        ledger.record_bet_at("alice", d);
        ledger.award_point_at("alice", d);

        let stats = ledger.get_stats_at("alice", d).unwrap();
        assert_eq!(stats.total_bets, 2);
        assert_eq!(stats.correct_bets, 1);
        assert_eq!(stats.daily_points, 1);
        assert_eq!(stats.accuracy(), 0.5);
    }

    #[test]
    fn test_unknown_player_has_no_row() {
        let ledger = StatsLedger::new();
        assert!(ledger.get_stats_at("nobody", day("2026-08-26")).is_none());
    }

    #[test]
    fn test_daily_reset_preserves_lifetime_counters() {
        let ledger = StatsLedger::new();
        let d1 = day("2026-08-25");
        let d2 = day("2026-08-26");

        ledger.record_bet_at("bob", d1);
        ledger.award_point_at("bob", d1);
        assert_eq!(ledger.get_stats_at("bob", d1).unwrap().daily_points, 1);

        // Next GMT day: daily points zero out, lifetime stats survive
        let stats = ledger.get_stats_at("bob", d2).unwrap();
        assert_eq!(stats.daily_points, 0);
        assert_eq!(stats.total_bets, 1);
        assert_eq!(stats.correct_bets, 1);
        assert_eq!(stats.last_reset_date, d2);
    }

    #[test]
    fn test_award_after_midnight_starts_fresh_day() {
        let ledger = StatsLedger::new();
        ledger.award_point_at("carol", day("2026-08-25"));
        ledger.award_point_at("carol", day("2026-08-26"));

        let stats = ledger.get_stats_at("carol", day("2026-08-26")).unwrap();
        assert_eq!(stats.daily_points, 1);
        assert_eq!(stats.correct_bets, 2);
    }

    #[test]
    fn test_leaderboard_sorted_by_daily_points() {
        let ledger = StatsLedger::new();
        let d = day("2026-08-26");
        for _ in 0..3 {
            ledger.award_point_at("alice", d);
        }
        ledger.award_point_at("bob", d);
        ledger.record_bet_at("carol", d);

        let rows = ledger.leaderboard_at(2, d);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "alice");
        assert_eq!(rows[0].1.daily_points, 3);
        assert_eq!(rows[1].0, "bob");
    }
}
