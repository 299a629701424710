//! Per-strategy trade statistics maintained after every closed trade:
//! win rate, profit factor, a Sharpe-like ratio, per-regime sub-records,
//! and a fixed-size rolling window for recency-weighted adjustments.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use types::{Regime, TradeOutcome};

/// Minimum return samples before the Sharpe-like ratio is reported.
const SHARPE_MIN_SAMPLES: usize = 5;

/// One rolling-window entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTrade {
    pub timestamp: DateTime<Utc>,
    pub profit: f64,
    pub success: bool,
    pub confidence: f64,
}

/// Per-regime sub-record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegimeStats {
    pub trades: u64,
    pub wins: u64,
    pub profit: f64,
}

impl RegimeStats {
    pub fn win_rate(&self) -> f64 {
        if self.trades == 0 {
            0.0
        } else {
            self.wins as f64 / self.trades as f64
        }
    }
}

/// Accumulated statistics for one strategy name. Created lazily on the first
/// recorded trade; never deleted within a session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub total_trades: u64,
    pub profitable_trades: u64,
    pub losing_trades: u64,
    /// Gross profit across winning trades.
    pub total_profit: f64,
    /// Gross loss (absolute) across losing trades.
    pub total_loss: f64,
    pub win_rate: f64,
    /// Gross profit / gross loss; 0 until the first loss.
    pub profit_factor: f64,
    /// Mean profit of winning trades.
    pub avg_profit: f64,
    /// Mean absolute loss of losing trades.
    pub avg_loss: f64,
    /// Mean / population stdev of the recent return series; 0 below 5 samples
    /// or with zero deviation.
    pub sharpe_ratio: f64,
    /// Running mean holding time in minutes.
    pub avg_holding_time_min: f64,
    pub regimes: HashMap<Regime, RegimeStats>,
    /// Most recent trades, bounded by the configured window (~20).
    pub recent: VecDeque<RecentTrade>,
    /// Recent return series feeding the Sharpe-like ratio.
    pub returns: VecDeque<f64>,
}

/// Summary row for learning metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy: String,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub total_trades: u64,
    pub avg_profit: f64,
}

impl StrategyPerformance {
    /// Fold one closed trade into the statistics.
    pub fn record(&mut self, outcome: &TradeOutcome, recent_window: usize, returns_window: usize) {
        self.total_trades += 1;

        if outcome.success {
            self.profitable_trades += 1;
            self.total_profit += outcome.profit_loss;
        } else {
            self.losing_trades += 1;
            self.total_loss += outcome.profit_loss.abs();
        }

        self.win_rate = self.profitable_trades as f64 / self.total_trades as f64;
        if self.total_loss > 0.0 {
            self.profit_factor = self.total_profit / self.total_loss;
        }
        if self.profitable_trades > 0 {
            self.avg_profit = self.total_profit / self.profitable_trades as f64;
        }
        if self.losing_trades > 0 {
            self.avg_loss = self.total_loss / self.losing_trades as f64;
        }

        self.returns.push_back(outcome.profit_loss);
        while self.returns.len() > returns_window {
            self.returns.pop_front();
        }
        self.sharpe_ratio = sharpe_like(self.returns.make_contiguous());

        let holding = outcome.holding_minutes();
        self.avg_holding_time_min = (self.avg_holding_time_min * (self.total_trades - 1) as f64
            + holding)
            / self.total_trades as f64;

        let regime_stats = self.regimes.entry(outcome.conditions.regime).or_default();
        regime_stats.trades += 1;
        regime_stats.profit += outcome.profit_loss;
        if outcome.success {
            regime_stats.wins += 1;
        }

        self.recent.push_back(RecentTrade {
            timestamp: outcome.exit_time,
            profit: outcome.profit_loss,
            success: outcome.success,
            confidence: outcome.confidence,
        });
        while self.recent.len() > recent_window {
            self.recent.pop_front();
        }
    }

    /// Recency adjustment: +10 for a hot streak (win rate above 0.6 with
    /// positive mean profit), -10 for a cold one. Inactive below
    /// `min_trades` rolling-window samples.
    pub fn recent_adjustment(&self, min_trades: usize) -> f64 {
        if self.recent.len() < min_trades {
            return 0.0;
        }
        let wins = self.recent.iter().filter(|t| t.success).count();
        let recent_win_rate = wins as f64 / self.recent.len() as f64;
        let recent_avg_profit =
            self.recent.iter().map(|t| t.profit).sum::<f64>() / self.recent.len() as f64;

        if recent_win_rate > 0.6 && recent_avg_profit > 0.0 {
            10.0
        } else if recent_win_rate < 0.4 || recent_avg_profit < 0.0 {
            -10.0
        } else {
            0.0
        }
    }

    /// Regime adjustment: +5/-5 based on the strategy's record in the
    /// current regime, once the sub-record has `min_trades` samples.
    pub fn regime_adjustment(&self, regime: Regime, min_trades: u64) -> f64 {
        let Some(stats) = self.regimes.get(&regime) else {
            return 0.0;
        };
        if stats.trades < min_trades {
            return 0.0;
        }
        let win_rate = stats.win_rate();
        if win_rate > 0.6 {
            5.0
        } else if win_rate < 0.4 {
            -5.0
        } else {
            0.0
        }
    }
}

/// Mean over population standard deviation of a return series. Not a
/// finance-grade risk-adjusted return; a relative performance indicator.
pub fn sharpe_like(returns: &[f64]) -> f64 {
    if returns.len() < SHARPE_MIN_SAMPLES {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stdev = variance.sqrt();
    if stdev == 0.0 {
        0.0
    } else {
        mean / stdev
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use types::MarketConditions;

    fn outcome(profit: f64, regime: Regime, minutes_held: i64) -> TradeOutcome {
        let entry = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        TradeOutcome {
            trade_id: "t".into(),
            strategy: "momentum_btc".into(),
            symbol: "BTCUSDT".into(),
            entry_time: entry,
            exit_time: entry + chrono::Duration::minutes(minutes_held),
            entry_price: 100.0,
            exit_price: 100.0 + profit,
            quantity: 1.0,
            profit_loss: profit,
            confidence: 70.0,
            conditions: MarketConditions {
                volatility: 0.4,
                volume_ratio: 1.2,
                sentiment: 0.6,
                regime,
                hour: 9,
                price_trend: 0.1,
            },
            success: profit > 0.0,
        }
    }

    #[test]
    fn basic_accumulation() {
        let mut perf = StrategyPerformance::default();
        perf.record(&outcome(50.0, Regime::Bull, 60), 20, 100);
        perf.record(&outcome(-25.0, Regime::Bull, 120), 20, 100);

        assert_eq!(perf.total_trades, 2);
        assert_eq!(perf.profitable_trades, 1);
        assert_eq!(perf.win_rate, 0.5);
        assert_eq!(perf.total_profit, 50.0);
        assert_eq!(perf.total_loss, 25.0);
        assert_eq!(perf.profit_factor, 2.0);
        assert_eq!(perf.avg_holding_time_min, 90.0);

        let bull = perf.regimes.get(&Regime::Bull).unwrap();
        assert_eq!(bull.trades, 2);
        assert_eq!(bull.wins, 1);
    }

    #[test]
    fn sharpe_needs_five_samples_and_spread() {
        assert_eq!(sharpe_like(&[1.0, 2.0, 3.0, 4.0]), 0.0);
        assert_eq!(sharpe_like(&[2.0; 10]), 0.0);
        assert!(sharpe_like(&[1.0, 2.0, 3.0, 2.0, 1.5, 2.5]) > 0.0);
        assert!(sharpe_like(&[-1.0, -2.0, -3.0, -2.0, -1.5]) < 0.0);
    }

    #[test]
    fn rolling_window_is_bounded() {
        let mut perf = StrategyPerformance::default();
        for _ in 0..30 {
            perf.record(&outcome(10.0, Regime::Bull, 60), 20, 100);
        }
        assert_eq!(perf.recent.len(), 20);
        assert_eq!(perf.total_trades, 30);
    }

    #[test]
    fn recent_adjustment_thresholds() {
        let mut hot = StrategyPerformance::default();
        for _ in 0..6 {
            hot.record(&outcome(20.0, Regime::Bull, 60), 20, 100);
        }
        assert_eq!(hot.recent_adjustment(5), 10.0);

        let mut cold = StrategyPerformance::default();
        for _ in 0..6 {
            cold.record(&outcome(-20.0, Regime::Bull, 60), 20, 100);
        }
        assert_eq!(cold.recent_adjustment(5), -10.0);

        let mut thin = StrategyPerformance::default();
        for _ in 0..4 {
            thin.record(&outcome(20.0, Regime::Bull, 60), 20, 100);
        }
        assert_eq!(thin.recent_adjustment(5), 0.0);
    }

    #[test]
    fn regime_adjustment_thresholds() {
        let mut perf = StrategyPerformance::default();
        for _ in 0..4 {
            perf.record(&outcome(20.0, Regime::Bull, 60), 20, 100);
        }
        assert_eq!(perf.regime_adjustment(Regime::Bull, 3), 5.0);
        // Unseen regime contributes nothing
        assert_eq!(perf.regime_adjustment(Regime::Bear, 3), 0.0);

        for _ in 0..8 {
            perf.record(&outcome(-20.0, Regime::Volatile, 60), 20, 100);
        }
        assert_eq!(perf.regime_adjustment(Regime::Volatile, 3), -5.0);
    }
}
