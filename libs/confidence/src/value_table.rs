//! Tabular value function over discretized (market state, action) pairs,
//! updated with a bootstrapped temporal-difference rule after each trade.
//!
//! Keys are composite structs of discretized integers rather than stringified
//! vectors, so distinct buckets can never silently collide.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{MarketConditions, Regime, TradeOutcome};

/// Strategy classes the action space distinguishes. Everything outside the
/// four learned classes collapses into `Other` (the zero one-hot vector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyClass {
    Momentum,
    MeanReversion,
    Breakout,
    Scalping,
    Other,
}

impl StrategyClass {
    pub fn from_name(name: &str) -> Self {
        let lowered = name.to_lowercase();
        if lowered.contains("momentum") {
            StrategyClass::Momentum
        } else if lowered.contains("mean_reversion") {
            StrategyClass::MeanReversion
        } else if lowered.contains("breakout") {
            StrategyClass::Breakout
        } else if lowered.contains("scalping") {
            StrategyClass::Scalping
        } else {
            StrategyClass::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyClass::Momentum => "momentum",
            StrategyClass::MeanReversion => "mean_reversion",
            StrategyClass::Breakout => "breakout",
            StrategyClass::Scalping => "scalping",
            StrategyClass::Other => "other",
        }
    }
}

/// Discretized market state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub vol_bucket: u8,
    pub volume_bucket: u8,
    pub sentiment_bucket: u8,
    pub regime: Regime,
    pub hour: u8,
    /// Price trend mapped from [-1,1] into 0..=10.
    pub trend_bucket: u8,
}

impl StateKey {
    pub fn from_conditions(conditions: &MarketConditions) -> Self {
        Self {
            vol_bucket: decile(conditions.volatility),
            volume_bucket: decile(conditions.volume_ratio.min(3.0)),
            sentiment_bucket: decile(conditions.sentiment),
            regime: conditions.regime,
            hour: (conditions.hour % 24) as u8,
            trend_bucket: ((conditions.price_trend.clamp(-1.0, 1.0) + 1.0) * 5.0) as u8,
        }
    }
}

/// Discretized action: strategy class plus the confidence decile it was
/// taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionKey {
    pub strategy: StrategyClass,
    /// floor(confidence / 10), 0..=10.
    pub confidence_bucket: u8,
}

impl ActionKey {
    pub fn new(strategy_name: &str, confidence: f64) -> Self {
        Self {
            strategy: StrategyClass::from_name(strategy_name),
            confidence_bucket: (confidence.clamp(0.0, 100.0) / 10.0) as u8,
        }
    }
}

fn decile(value: f64) -> u8 {
    (value.max(0.0) * 10.0).min(u8::MAX as f64) as u8
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct ValueEntry {
    q: f64,
    last_touched: u64,
}

/// Action ranked by its learned value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecommendation {
    pub action: ActionKey,
    pub q_value: f64,
}

/// Flat snapshot row for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSnapshotEntry {
    pub state: StateKey,
    pub action: ActionKey,
    pub q: f64,
    pub last_touched: u64,
}

/// Tabular state-action value store.
#[derive(Debug, Clone)]
pub struct ValueTable {
    states: HashMap<StateKey, HashMap<ActionKey, ValueEntry>>,
    learning_rate: f64,
    discount: f64,
    max_entries: usize,
    entry_count: usize,
    touch_seq: u64,
}

impl ValueTable {
    pub fn new(learning_rate: f64, discount: f64, max_entries: usize) -> Self {
        Self {
            states: HashMap::new(),
            learning_rate,
            discount,
            max_entries,
            entry_count: 0,
            touch_seq: 0,
        }
    }

    /// Reward for a closed trade: normalized profit, a confidence-accuracy
    /// bonus signed by the outcome, and a penalty for holding beyond 24h.
    /// Clipped to [-10,10].
    pub fn reward(outcome: &TradeOutcome) -> f64 {
        let profit_reward = outcome.profit_loss / 100.0;

        let accuracy_sign = if outcome.success { 1.0 } else { -1.0 };
        let confidence_bonus = accuracy_sign * (outcome.confidence / 100.0) * 0.5;

        let time_penalty = -0.1 * (outcome.holding_hours() - 24.0).max(0.0);

        (profit_reward + confidence_bonus + time_penalty).clamp(-10.0, 10.0)
    }

    /// Temporal-difference update: `q += alpha * (reward + gamma * max_q - q)`.
    ///
    /// `max_q` is taken over the actions already recorded for this same state
    /// key, not a genuine successor state: trades close asynchronously, so no
    /// successor observation exists at update time (see DESIGN.md).
    pub fn update(&mut self, state: StateKey, action: ActionKey, reward: f64) -> f64 {
        self.touch_seq += 1;
        let actions = self.states.entry(state).or_default();
        if !actions.contains_key(&action) {
            actions.insert(action, ValueEntry::default());
            self.entry_count += 1;
        }

        // Includes the freshly inserted 0.0 entry, and stays negative when
        // every recorded action for this state is negative.
        let max_same_state_q = actions.values().map(|e| e.q).fold(f64::MIN, f64::max);

        let entry = actions.entry(action).or_default();
        let old = entry.q;
        entry.q = old + self.learning_rate * (reward + self.discount * max_same_state_q - old);
        entry.last_touched = self.touch_seq;
        let new_q = entry.q;

        debug!(?state, ?action, reward, old_q = old, new_q, "value table updated");

        self.evict_if_over_cap();
        new_q
    }

    /// Positive-value actions for a state, best first, at most two.
    pub fn recommend(&self, state: &StateKey) -> Vec<ActionRecommendation> {
        let Some(actions) = self.states.get(state) else {
            return Vec::new();
        };
        let mut ranked: Vec<ActionRecommendation> = actions
            .iter()
            .filter(|(_, e)| e.q > 0.0)
            .map(|(&action, e)| ActionRecommendation {
                action,
                q_value: e.q,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.q_value
                .partial_cmp(&a.q_value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(2);
        ranked
    }

    pub fn q_value(&self, state: &StateKey, action: &ActionKey) -> Option<f64> {
        self.states.get(state).and_then(|a| a.get(action)).map(|e| e.q)
    }

    pub fn len(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.entry_count = 0;
        self.touch_seq = 0;
    }

    pub(crate) fn entries(&self) -> Vec<ValueSnapshotEntry> {
        let mut rows: Vec<ValueSnapshotEntry> = self
            .states
            .iter()
            .flat_map(|(&state, actions)| {
                actions.iter().map(move |(&action, entry)| ValueSnapshotEntry {
                    state,
                    action,
                    q: entry.q,
                    last_touched: entry.last_touched,
                })
            })
            .collect();
        // Deterministic order for stable snapshots
        rows.sort_by_key(|r| r.last_touched);
        rows
    }

    pub(crate) fn restore(&mut self, rows: Vec<ValueSnapshotEntry>) {
        self.clear();
        for row in rows {
            self.touch_seq = self.touch_seq.max(row.last_touched);
            let actions = self.states.entry(row.state).or_default();
            if actions
                .insert(
                    row.action,
                    ValueEntry {
                        q: row.q,
                        last_touched: row.last_touched,
                    },
                )
                .is_none()
            {
                self.entry_count += 1;
            }
        }
    }

    fn evict_if_over_cap(&mut self) {
        while self.entry_count > self.max_entries {
            let victim = self
                .states
                .iter()
                .flat_map(|(&state, actions)| {
                    actions
                        .iter()
                        .map(move |(&action, entry)| (state, action, entry.last_touched))
                })
                .min_by_key(|&(_, _, touched)| touched);
            let Some((state, action, _)) = victim else {
                break;
            };
            if let Some(actions) = self.states.get_mut(&state) {
                actions.remove(&action);
                self.entry_count -= 1;
                if actions.is_empty() {
                    self.states.remove(&state);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn conditions() -> MarketConditions {
        MarketConditions {
            volatility: 0.4,
            volume_ratio: 1.2,
            sentiment: 0.6,
            regime: Regime::Bull,
            hour: 10,
            price_trend: 0.2,
        }
    }

    fn outcome(profit: f64, confidence: f64, hours_held: i64) -> TradeOutcome {
        let entry = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        TradeOutcome {
            trade_id: "t".into(),
            strategy: "momentum_btc".into(),
            symbol: "BTCUSDT".into(),
            entry_time: entry,
            exit_time: entry + chrono::Duration::hours(hours_held),
            entry_price: 100.0,
            exit_price: 100.0 + profit,
            quantity: 1.0,
            profit_loss: profit,
            confidence,
            conditions: conditions(),
            success: profit > 0.0,
        }
    }

    #[test]
    fn reward_components() {
        // profit 50 → 0.5; success at confidence 80 → +0.4; 2h held → no penalty
        let r = ValueTable::reward(&outcome(50.0, 80.0, 2));
        assert!((r - 0.9).abs() < 1e-9);

        // loss of 30 → -0.3; failure at confidence 60 → -0.3
        let r = ValueTable::reward(&outcome(-30.0, 60.0, 2));
        assert!((r + 0.6).abs() < 1e-9);

        // 30h held → 0.6 penalty on top
        let r = ValueTable::reward(&outcome(50.0, 80.0, 30));
        assert!((r - 0.3).abs() < 1e-9);
    }

    #[test]
    fn reward_is_clipped() {
        assert_eq!(ValueTable::reward(&outcome(100_000.0, 90.0, 1)), 10.0);
        assert_eq!(ValueTable::reward(&outcome(-100_000.0, 90.0, 1)), -10.0);
    }

    #[test]
    fn first_update_moves_value_toward_reward() {
        let mut table = ValueTable::new(0.1, 0.9, 100);
        let state = StateKey::from_conditions(&conditions());
        let action = ActionKey::new("momentum_btc", 75.0);

        // Fresh entry: q = 0 + 0.1 * (1.0 + 0.9 * 0 - 0) = 0.1
        let q = table.update(state, action, 1.0);
        assert!((q - 0.1).abs() < 1e-9);
    }

    #[test]
    fn bootstrap_uses_max_over_same_state_actions() {
        let mut table = ValueTable::new(0.1, 0.9, 100);
        let state = StateKey::from_conditions(&conditions());
        let a1 = ActionKey::new("momentum_btc", 75.0);
        let a2 = ActionKey::new("scalping_btc", 55.0);

        table.update(state, a1, 5.0); // q(a1) = 0.5
        // a2 bootstraps off max(q(a1), 0) = 0.5:
        // q(a2) = 0 + 0.1 * (1.0 + 0.9 * 0.5 - 0) = 0.145
        let q = table.update(state, a2, 1.0);
        assert!((q - 0.145).abs() < 1e-9);
    }

    #[test]
    fn negative_values_bootstrap_without_a_floor() {
        let mut table = ValueTable::new(0.1, 0.9, 100);
        let state = StateKey::from_conditions(&conditions());
        let action = ActionKey::new("momentum_btc", 75.0);

        // q1 = 0 + 0.1 * (-5 + 0.9 * 0 - 0) = -0.5
        let q1 = table.update(state, action, -5.0);
        assert!((q1 + 0.5).abs() < 1e-9);

        // The bootstrap term stays negative for a losing state:
        // q2 = -0.5 + 0.1 * (-5 + 0.9 * -0.5 - -0.5) = -0.995
        let q2 = table.update(state, action, -5.0);
        assert!((q2 + 0.995).abs() < 1e-9, "q2 was {q2}");
    }

    #[test]
    fn recommendations_are_positive_sorted_capped() {
        let mut table = ValueTable::new(0.5, 0.9, 100);
        let state = StateKey::from_conditions(&conditions());
        table.update(state, ActionKey::new("momentum", 75.0), 4.0);
        table.update(state, ActionKey::new("breakout", 65.0), 2.0);
        table.update(state, ActionKey::new("scalping", 55.0), 1.0);
        table.update(state, ActionKey::new("grid", 45.0), -5.0);

        let recs = table.recommend(&state);
        assert_eq!(recs.len(), 2);
        assert!(recs[0].q_value >= recs[1].q_value);
        assert!(recs.iter().all(|r| r.q_value > 0.0));
        assert_eq!(recs[0].action.strategy, StrategyClass::Momentum);
    }

    #[test]
    fn eviction_caps_entry_count() {
        let mut table = ValueTable::new(0.1, 0.9, 3);
        let state = StateKey::from_conditions(&conditions());
        for (i, name) in ["momentum", "mean_reversion", "breakout", "scalping"]
            .iter()
            .enumerate()
        {
            table.update(state, ActionKey::new(name, 10.0 * i as f64), 1.0);
        }
        assert_eq!(table.len(), 3);
        // The first-touched entry was evicted
        assert!(table
            .q_value(&state, &ActionKey::new("momentum", 0.0))
            .is_none());
    }

    #[test]
    fn snapshot_round_trip_preserves_values() {
        let mut table = ValueTable::new(0.1, 0.9, 100);
        let state = StateKey::from_conditions(&conditions());
        let action = ActionKey::new("momentum_btc", 75.0);
        table.update(state, action, 3.0);
        table.update(state, action, 3.0);

        let rows = table.entries();
        let mut restored = ValueTable::new(0.1, 0.9, 100);
        restored.restore(rows);
        assert_eq!(
            restored.q_value(&state, &action),
            table.q_value(&state, &action)
        );
        assert_eq!(restored.len(), table.len());
    }
}
