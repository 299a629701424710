//! # Confidence Engine - Scoring Pipeline & Outcome Fan-out
//!
//! ## Purpose
//!
//! Orchestrates the full scoring pipeline (feature extraction, rule-based
//! score, optional predictor blend, learning adjustment, contextual
//! modifiers) and closes the feedback loop by fanning every trade outcome
//! out to the calibration tracker, pattern memory, value table, and
//! per-strategy statistics.
//!
//! ## Integration Points
//!
//! - **Input Sources**: validated snapshots and candidates from collectors
//!   and strategy generators; closed outcomes from the execution layer
//! - **Output Destinations**: bounded confidence for decision generators;
//!   merged pattern/value recommendations; learning metrics for dashboards
//! - **State Dependencies**: one `LearningState` behind a `parking_lot`
//!   RwLock; scoring takes read locks, outcome recording takes the write lock
//! - **Persistence**: snapshot pushed to the injected `StateStore` after each
//!   recorded outcome; failures are logged and never reach the caller
//!
//! ## Architecture Role
//!
//! ```text
//! StrategyCandidate ─┐
//! MarketSnapshot ────┼→ [extract] → [base score] → [blend] → [adjust] → [modify] → [0,100]
//! LearningState ─────┘                                ↑            ↑
//!                                              predictor seam  calibration +
//! TradeOutcome → [validate] → [fan-out] ──────────────────────  strategy history
//! ```

use chrono::{DateTime, Timelike, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use types::{MarketConditions, MarketSnapshot, Regime, StrategyCandidate, TradeOutcome,
    ValidationError};

use crate::config::EngineConfig;
use crate::features::FeatureExtractor;
use crate::predictor::ConfidencePredictor;
use crate::scoring::base_confidence;
use crate::state::{LearningState, LearningStateSnapshot, StateStore};
use crate::value_table::{ActionKey, StateKey, ValueTable};

/// Synthetic strategy name used when validating externally-triggered signals.
const EXTERNAL_SIGNAL_NAME: &str = "external_signal";

/// Expected holding period assumed for external signals, minutes.
const EXTERNAL_SIGNAL_DURATION_MIN: f64 = 30.0;

/// Where a recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    PatternMemory,
    ValueTable,
}

/// A strategy suggestion derived from learned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub strategy: String,
    pub confidence_adjustment: f64,
    pub expected_profit: Option<f64>,
    pub sample_size: Option<u64>,
    pub q_value: Option<f64>,
    pub source: RecommendationSource,
}

/// Distribution of recently recorded confidences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceDistribution {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

/// Aggregate view over all learned structures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningMetrics {
    pub strategies: Vec<crate::performance::StrategySummary>,
    pub patterns: Vec<crate::patterns::PatternSummary>,
    pub calibration: Vec<crate::calibration::CalibrationSummary>,
    pub overall: Option<OverallSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallSummary {
    pub total_trades: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    pub avg_profit_per_trade: f64,
}

/// The orchestrator. One instance owns the learning state for a trading
/// session; scoring is read-mostly, outcome recording is write-serialized.
pub struct ConfidenceEngine {
    config: EngineConfig,
    state: RwLock<LearningState>,
    predictor: Option<Box<dyn ConfidencePredictor>>,
    store: Option<Box<dyn StateStore>>,
}

impl ConfidenceEngine {
    pub fn new(config: EngineConfig) -> Self {
        let state = LearningState::new(&config.learning);
        Self {
            config,
            state: RwLock::new(state),
            predictor: None,
            store: None,
        }
    }

    /// Inject an optional trained predictor for the blended estimate.
    pub fn with_predictor(mut self, predictor: Box<dyn ConfidencePredictor>) -> Self {
        self.predictor = Some(predictor);
        self
    }

    /// Attach a state store and load prior learning state from it. A failed
    /// load logs and starts from empty defaults; it never propagates.
    pub fn with_store(mut self, store: Box<dyn StateStore>) -> Self {
        match store.load() {
            Ok(Some(snapshot)) => {
                match LearningState::from_snapshot(snapshot, &self.config.learning) {
                    Ok(state) => {
                        info!(
                            strategies = state.strategies.len(),
                            patterns = state.patterns.len(),
                            values = state.values.len(),
                            "🧠 restored learning state"
                        );
                        self.state = RwLock::new(state);
                    }
                    Err(e) => {
                        warn!(error = %e, "stored learning state unusable, starting fresh");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "loading learning state failed, starting fresh");
            }
        }
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Confidence for a candidate strategy at the current wall-clock time.
    pub fn calculate(
        &self,
        strategy: &StrategyCandidate,
        snapshot: &MarketSnapshot,
    ) -> Result<f64, ValidationError> {
        self.calculate_at(strategy, snapshot, Utc::now())
    }

    /// Confidence for a candidate strategy at an explicit decision time.
    /// Deterministic: identical inputs always produce identical output.
    pub fn calculate_at(
        &self,
        strategy: &StrategyCandidate,
        snapshot: &MarketSnapshot,
        when: DateTime<Utc>,
    ) -> Result<f64, ValidationError> {
        self.calculate_inner(strategy, snapshot, when, true)
    }

    fn calculate_inner(
        &self,
        strategy: &StrategyCandidate,
        snapshot: &MarketSnapshot,
        when: DateTime<Utc>,
        use_history: bool,
    ) -> Result<f64, ValidationError> {
        strategy.validate()?;
        snapshot.validate()?;

        let (blended, adjustment) = {
            let state = self.state.read();

            let performance = if use_history {
                state.strategies.get(&strategy.name)
            } else {
                None
            };

            let features = FeatureExtractor::extract(strategy, snapshot, performance, when);
            let base = base_confidence(&features);

            // Predictor blend, gated on recorded history
            let blended = match &self.predictor {
                Some(predictor)
                    if state.confidence_history.len()
                        >= self.config.blending.predictor_min_samples =>
                {
                    match predictor.predict(&features) {
                        Some(estimate) => {
                            let estimate = estimate.clamp(0.0, 100.0);
                            debug!(base, estimate, "blending predictor estimate");
                            base * self.config.blending.base_weight
                                + estimate * self.config.blending.predictor_weight
                        }
                        None => base,
                    }
                }
                _ => base,
            };

            // Learning adjustment: calibration nudge plus the strategy's
            // recent and regime track record, jointly clipped.
            let clip = self.config.blending.adjustment_clip;
            let mut adjustment = state
                .calibration
                .correction_for(blended, self.config.learning.calibration_min_samples);
            if let Some(perf) = performance {
                adjustment += perf.recent_adjustment(self.config.learning.recent_min_trades);
                adjustment +=
                    perf.regime_adjustment(snapshot.regime, self.config.learning.regime_min_trades);
            }
            (blended, adjustment.clamp(-clip, clip))
        };

        let mut confidence = blended + adjustment;
        confidence = self.apply_modifiers(confidence, strategy, snapshot, when);
        let final_confidence = confidence.clamp(0.0, 100.0);

        debug!(
            strategy = %strategy.name,
            symbol = %snapshot.symbol,
            blended,
            adjustment,
            final_confidence,
            "confidence calculated"
        );

        // Mutating the shared history is write-serialized like every other
        // state update.
        {
            let mut state = self.state.write();
            state.confidence_history.push_back(final_confidence);
            while state.confidence_history.len() > self.config.learning.confidence_history {
                state.confidence_history.pop_front();
            }
        }

        Ok(final_confidence)
    }

    /// Multiplicative context modifiers: time of day, regime/strategy
    /// compatibility, stop-loss width.
    fn apply_modifiers(
        &self,
        mut confidence: f64,
        strategy: &StrategyCandidate,
        snapshot: &MarketSnapshot,
        when: DateTime<Utc>,
    ) -> f64 {
        let modifiers = &self.config.modifiers;

        let hour = when.hour();
        if (2..=6).contains(&hour) {
            confidence *= modifiers.quiet_hours_factor;
        } else if (9..=16).contains(&hour) {
            confidence *= modifiers.active_hours_factor;
        }

        let name = strategy.name.to_lowercase();
        let compatible = match snapshot.regime {
            Regime::Bull => name.contains("momentum"),
            Regime::Bear => name.contains("short"),
            Regime::Sideways => name.contains("mean_reversion"),
            Regime::Volatile => false,
        };
        if compatible {
            confidence *= modifiers.regime_compat_boost;
        } else if snapshot.regime == Regime::Volatile && name.contains("scalping") {
            confidence *= modifiers.regime_compat_damp;
        }

        if let Some(stop_loss) = strategy.stop_loss {
            let stop_distance = (snapshot.price - stop_loss).abs() / snapshot.price;
            if stop_distance > modifiers.stop_distance_threshold {
                confidence *= modifiers.wide_stop_penalty;
            }
        }

        confidence
    }

    /// Score an externally-triggered signal. Runs the normal pipeline under
    /// a synthetic strategy with no performance history, then applies the
    /// conservatism factor for untrusted triggers.
    pub fn validate_external_signal(
        &self,
        signal: &StrategyCandidate,
        snapshot: &MarketSnapshot,
    ) -> Result<f64, ValidationError> {
        self.validate_external_signal_at(signal, snapshot, Utc::now())
    }

    pub fn validate_external_signal_at(
        &self,
        signal: &StrategyCandidate,
        snapshot: &MarketSnapshot,
        when: DateTime<Utc>,
    ) -> Result<f64, ValidationError> {
        signal.validate()?;

        let mut pseudo = StrategyCandidate::new(EXTERNAL_SIGNAL_NAME, signal.action);
        pseudo.risk_reward_ratio = Some(signal.risk_reward_or_default());
        pseudo.expected_duration_min = Some(EXTERNAL_SIGNAL_DURATION_MIN);

        let confidence = self.calculate_inner(&pseudo, snapshot, when, false)?;
        let discounted = confidence * self.config.modifiers.external_signal_factor;

        info!(
            symbol = %snapshot.symbol,
            confidence,
            discounted,
            "external signal validated"
        );
        Ok(discounted.clamp(0.0, 100.0))
    }

    /// Consume one closed trade: updates every learning structure, then
    /// checkpoints to the attached store. Persistence failures are logged
    /// and never surface into the caller's decision path.
    pub fn record_outcome(&self, outcome: TradeOutcome) -> Result<(), ValidationError> {
        outcome.validate()?;

        {
            let mut state = self.state.write();
            let learning = &self.config.learning;

            state
                .strategies
                .entry(outcome.strategy.clone())
                .or_default()
                .record(&outcome, learning.recent_window, learning.returns_window);

            state.calibration.record(outcome.confidence, outcome.success);

            state.patterns.record(
                &outcome.conditions,
                &outcome.strategy,
                outcome.profit_loss,
                outcome.success,
                outcome.confidence,
            );

            let state_key = StateKey::from_conditions(&outcome.conditions);
            let action_key = ActionKey::new(&outcome.strategy, outcome.confidence);
            let reward = ValueTable::reward(&outcome);
            state.values.update(state_key, action_key, reward);

            let cap = learning.outcome_history;
            state.outcomes.push_back(outcome.clone());
            while state.outcomes.len() > cap {
                state.outcomes.pop_front();
            }
        }

        info!(
            trade_id = %outcome.trade_id,
            strategy = %outcome.strategy,
            profit_loss = outcome.profit_loss,
            success = outcome.success,
            "📚 recorded trade outcome"
        );

        self.checkpoint();
        Ok(())
    }

    /// Push the current learning state to the attached store, if any.
    /// Failures are logged; in-memory state is authoritative either way.
    pub fn checkpoint(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let snapshot = self.state.read().snapshot();
        if let Err(e) = store.save(&snapshot) {
            warn!(error = %e, "saving learning state failed, keeping in-memory state");
        }
    }

    /// Merged pattern-memory and value-table suggestions for the given
    /// conditions, pattern hits first.
    pub fn recommendations(&self, conditions: &MarketConditions) -> Vec<Recommendation> {
        let state = self.state.read();
        let mut recommendations = Vec::new();

        for rec in state
            .patterns
            .recommend(conditions, self.config.learning.pattern_min_samples)
        {
            recommendations.push(Recommendation {
                strategy: rec.strategy,
                confidence_adjustment: rec.confidence_adjustment,
                expected_profit: Some(rec.expected_profit),
                sample_size: Some(rec.sample_size),
                q_value: None,
                source: RecommendationSource::PatternMemory,
            });
        }

        let state_key = StateKey::from_conditions(conditions);
        for rec in state.values.recommend(&state_key) {
            recommendations.push(Recommendation {
                strategy: rec.action.strategy.as_str().to_string(),
                confidence_adjustment: rec.q_value * 10.0,
                expected_profit: None,
                sample_size: None,
                q_value: Some(rec.q_value),
                source: RecommendationSource::ValueTable,
            });
        }

        recommendations
    }

    /// Distribution over the last 100 recorded confidences; `None` before
    /// anything was recorded.
    pub fn confidence_distribution(&self) -> Option<ConfidenceDistribution> {
        let state = self.state.read();
        if state.confidence_history.is_empty() {
            return None;
        }
        let recent: Vec<f64> = state
            .confidence_history
            .iter()
            .rev()
            .take(100)
            .copied()
            .collect();
        let n = recent.len() as f64;
        let mean = recent.iter().sum::<f64>() / n;
        let variance = recent.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n;

        let mut sorted = recent.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = if sorted.len() % 2 == 0 {
            (sorted[sorted.len() / 2 - 1] + sorted[sorted.len() / 2]) / 2.0
        } else {
            sorted[sorted.len() / 2]
        };

        Some(ConfidenceDistribution {
            mean,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median,
        })
    }

    /// Aggregate metrics over all learned structures.
    pub fn learning_metrics(&self) -> LearningMetrics {
        let state = self.state.read();

        let mut strategies: Vec<crate::performance::StrategySummary> = state
            .strategies
            .iter()
            .map(|(name, perf)| crate::performance::StrategySummary {
                strategy: name.clone(),
                win_rate: perf.win_rate,
                profit_factor: perf.profit_factor,
                sharpe_ratio: perf.sharpe_ratio,
                total_trades: perf.total_trades,
                avg_profit: perf.avg_profit,
            })
            .collect();
        strategies.sort_by(|a, b| a.strategy.cmp(&b.strategy));

        let overall = if state.outcomes.is_empty() {
            None
        } else {
            let total_trades = state.outcomes.len();
            let total_profit: f64 = state.outcomes.iter().map(|o| o.profit_loss).sum();
            let wins = state.outcomes.iter().filter(|o| o.success).count();
            Some(OverallSummary {
                total_trades,
                win_rate: wins as f64 / total_trades as f64,
                total_profit,
                avg_profit_per_trade: total_profit / total_trades as f64,
            })
        };

        LearningMetrics {
            strategies,
            patterns: state.patterns.summary(5),
            calibration: state.calibration.summary(5),
            overall,
        }
    }

    /// Full snapshot of the learning state for an externally-owned save.
    pub fn snapshot(&self) -> LearningStateSnapshot {
        self.state.read().snapshot()
    }

    /// Drop all learned state. Use with caution.
    pub fn reset(&self) {
        self.state.write().reset();
        warn!("🔄 learning state has been reset");
    }
}
