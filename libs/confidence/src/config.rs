//! Engine configuration with contract defaults, JSON file loading,
//! environment overrides, and validation.
//!
//! The scoring breakpoints themselves (risk/reward tiers, volatility band)
//! are part of the scoring contract and live as constants in [`crate::scoring`];
//! this module holds the tunables a deployment may realistically change:
//! blend weights, sample-size gates, window lengths, and table caps.

use serde::{Deserialize, Serialize};

/// Complete configuration for the confidence engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub blending: BlendingConfig,
    pub learning: LearningConfig,
    pub modifiers: ModifierConfig,
}

/// Weights for combining the rule-based score with the optional predictor
/// and the learning adjustment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlendingConfig {
    /// Weight of the rule-based score when a predictor estimate is available.
    pub base_weight: f64,
    /// Weight of the predictor estimate; `base_weight + predictor_weight`
    /// must equal 1.0.
    pub predictor_weight: f64,
    /// Minimum recorded confidence samples before the predictor blend is
    /// allowed to participate.
    pub predictor_min_samples: usize,
    /// Combined learning adjustment (calibration + strategy history) is
    /// clipped to `[-adjustment_clip, adjustment_clip]`.
    pub adjustment_clip: f64,
}

/// Sample-size gates, window lengths, and growth bounds for the learning
/// structures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Temporal-difference learning rate (alpha).
    pub learning_rate: f64,
    /// Temporal-difference discount factor (gamma).
    pub discount: f64,
    /// Calibration bucket must hold at least this many samples before its
    /// correction activates.
    pub calibration_min_samples: u64,
    /// Per-strategy sub-records need this many trades before a pattern
    /// recommendation is emitted.
    pub pattern_min_samples: u64,
    /// Rolling-window trades needed before the recent-performance adjustment
    /// activates.
    pub recent_min_trades: usize,
    /// Regime sub-record trades needed before the regime adjustment activates.
    pub regime_min_trades: u64,
    /// Most-recent-K bound on the trade outcome history.
    pub outcome_history: usize,
    /// Per-strategy rolling window length.
    pub recent_window: usize,
    /// Per-strategy return series length used for the Sharpe-like ratio.
    pub returns_window: usize,
    /// Bound on the recorded confidence history.
    pub confidence_history: usize,
    /// LRU cap on distinct market patterns.
    pub max_patterns: usize,
    /// LRU cap on (state, action) value entries.
    pub max_value_entries: usize,
}

/// Multiplicative modifiers applied after blending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierConfig {
    /// Factor during low-activity hours (02:00-06:00 UTC).
    pub quiet_hours_factor: f64,
    /// Factor during active trading hours (09:00-16:00 UTC).
    pub active_hours_factor: f64,
    /// Boost for compatible regime/strategy pairs.
    pub regime_compat_boost: f64,
    /// Damping for scalping in volatile regimes.
    pub regime_compat_damp: f64,
    /// Stop-loss distance (fraction of price) above which the penalty applies.
    pub stop_distance_threshold: f64,
    /// Penalty factor for wide stop-losses.
    pub wide_stop_penalty: f64,
    /// Conservatism factor applied to externally-triggered signals.
    pub external_signal_factor: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blending: BlendingConfig::default(),
            learning: LearningConfig::default(),
            modifiers: ModifierConfig::default(),
        }
    }
}

impl Default for BlendingConfig {
    fn default() -> Self {
        Self {
            base_weight: 0.6,
            predictor_weight: 0.4,
            predictor_min_samples: 50,
            adjustment_clip: 20.0,
        }
    }
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount: 0.9,
            calibration_min_samples: 10,
            pattern_min_samples: 3,
            recent_min_trades: 5,
            regime_min_trades: 3,
            outcome_history: 1000,
            recent_window: 20,
            returns_window: 100,
            confidence_history: 1000,
            max_patterns: 5000,
            max_value_entries: 10_000,
        }
    }
}

impl Default for ModifierConfig {
    fn default() -> Self {
        Self {
            quiet_hours_factor: 0.9,
            active_hours_factor: 1.05,
            regime_compat_boost: 1.1,
            regime_compat_damp: 0.9,
            stop_distance_threshold: 0.05,
            wide_stop_penalty: 0.95,
            external_signal_factor: 0.8,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment variable overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(samples) = std::env::var("ARGOS_PREDICTOR_MIN_SAMPLES") {
            if let Ok(value) = samples.parse::<usize>() {
                config.blending.predictor_min_samples = value;
            }
        }

        if let Ok(cap) = std::env::var("ARGOS_MAX_PATTERNS") {
            if let Ok(value) = cap.parse::<usize>() {
                config.learning.max_patterns = value;
            }
        }

        if let Ok(cap) = std::env::var("ARGOS_MAX_VALUE_ENTRIES") {
            if let Ok(value) = cap.parse::<usize>() {
                config.learning.max_value_entries = value;
            }
        }

        if let Ok(history) = std::env::var("ARGOS_OUTCOME_HISTORY") {
            if let Ok(value) = history.parse::<usize>() {
                config.learning.outcome_history = value;
            }
        }

        config
    }

    /// Save configuration to a JSON file.
    pub fn save_to_file(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> anyhow::Result<()> {
        let weight_sum = self.blending.base_weight + self.blending.predictor_weight;
        if (weight_sum - 1.0).abs() > 1e-9 {
            anyhow::bail!("base_weight + predictor_weight must equal 1.0, got {weight_sum}");
        }

        if self.blending.adjustment_clip < 0.0 {
            anyhow::bail!("adjustment_clip must be non-negative");
        }

        if !(0.0..=1.0).contains(&self.learning.learning_rate) {
            anyhow::bail!("learning_rate must be within [0,1]");
        }

        if !(0.0..=1.0).contains(&self.learning.discount) {
            anyhow::bail!("discount must be within [0,1]");
        }

        if self.learning.outcome_history == 0 {
            anyhow::bail!("outcome_history must be positive");
        }

        if self.learning.max_patterns == 0 || self.learning.max_value_entries == 0 {
            anyhow::bail!("learning table caps must be positive");
        }

        for (name, factor) in [
            ("quiet_hours_factor", self.modifiers.quiet_hours_factor),
            ("active_hours_factor", self.modifiers.active_hours_factor),
            ("regime_compat_boost", self.modifiers.regime_compat_boost),
            ("regime_compat_damp", self.modifiers.regime_compat_damp),
            ("wide_stop_penalty", self.modifiers.wide_stop_penalty),
            ("external_signal_factor", self.modifiers.external_signal_factor),
        ] {
            if factor <= 0.0 || !factor.is_finite() {
                anyhow::bail!("{name} must be a positive finite factor");
            }
        }

        Ok(())
    }
}
