//! Candidate strategies proposed by external strategy generators.

use serde::{Deserialize, Serialize};

use crate::{require_finite, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

/// A proposed trade the engine scores. Read-only from the engine's side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyCandidate {
    /// Name doubles as the type tag; classification is by substring match
    /// against a fixed vocabulary (e.g. "momentum_breakout_btc").
    pub name: String,
    pub action: TradeAction,
    /// Absolute stop-loss price, when the generator proposes one.
    #[serde(default)]
    pub stop_loss: Option<f64>,
    /// Absolute take-profit price, when the generator proposes one.
    #[serde(default)]
    pub take_profit: Option<f64>,
    /// Reward over risk; defaults to 1.0 when absent.
    #[serde(default)]
    pub risk_reward_ratio: Option<f64>,
    /// Expected holding period in minutes; defaults to 60 when absent.
    #[serde(default)]
    pub expected_duration_min: Option<f64>,
    #[serde(default)]
    pub risk_level: RiskLevel,
}

impl StrategyCandidate {
    pub fn new(name: impl Into<String>, action: TradeAction) -> Self {
        Self {
            name: name.into(),
            action,
            stop_loss: None,
            take_profit: None,
            risk_reward_ratio: None,
            expected_duration_min: None,
            risk_level: RiskLevel::Medium,
        }
    }

    pub fn risk_reward_or_default(&self) -> f64 {
        self.risk_reward_ratio.unwrap_or(1.0)
    }

    pub fn expected_duration_or_default(&self) -> f64 {
        self.expected_duration_min.unwrap_or(60.0)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyStrategyName);
        }
        if let Some(ratio) = self.risk_reward_ratio {
            require_finite("risk_reward_ratio", ratio)?;
            if ratio <= 0.0 {
                return Err(ValidationError::NonPositiveRiskReward { ratio });
            }
        }
        for (field, value) in [
            ("stop_loss", self.stop_loss),
            ("take_profit", self.take_profit),
            ("expected_duration_min", self.expected_duration_min),
        ] {
            if let Some(v) = value {
                require_finite(field, v)?;
            }
        }
        Ok(())
    }
}
