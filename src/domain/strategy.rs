use crate::domain::errors::PipelineError;
use crate::domain::trading::types::SignalType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ATR-anchored risk parameters for a strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_position_pct: f64,
    pub stop_loss_atr_mult: f64,
    pub take_profit_atr_mult: f64,
    pub trail_activation_pct: f64,
    pub trail_distance_pct: f64,
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let checks: &[(bool, &str)] = &[
            (self.max_position_pct > 0.0, "max_position_pct must be > 0"),
            (
                self.stop_loss_atr_mult > 0.0,
                "stop_loss_atr_mult must be > 0",
            ),
            (
                self.take_profit_atr_mult > 0.0,
                "take_profit_atr_mult must be > 0",
            ),
            (
                self.trail_activation_pct >= 0.0,
                "trail_activation_pct must be >= 0",
            ),
            (
                self.trail_distance_pct > 0.0,
                "trail_distance_pct must be > 0",
            ),
        ];
        for (ok, msg) in checks {
            if !ok {
                return Err(PipelineError::InvalidConfig {
                    reason: msg.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Static, read-only configuration for a run. Rejected at construction if any invariant
/// in the data model is violated.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub name: String,
    pub signal_weights: HashMap<SignalType, f64>,
    pub signal_threshold: f64,
    pub min_signal_strength: f64,
    pub min_confidence: u8,
    pub risk: RiskConfig,
}

impl Strategy {
    pub fn new(
        name: impl Into<String>,
        signal_weights: HashMap<SignalType, f64>,
        signal_threshold: f64,
        min_signal_strength: f64,
        min_confidence: u8,
        risk: RiskConfig,
    ) -> Result<Self, PipelineError> {
        let strategy = Self {
            name: name.into(),
            signal_weights,
            signal_threshold,
            min_signal_strength,
            min_confidence,
            risk,
        };
        strategy.validate()?;
        Ok(strategy)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        for (&ty, &w) in &self.signal_weights {
            if !(0.0..=1.0).contains(&w) {
                return Err(PipelineError::InvalidConfig {
                    reason: format!("signal weight for {ty} must be in [0,1], got {w}"),
                });
            }
        }
        if !(0.0..=2.0).contains(&self.signal_threshold) {
            return Err(PipelineError::InvalidConfig {
                reason: format!(
                    "signal_threshold must be in [0,2], got {}",
                    self.signal_threshold
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.min_signal_strength) {
            return Err(PipelineError::InvalidConfig {
                reason: format!(
                    "min_signal_strength must be in [0,1], got {}",
                    self.min_signal_strength
                ),
            });
        }
        if !(1..=10).contains(&self.min_confidence) {
            return Err(PipelineError::InvalidConfig {
                reason: format!(
                    "min_confidence must be in [1,10], got {}",
                    self.min_confidence
                ),
            });
        }
        self.risk.validate()
    }
}
