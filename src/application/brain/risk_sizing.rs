//! Dynamic risk sizing: a pure, table-driven function of signal strength, oracle
//! confidence, and volatility. Stronger signals get tighter stops, not just bigger size.

use crate::domain::strategy::RiskConfig;
use crate::domain::trading::types::VolatilityLevel;

#[derive(Debug, Clone, Copy)]
pub struct SizingResult {
    pub position_pct: f64,
    pub stop_multiplier: f64,
    pub tp_multiplier: f64,
}

fn volatility_factor(level: VolatilityLevel) -> f64 {
    match level {
        VolatilityLevel::Low => 1.0,
        VolatilityLevel::Medium => 0.8,
        VolatilityLevel::High => 0.6,
    }
}

/// `avg_strength` is the weight-averaged signal strength; `confidence` is the oracle's
/// `[1,10]` confidence. Position is clamped to `risk.max_position_pct`.
pub fn calculate_dynamic_risk(avg_strength: f64, confidence: u8, volatility: VolatilityLevel, risk: &RiskConfig) -> SizingResult {
    let base_position = risk.max_position_pct;
    let base_stop = risk.stop_loss_atr_mult;
    let base_tp = risk.take_profit_atr_mult;
    let vol_factor = volatility_factor(volatility);

    let (pos_factor, stop_factor, tp_factor) = if avg_strength >= 0.8 {
        (0.7, 0.4, 1.0)
    } else if avg_strength >= 0.5 {
        (0.5, 0.5, 1.0)
    } else {
        (0.3, 0.6, 0.9)
    };

    let mut position_pct = base_position * pos_factor * vol_factor;
    let conf_factor = (confidence as f64 - 5.0).max(0.0) / 5.0;
    position_pct *= 1.0 + conf_factor * 0.2;
    position_pct = position_pct.min(risk.max_position_pct);

    SizingResult {
        position_pct,
        stop_multiplier: base_stop * stop_factor,
        tp_multiplier: base_tp * tp_factor,
    }
}
