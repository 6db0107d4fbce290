//! Aggregates the ambient, environment-configurable knobs into one `PipelineConfig`,
//! and assembles a `TradingCore` from it. One `from_env()` per concern, each env var
//! parsed with a typed default via a small `parse_*` helper and `anyhow::Context` on
//! failure.

use crate::application::brain::{AutoConfirmOracle, ConfirmationOracle, DecisionBrain};
use crate::application::market_data::{CandleAggregator, VolumeProfileBuilder};
use crate::application::orchestrator::{OrchestratorConfig, TradingCore};
use crate::application::position::{PaperFillSimulator, PositionManager, SimulatorConfig};
use crate::application::signals::detectors::macd::MacdConfig;
use crate::application::signals::detectors::momentum::MomentumConfig;
use crate::application::signals::detectors::prev_day_vp::PrevDayVpConfig;
use crate::application::signals::detectors::rsi::RsiConfig;
use crate::application::signals::detectors::volume_profile::VolumeProfileConfig;
use crate::application::signals::detectors::{Macd, Momentum, PrevDayVp, Rsi, SignalDetector, VolumeProfile};
use crate::application::signals::{AggregatorConfig, SignalAggregator, SignalValidator, ValidatorConfig};
use crate::domain::strategy::Strategy;
use crate::domain::trading::fees::FeeSchedule;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::sync::Arc;

/// Per-detector knobs, each defaulting to values tuned for 5-minute candles.
#[derive(Debug, Clone, Copy)]
pub struct DetectorConfigs {
    pub momentum: MomentumConfig,
    pub rsi: RsiConfig,
    pub macd: MacdConfig,
    pub volume_profile: VolumeProfileConfig,
    pub prev_day_vp: PrevDayVpConfig,
}

impl Default for DetectorConfigs {
    fn default() -> Self {
        Self {
            momentum: MomentumConfig::default(),
            rsi: RsiConfig::default(),
            macd: MacdConfig::default(),
            volume_profile: VolumeProfileConfig::default(),
            prev_day_vp: PrevDayVpConfig::default(),
        }
    }
}

/// Everything the orchestrator and its collaborators need, short of the `Strategy` itself
/// (which carries per-run signal weights and risk parameters and is supplied separately —
/// a strategy is a policy choice, not ambient infrastructure).
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub candle_interval_seconds: i64,
    pub max_candles: usize,
    pub min_candles_for_signals: usize,
    pub volume_profile_enabled: bool,
    pub volume_profile_tick_size: Decimal,
    pub volume_profile_session_length_seconds: i64,
    pub detectors: DetectorConfigs,
    pub aggregator: AggregatorConfig,
    pub validator: ValidatorConfig,
    pub fees: FeeSchedule,
    pub starting_balance: Decimal,
    pub max_position_size_pct: f64,
    pub atr_period: usize,
    pub equity_sample_every_candles: usize,
    pub outcome_lookahead_candles: usize,
    pub outcome_move_threshold_pct: f64,
    /// Used to annualise the Sharpe ratio at `finish()`; 365*24*12 for 5-minute candles,
    /// 252 for a daily-bar equity curve, etc. Not validated here — the orchestrator just
    /// plugs it into `sqrt(periods_per_year / N)`.
    pub periods_per_year: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        use rust_decimal_macros::dec;
        Self {
            candle_interval_seconds: 60,
            max_candles: 100,
            min_candles_for_signals: 50,
            volume_profile_enabled: true,
            volume_profile_tick_size: dec!(1),
            volume_profile_session_length_seconds: 86_400,
            detectors: DetectorConfigs::default(),
            aggregator: AggregatorConfig::default(),
            validator: ValidatorConfig::default(),
            fees: FeeSchedule::default(),
            starting_balance: dec!(10000),
            max_position_size_pct: 0.25,
            atr_period: 14,
            equity_sample_every_candles: 10,
            outcome_lookahead_candles: 10,
            outcome_move_threshold_pct: 0.1,
            periods_per_year: 365.0 * 24.0 * 60.0,
        }
    }
}

impl PipelineConfig {
    /// Loads overrides from environment variables, falling back to `Default::default()`
    /// for anything unset. Only the scalar ambient knobs are env-configurable; per-coin
    /// session state (the `Strategy`, detector-parameter structs) is expected to come from
    /// a caller-constructed value.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            candle_interval_seconds: Self::parse_i64(
                "CANDLE_INTERVAL_SECONDS",
                defaults.candle_interval_seconds,
            )?,
            max_candles: Self::parse_usize("MAX_CANDLES", defaults.max_candles)?,
            min_candles_for_signals: Self::parse_usize(
                "MIN_CANDLES_FOR_SIGNALS",
                defaults.min_candles_for_signals,
            )?,
            volume_profile_enabled: Self::parse_bool(
                "VOLUME_PROFILE_ENABLED",
                defaults.volume_profile_enabled,
            ),
            atr_period: Self::parse_usize("ATR_PERIOD", defaults.atr_period)?,
            equity_sample_every_candles: Self::parse_usize(
                "EQUITY_SAMPLE_EVERY_CANDLES",
                defaults.equity_sample_every_candles,
            )?,
            outcome_lookahead_candles: Self::parse_usize(
                "OUTCOME_LOOKAHEAD_CANDLES",
                defaults.outcome_lookahead_candles,
            )?,
            outcome_move_threshold_pct: Self::parse_f64(
                "OUTCOME_MOVE_THRESHOLD_PCT",
                defaults.outcome_move_threshold_pct,
            )?,
            max_position_size_pct: Self::parse_f64(
                "MAX_POSITION_SIZE_PCT",
                defaults.max_position_size_pct,
            )?,
            periods_per_year: Self::parse_f64("PERIODS_PER_YEAR", defaults.periods_per_year)?,
            ..defaults
        })
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("failed to parse {key}"))
    }

    fn parse_i64(key: &str, default: i64) -> Result<i64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<i64>()
            .context(format!("failed to parse {key}"))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("failed to parse {key}"))
    }

    fn parse_bool(key: &str, default: bool) -> bool {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<bool>()
            .unwrap_or(default)
    }

    fn detectors(&self) -> Vec<Box<dyn SignalDetector + Send>> {
        vec![
            Box::new(Momentum::new(self.detectors.momentum)),
            Box::new(Rsi::new(self.detectors.rsi)),
            Box::new(Macd::new(self.detectors.macd)),
            Box::new(VolumeProfile::new(self.detectors.volume_profile)),
            Box::new(PrevDayVp::new(self.detectors.prev_day_vp)),
        ]
    }

    /// Assembles a fresh `TradingCore` wired up to run `strategy` behind `oracle`. Every
    /// collaborator (candle aggregator, VP builder, signal aggregator/validator, brain,
    /// position manager) is freshly constructed — a `PipelineConfig` is a recipe, not a
    /// running instance, so it can build multiple independent cores (e.g. one per coin, or
    /// one per parameter sweep).
    pub fn build(&self, strategy: Strategy, oracle: Arc<dyn ConfirmationOracle>) -> TradingCore {
        let candle_aggregator = CandleAggregator::new(self.candle_interval_seconds, self.max_candles);
        let vp_builder = self.volume_profile_enabled.then(|| {
            VolumeProfileBuilder::new(
                self.volume_profile_session_length_seconds,
                self.volume_profile_tick_size,
            )
        });
        let signal_aggregator = SignalAggregator::new(self.detectors(), self.aggregator);
        let validator = SignalValidator::new(self.validator);
        let brain = DecisionBrain::new(strategy, oracle);
        let simulator = PaperFillSimulator::new(SimulatorConfig {
            starting_balance: self.starting_balance,
            fees: self.fees,
            max_position_size_pct: self.max_position_size_pct,
        });
        let positions = PositionManager::new(simulator);

        let orchestrator_config = OrchestratorConfig {
            min_candles_for_signals: self.min_candles_for_signals,
            equity_sample_every_candles: self.equity_sample_every_candles,
            atr_period: self.atr_period,
            outcome_lookahead_candles: self.outcome_lookahead_candles,
            outcome_move_threshold_pct: self.outcome_move_threshold_pct,
        };

        TradingCore::new(
            orchestrator_config,
            candle_aggregator,
            vp_builder,
            signal_aggregator,
            validator,
            brain,
            positions,
        )
    }

    /// Convenience over `build` for runs that don't need a custom oracle.
    pub fn build_with_default_oracle(&self, strategy: Strategy) -> TradingCore {
        self.build(strategy, Arc::new(AutoConfirmOracle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::RiskConfig;
    use crate::domain::trading::types::SignalType;
    use std::collections::HashMap;

    fn strategy() -> Strategy {
        let mut weights = HashMap::new();
        weights.insert(SignalType::Rsi, 1.0);
        Strategy::new(
            "s",
            weights,
            0.5,
            0.1,
            5,
            RiskConfig {
                max_position_pct: 10.0,
                stop_loss_atr_mult: 1.5,
                take_profit_atr_mult: 3.0,
                trail_activation_pct: 0.5,
                trail_distance_pct: 0.3,
            },
        )
        .unwrap()
    }

    #[test]
    fn default_config_builds_a_core() {
        let config = PipelineConfig::default();
        let core = config.build_with_default_oracle(strategy());
        assert_eq!(core.equity_curve().len(), 0);
    }

    #[test]
    fn vp_disabled_skips_the_builder() {
        let mut config = PipelineConfig::default();
        config.volume_profile_enabled = false;
        // Building should not panic even with VP off; the detector just never fires.
        let _core = config.build_with_default_oracle(strategy());
    }
}
