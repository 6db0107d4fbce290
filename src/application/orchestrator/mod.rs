//! `TradingCore`: the single-writer-per-instrument event loop. Owns every piece of
//! per-instrument state — candle buffer, detectors (via the aggregator), validator,
//! brain, position manager, simulator — and drives them in lockstep from one ordered
//! stream of `MarketEvent`s. The same loop runs under a backtest or a live event source.

pub mod metrics;

pub use metrics::{calculate as calculate_metrics, BacktestMetrics};

use crate::application::indicators::atr_value;
use crate::application::market_data::{CandleAggregator, VolumeProfileBuilder};
use crate::application::position::PositionManager;
use crate::application::signals::detectors::prev_day_vp::PrevDayLevels;
use crate::application::signals::{SignalAggregator, SignalValidator};
use crate::application::brain::DecisionBrain;
use crate::domain::errors::PipelineError;
use crate::domain::trading::types::{
    BreakoutDirection, Candle, Direction, EquityPoint, MarketContext, MarketEvent, Signal, TradeAction,
};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tracing::info;

/// Knobs that govern the loop itself rather than any one collaborator (those carry
/// their own config structs, assembled by `config::PipelineConfig`).
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorConfig {
    pub min_candles_for_signals: usize,
    pub equity_sample_every_candles: usize,
    pub atr_period: usize,
    /// Candles after a signal fires before its outcome is graded. Approximates an
    /// ex-post breakout-match analysis with a fixed-horizon price comparison.
    pub outcome_lookahead_candles: usize,
    /// Minimum fractional price move to call a graded outcome UP/DOWN rather than
    /// ambiguous (and thus silently dropped, ungraded).
    pub outcome_move_threshold_pct: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            min_candles_for_signals: 50,
            equity_sample_every_candles: 10,
            atr_period: 14,
            outcome_lookahead_candles: 10,
            outcome_move_threshold_pct: 0.1,
        }
    }
}

struct PendingOutcome {
    signal: Signal,
    price_at_signal: Decimal,
    candle_index_at_signal: usize,
}

pub struct TradingCore {
    config: OrchestratorConfig,
    candle_aggregator: CandleAggregator,
    vp_builder: Option<VolumeProfileBuilder>,
    signal_aggregator: SignalAggregator,
    validator: SignalValidator,
    brain: DecisionBrain,
    positions: PositionManager,
    initial_balance: Decimal,
    last_prices: HashMap<String, Decimal>,
    last_timestamp: i64,
    candle_counts: HashMap<String, usize>,
    candles_since_sample: usize,
    equity_curve: Vec<EquityPoint>,
    pending_outcomes: HashMap<String, VecDeque<PendingOutcome>>,
}

impl TradingCore {
    pub fn new(
        config: OrchestratorConfig,
        candle_aggregator: CandleAggregator,
        vp_builder: Option<VolumeProfileBuilder>,
        signal_aggregator: SignalAggregator,
        validator: SignalValidator,
        brain: DecisionBrain,
        positions: PositionManager,
    ) -> Self {
        let initial_balance = positions.simulator().balance();
        Self {
            config,
            candle_aggregator,
            vp_builder,
            signal_aggregator,
            validator,
            brain,
            positions,
            initial_balance,
            last_prices: HashMap::new(),
            candle_counts: HashMap::new(),
            candles_since_sample: 0,
            equity_curve: Vec::new(),
            pending_outcomes: HashMap::new(),
        }
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn positions(&self) -> &PositionManager {
        &self.positions
    }

    /// Feeds one market event through candle aggregation, detection, decision, and
    /// exit-checking, in that order.
    pub async fn on_event(&mut self, event: &MarketEvent) -> Result<(), PipelineError> {
        let coin = event.coin().to_string();
        let now = event.timestamp();

        let (price, volume) = match event {
            MarketEvent::TradeTick { price, size, side, .. } => {
                if let Some(builder) = self.vp_builder.as_mut() {
                    if let Some(completed) = builder.record_trade(&coin, *price, *size, *side, now) {
                        self.push_prev_day_levels(&completed);
                    }
                    if let Some(snapshot) = builder.snapshot(&coin).cloned() {
                        self.signal_aggregator.set_volume_profile(snapshot);
                    }
                }
                (*price, *size)
            }
            MarketEvent::PriceUpdate { close, volume, .. } => (*close, *volume),
        };
        self.last_prices.insert(coin.clone(), price);

        if let Some(candle) = self.candle_aggregator.add_tick(&coin, price, volume, now)? {
            self.on_finalised_candle(&coin, &candle).await;
        }

        self.positions.check_exits(&self.last_prices, now);
        self.maybe_sample_equity(now);
        Ok(())
    }

    fn push_prev_day_levels(&mut self, completed_session: &crate::domain::trading::types::VolumeProfile) {
        use crate::application::indicators::volume_profile::{poc, value_area};
        let Some(poc_price) = poc(completed_session) else { return };
        let Some((val, vah)) = value_area(completed_session, 0.7) else { return };
        let (Some(poc_f), Some(vah_f), Some(val_f)) = (poc_price.to_f64(), vah.to_f64(), val.to_f64()) else {
            return;
        };
        self.signal_aggregator.set_prev_day_levels(PrevDayLevels {
            poc: poc_f,
            vah: vah_f,
            val: val_f,
        });
    }

    async fn on_finalised_candle(&mut self, coin: &str, candle: &Candle) {
        let count = self.candle_counts.entry(coin.to_string()).or_insert(0);
        *count += 1;
        let candle_index = *count;

        self.grade_pending_outcomes(coin, candle, candle_index);

        if candle_index < self.config.min_candles_for_signals {
            return;
        }

        let candles = self.candle_aggregator.buffer(coin);
        let fresh_signals = self.signal_aggregator.process_candle(coin, &candles);
        let passed: Vec<Signal> = fresh_signals.into_iter().filter(|s| self.validator.should_pass(s)).collect();
        for signal in &passed {
            self.pending_outcomes.entry(coin.to_string()).or_default().push_back(PendingOutcome {
                signal: signal.clone(),
                price_at_signal: candle.close,
                candle_index_at_signal: candle_index,
            });
        }

        if passed.is_empty() || self.positions.has_position(coin) {
            return;
        }

        let atr = atr_value(&candles, self.config.atr_period).and_then(Decimal::from_f64).unwrap_or(Decimal::ZERO);
        let context = MarketContext::new(coin, candle.close, atr);
        let positions_snapshot = self.positions.positions_snapshot();
        let plan = self.brain.evaluate(&passed, &positions_snapshot, &context).await;

        if matches!(plan.action, TradeAction::Long | TradeAction::Short) {
            match self.positions.open_from_plan(&plan, candle.close, candle.timestamp) {
                Ok(opened) => info!(coin, side = ?opened.position.side, "orchestrator: opened position from plan"),
                Err(err) => info!(coin, %err, "orchestrator: plan rejected by position manager"),
            }
        }
    }

    /// Compares the latest close against the price at signal time; grades UP/DOWN once
    /// `outcome_lookahead_candles` have elapsed, or drops the outcome if the move was too
    /// small to call unambiguously.
    fn grade_pending_outcomes(&mut self, coin: &str, candle: &Candle, candle_index: usize) {
        let Some(queue) = self.pending_outcomes.get_mut(coin) else { return };
        while let Some(front) = queue.front() {
            if candle_index - front.candle_index_at_signal < self.config.outcome_lookahead_candles {
                break;
            }
            let pending = queue.pop_front().expect("front() just confirmed Some");
            let Some(price_at_signal) = pending.price_at_signal.to_f64() else { continue };
            let Some(close) = candle.close.to_f64() else { continue };
            if price_at_signal == 0.0 {
                continue;
            }
            let move_pct = (close - price_at_signal) / price_at_signal * 100.0;
            let direction = if move_pct >= self.config.outcome_move_threshold_pct {
                Some(BreakoutDirection::Up)
            } else if move_pct <= -self.config.outcome_move_threshold_pct {
                Some(BreakoutDirection::Down)
            } else {
                None
            };
            if let Some(direction) = direction {
                self.validator.record_outcome(&pending.signal, Some(direction));
            }
        }
    }

    fn maybe_sample_equity(&mut self, now: i64) {
        self.candles_since_sample += 1;
        if self.candles_since_sample < self.config.equity_sample_every_candles {
            return;
        }
        self.candles_since_sample = 0;
        let equity = self.positions.equity(&self.last_prices);
        let balance = self.positions.simulator().balance();
        self.equity_curve.push(EquityPoint {
            timestamp: now,
            equity,
            balance,
            positions_value: equity - balance,
        });
    }

    /// Closes every open position at the last observed prices and aggregates the
    /// end-of-run metrics.
    pub fn finish(&mut self, periods_per_year: f64) -> BacktestMetrics {
        let last_prices = self.last_prices.clone();
        let shutdown_time = last_prices.values().next().map(|_| 0).unwrap_or(0);
        self.positions.close_all(&last_prices, shutdown_time);

        let equity = self.positions.equity(&last_prices);
        let balance = self.positions.simulator().balance();
        self.equity_curve.push(EquityPoint {
            timestamp: shutdown_time,
            equity,
            balance,
            positions_value: equity - balance,
        });

        calculate_metrics(
            self.positions.simulator().trade_history(),
            &self.equity_curve,
            self.initial_balance,
            balance,
            periods_per_year,
        )
    }
}
