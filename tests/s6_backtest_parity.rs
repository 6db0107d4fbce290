//! Backtest parity: running an identical event stream through two freshly built cores
//! with the default oracle produces byte-identical trade histories and metrics. Nothing
//! in the pipeline may consult a wall clock or true randomness — determinism follows
//! straight from `TradingCore::on_event` being a pure function of its inputs.

use cryptotrade_core::application::drivers::{run_backtest, VecEventSource};
use cryptotrade_core::config::PipelineConfig;
use cryptotrade_core::domain::strategy::{RiskConfig, Strategy};
use cryptotrade_core::domain::trading::types::{MarketEvent, SignalType};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn strategy() -> Strategy {
    let mut weights = HashMap::new();
    weights.insert(SignalType::Momentum, 1.0);
    weights.insert(SignalType::Rsi, 1.0);
    Strategy::new(
        "parity",
        weights,
        0.2,
        0.05,
        1,
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

/// A choppy series designed to trip both the momentum crossover and RSI threshold
/// detectors more than once, so the two runs being compared actually open and close
/// trades rather than vacuously agreeing on an empty history.
fn event_stream() -> Vec<MarketEvent> {
    let mut events = Vec::new();
    let mut price = 100.0f64;
    let mut ts = 0i64;
    for step in 0..90 {
        let delta = match step % 18 {
            0..=8 => 1.2,
            _ => -1.4,
        };
        price += delta;
        events.push(MarketEvent::PriceUpdate {
            timestamp: ts,
            coin: "BTC".to_string(),
            open: Decimal::from_f64(price).unwrap(),
            high: Decimal::from_f64(price + 0.2).unwrap(),
            low: Decimal::from_f64(price - 0.2).unwrap(),
            close: Decimal::from_f64(price).unwrap(),
            volume: dec!(25),
        });
        ts += 60;
    }
    events
}

fn config() -> PipelineConfig {
    PipelineConfig {
        candle_interval_seconds: 60,
        min_candles_for_signals: 15,
        equity_sample_every_candles: 5,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn identical_event_streams_yield_identical_results() {
    let mut core_a = config().build_with_default_oracle(strategy());
    let mut source_a = VecEventSource::new(event_stream());
    let metrics_a = run_backtest(&mut core_a, &mut source_a, 252.0).await.unwrap();

    let mut core_b = config().build_with_default_oracle(strategy());
    let mut source_b = VecEventSource::new(event_stream());
    let metrics_b = run_backtest(&mut core_b, &mut source_b, 252.0).await.unwrap();

    let trades_a = serde_json::to_string(core_a.positions().simulator().trade_history()).unwrap();
    let trades_b = serde_json::to_string(core_b.positions().simulator().trade_history()).unwrap();
    assert_eq!(trades_a, trades_b, "trade histories must match exactly across identical runs");

    assert_eq!(metrics_a.total_trades, metrics_b.total_trades);
    assert_eq!(metrics_a.final_balance, metrics_b.final_balance);
    assert_eq!(metrics_a.final_equity, metrics_b.final_equity);
    assert_eq!(metrics_a.win_rate, metrics_b.win_rate);
    assert_eq!(metrics_a.sharpe_ratio, metrics_b.sharpe_ratio);
}
