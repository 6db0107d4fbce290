//! Thin glue between a `MarketEvent` source and `TradingCore`. `EventSource` is the seam
//! that lets the same orchestrator run over historical bars or a live feed; concrete
//! exchange adapters and CLI wiring are out-of-scope infrastructure left to callers.

use crate::application::orchestrator::{BacktestMetrics, TradingCore};
use crate::domain::errors::PipelineError;
use crate::domain::trading::types::MarketEvent;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::watch;
use tracing::info;

/// Ordered stream of market events. A backtest source is finite and returns `None` once
/// exhausted; a live source is expected to await the next frame indefinitely and only
/// return `None` on a permanent disconnect.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Option<MarketEvent>;
}

/// Replays a fixed, in-memory sequence of events in order. Used by backtests over a
/// pre-loaded candle/tick history and by integration tests standing in for an exchange feed.
pub struct VecEventSource {
    events: VecDeque<MarketEvent>,
}

impl VecEventSource {
    pub fn new(events: Vec<MarketEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }
}

#[async_trait]
impl EventSource for VecEventSource {
    async fn next_event(&mut self) -> Option<MarketEvent> {
        self.events.pop_front()
    }
}

/// Drains `source` to exhaustion through `core`, then closes out every open position and
/// returns the final metrics. Backtest/live parity rests on `core.on_event` being the
/// only thing either driver calls — this function adds no behaviour of its own.
pub async fn run_backtest(
    core: &mut TradingCore,
    source: &mut dyn EventSource,
    periods_per_year: f64,
) -> Result<BacktestMetrics, PipelineError> {
    let mut processed = 0u64;
    while let Some(event) = source.next_event().await {
        core.on_event(&event).await?;
        processed += 1;
    }
    info!(processed, "backtest driver: event source exhausted");
    Ok(core.finish(periods_per_year))
}

/// Pumps `source` through `core` until either the source disconnects (`next_event`
/// returns `None`) or `shutdown` is signalled. Unlike `run_backtest`, a live run does not
/// call `finish()` on exit — the caller decides whether a disconnect should close
/// positions or merely pause until reconnection, which is exchange-adapter policy and out
/// of scope here.
pub async fn run_live(
    core: &mut TradingCore,
    source: &mut dyn EventSource,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), PipelineError> {
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("live driver: shutdown signalled");
                    return Ok(());
                }
            }
            event = source.next_event() => {
                match event {
                    Some(event) => core.on_event(&event).await?,
                    None => {
                        info!("live driver: event source disconnected");
                        return Ok(());
                    }
                }
            }
        }
    }
}
