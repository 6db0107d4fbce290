//! Candle aggregator: truncates ticks into fixed-interval OHLCV candles, one builder
//! per coin, bounded by a `max_candles` ring buffer. The interval is configurable rather
//! than a fixed one-minute bucket.

use crate::domain::errors::PipelineError;
use crate::domain::trading::types::Candle;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tracing::{info, warn};

#[derive(Debug)]
struct CandleBuilder {
    interval_start: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
    trade_count: u64,
}

impl CandleBuilder {
    fn new(interval_start: i64, price: Decimal) -> Self {
        Self {
            interval_start,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
            trade_count: 0,
        }
    }

    fn update(&mut self, price: Decimal, volume: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += volume;
        self.trade_count += 1;
    }

    fn build(&self, coin: &str) -> Candle {
        Candle {
            coin: coin.to_string(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            trade_count: self.trade_count,
            timestamp: self.interval_start,
        }
    }
}

/// Ring buffer of finalised candles bounded by `max_candles`, plus the in-progress
/// builder, one per coin.
pub struct CandleAggregator {
    interval_seconds: i64,
    max_candles: usize,
    builders: HashMap<String, CandleBuilder>,
    buffers: HashMap<String, VecDeque<Candle>>,
}

impl CandleAggregator {
    pub fn new(interval_seconds: i64, max_candles: usize) -> Self {
        Self {
            interval_seconds,
            max_candles,
            builders: HashMap::new(),
            buffers: HashMap::new(),
        }
    }

    fn interval_start(&self, timestamp: i64) -> i64 {
        (timestamp / self.interval_seconds) * self.interval_seconds
    }

    /// Returns the finalised candle on an interval crossing. An out-of-order tick
    /// (earlier than the current candle's interval start) is a hard error — fatal to the
    /// instrument's pipeline.
    pub fn add_tick(
        &mut self,
        coin: &str,
        price: Decimal,
        volume: Decimal,
        now: i64,
    ) -> Result<Option<Candle>, PipelineError> {
        let current_interval = self.interval_start(now);

        match self.builders.get_mut(coin) {
            None => {
                info!(coin, price = %price, "candle aggregator: first tick, starting aggregation");
                let mut builder = CandleBuilder::new(current_interval, price);
                builder.update(price, volume);
                self.builders.insert(coin.to_string(), builder);
                Ok(None)
            }
            Some(builder) => {
                if current_interval < builder.interval_start {
                    warn!(
                        coin,
                        tick_timestamp = now,
                        interval_start = builder.interval_start,
                        "candle aggregator: tick out of order"
                    );
                    return Err(PipelineError::TickOutOfOrder {
                        tick_timestamp: now,
                        interval_start: builder.interval_start,
                    });
                }
                if current_interval == builder.interval_start {
                    builder.update(price, volume);
                    return Ok(None);
                }

                let finalised = builder.build(coin);
                info!(
                    coin,
                    open = %finalised.open,
                    high = %finalised.high,
                    low = %finalised.low,
                    close = %finalised.close,
                    volume = %finalised.volume,
                    "candle aggregator: candle finalised"
                );

                let mut new_builder = CandleBuilder::new(current_interval, price);
                new_builder.update(price, volume);
                *builder = new_builder;

                let buf = self.buffers.entry(coin.to_string()).or_default();
                buf.push_back(finalised.clone());
                while buf.len() > self.max_candles {
                    buf.pop_front();
                }

                Ok(Some(finalised))
            }
        }
    }

    /// The in-progress (unfinalised) candle for a coin, if any ticks have arrived.
    pub fn current_candle(&self, coin: &str) -> Option<Candle> {
        self.builders.get(coin).map(|b| b.build(coin))
    }

    /// Finalised-candle ring buffer for a coin, oldest first. Returned as an owned `Vec`
    /// rather than a slice: once the `VecDeque` has wrapped around its backing allocation
    /// it is no longer contiguous, and `as_slices().0` alone would silently drop the
    /// wrapped-around tail.
    pub fn buffer(&self, coin: &str) -> Vec<Candle> {
        self.buffers
            .get(coin)
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }
}
