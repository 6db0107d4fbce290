use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggressorSide {
    Buy,
    Sell,
}

/// The realized direction of a breakout, used to grade a signal's prediction after the
/// fact (`SignalValidator::record_outcome`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakoutDirection {
    Up,
    Down,
}

/// A bar covering `[timestamp, timestamp + interval)`. Never mutated once finalised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub coin: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub trade_count: u64,
    pub timestamp: i64,
}

impl Candle {
    /// Candle invariant: `low <= min(open, close) <= max(open, close) <= high`.
    pub fn is_valid(&self) -> bool {
        let lo = self.open.min(self.close);
        let hi = self.open.max(self.close);
        self.low <= lo && lo <= hi && hi <= self.high && self.volume >= Decimal::ZERO
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradeTick {
    pub timestamp: i64,
    pub price: Decimal,
    pub size: Decimal,
    pub side: AggressorSide,
}

/// Raw market events consumed by the orchestrator, yielded in order by an `EventSource`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MarketEvent {
    PriceUpdate {
        timestamp: i64,
        coin: String,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    },
    TradeTick {
        timestamp: i64,
        coin: String,
        price: Decimal,
        size: Decimal,
        side: AggressorSide,
    },
}

impl MarketEvent {
    pub fn timestamp(&self) -> i64 {
        match self {
            MarketEvent::PriceUpdate { timestamp, .. } => *timestamp,
            MarketEvent::TradeTick { timestamp, .. } => *timestamp,
        }
    }

    pub fn coin(&self) -> &str {
        match self {
            MarketEvent::PriceUpdate { coin, .. } => coin,
            MarketEvent::TradeTick { coin, .. } => coin,
        }
    }
}

/// A bucketed aggregate of traded volume at one price level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct VolumeAtPrice {
    pub price: Decimal,
    pub total_volume: Decimal,
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
}

impl VolumeAtPrice {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            total_volume: Decimal::ZERO,
            buy_volume: Decimal::ZERO,
            sell_volume: Decimal::ZERO,
        }
    }

    pub fn delta(&self) -> Decimal {
        self.buy_volume - self.sell_volume
    }

    pub fn add(&mut self, size: Decimal, side: AggressorSide) {
        self.total_volume += size;
        match side {
            AggressorSide::Buy => self.buy_volume += size,
            AggressorSide::Sell => self.sell_volume += size,
        }
    }
}

/// Session volume profile: bucket price (as ticks since `tick_size` is fixed) -> aggregate.
/// Keyed on a `BTreeMap` so bucket iteration is price-ordered, which the POC/value-area/HVN-LVN
/// analytics in `application::indicators::volume_profile` rely on for deterministic tie-breaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeProfile {
    pub session_start: i64,
    pub session_end: i64,
    pub tick_size: Decimal,
    pub levels: BTreeMap<Decimal, VolumeAtPrice>,
}

impl VolumeProfile {
    pub fn new(session_start: i64, session_end: i64, tick_size: Decimal) -> Self {
        Self {
            session_start,
            session_end,
            tick_size,
            levels: BTreeMap::new(),
        }
    }

    pub fn bucket(&self, price: Decimal) -> Decimal {
        if self.tick_size <= Decimal::ZERO {
            return price;
        }
        (price / self.tick_size).round() * self.tick_size
    }

    pub fn record_trade(&mut self, price: Decimal, size: Decimal, side: AggressorSide) {
        let bucket = self.bucket(price);
        self.levels
            .entry(bucket)
            .or_insert_with(|| VolumeAtPrice::new(bucket))
            .add(size, side);
    }

    pub fn total_volume(&self) -> Decimal {
        self.levels.values().map(|v| v.total_volume).sum()
    }

    pub fn total_delta(&self) -> Decimal {
        self.levels.values().map(|v| v.delta()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, PartialOrd, Ord, Hash)]
pub enum SignalType {
    Momentum,
    Rsi,
    Macd,
    VolumeProfile,
    PrevDayVp,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalType::Momentum => "Momentum",
            SignalType::Rsi => "RSI",
            SignalType::Macd => "MACD",
            SignalType::VolumeProfile => "VolumeProfile",
            SignalType::PrevDayVp => "PrevDayVP",
        };
        write!(f, "{s}")
    }
}

/// Emitted by a detector when its pattern triggers. Immutable once emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub coin: String,
    pub signal_type: SignalType,
    pub direction: Direction,
    pub strength: f64,
    pub timestamp: i64,
    pub metadata: String,
}

impl Signal {
    pub fn new(
        coin: impl Into<String>,
        signal_type: SignalType,
        direction: Direction,
        strength: f64,
        timestamp: i64,
        metadata: impl Into<String>,
    ) -> Self {
        Self {
            coin: coin.into(),
            signal_type,
            direction,
            strength: strength.clamp(0.0, 1.0),
            timestamp,
            metadata: metadata.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityLevel {
    Low,
    Medium,
    High,
}

/// Per-decision market snapshot, derived from ATR and current price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketContext {
    pub coin: String,
    pub current_price: Decimal,
    pub atr: Decimal,
    pub atr_percent: f64,
    pub volatility_level: VolatilityLevel,
}

impl MarketContext {
    pub fn new(coin: impl Into<String>, current_price: Decimal, atr: Decimal) -> Self {
        use rust_decimal::prelude::ToPrimitive;
        let atr_percent = if current_price > Decimal::ZERO {
            (atr / current_price * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };
        let volatility_level = if atr_percent < 0.5 {
            VolatilityLevel::Low
        } else if atr_percent < 1.5 {
            VolatilityLevel::Medium
        } else {
            VolatilityLevel::High
        };
        Self {
            coin: coin.into(),
            current_price,
            atr,
            atr_percent,
            volatility_level,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Long,
    Short,
    Wait,
}

/// The brain's output. `Wait` is terminal; only `Long`/`Short` lead to a position open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradePlan {
    pub action: TradeAction,
    pub coin: String,
    pub size_pct: f64,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub trail_activation: Decimal,
    pub trail_distance_pct: f64,
    pub confidence: u8,
    pub reason: String,
    pub signals_considered: Vec<String>,
}

impl TradePlan {
    pub fn wait(coin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: TradeAction::Wait,
            coin: coin.into(),
            size_pct: 0.0,
            stop_loss: Decimal::ZERO,
            take_profit: Decimal::ZERO,
            trail_activation: Decimal::ZERO,
            trail_distance_pct: 0.0,
            confidence: 0,
            reason: reason.into(),
            signals_considered: Vec::new(),
        }
    }
}

/// A simulated open position. Destroyed on close (produces a `Trade`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub coin: String,
    pub side: Direction,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub entry_time: i64,
}

/// Wraps `Position` with trailing-stop state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedPosition {
    pub position: Position,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub trail_activation: Decimal,
    pub trail_distance_pct: f64,
    pub trailing_active: bool,
    pub trailing_stop: Decimal,
    /// LONG tracks `highest_price`, SHORT tracks `lowest_price` in the same field.
    pub extreme_price: Decimal,
}

/// Immutable record of a closed position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub coin: String,
    pub side: Direction,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub entry_time: i64,
    pub exit_time: i64,
    pub pnl: Decimal,
    pub fees_paid: Decimal,
    pub exit_reason: String,
}

/// Per signal-type (and strength-quartile) accuracy counters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AccuracyBand {
    pub total_signals: u64,
    pub correct_predictions: u64,
}

impl AccuracyBand {
    /// Neutral 0.5 with no history yet, so an unproven signal type isn't filtered out
    /// before it has had a chance to prove itself either way.
    pub fn accuracy(&self) -> f64 {
        if self.total_signals == 0 {
            0.5
        } else {
            self.correct_predictions as f64 / self.total_signals as f64
        }
    }
}

/// A single point on the equity curve, sampled every N candles by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub equity: Decimal,
    pub balance: Decimal,
    pub positions_value: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn candle_invariant_holds_for_well_formed_candle() {
        let c = Candle {
            coin: "BTC".into(),
            open: dec!(100),
            high: dec!(105),
            low: dec!(95),
            close: dec!(102),
            volume: dec!(10),
            trade_count: 3,
            timestamp: 0,
        };
        assert!(c.is_valid());
    }

    #[test]
    fn candle_invariant_rejects_high_below_close() {
        let c = Candle {
            coin: "BTC".into(),
            open: dec!(100),
            high: dec!(101),
            low: dec!(95),
            close: dec!(102),
            volume: dec!(10),
            trade_count: 3,
            timestamp: 0,
        };
        assert!(!c.is_valid());
    }

    #[test]
    fn volume_at_price_total_equals_buy_plus_sell() {
        let mut v = VolumeAtPrice::new(dec!(100));
        v.add(dec!(3), AggressorSide::Buy);
        v.add(dec!(2), AggressorSide::Sell);
        assert_eq!(v.total_volume, v.buy_volume + v.sell_volume);
        assert_eq!(v.delta(), dec!(1));
    }

    #[test]
    fn market_context_classifies_volatility() {
        let ctx = MarketContext::new("BTC", dec!(1000), dec!(3));
        assert_eq!(ctx.volatility_level, VolatilityLevel::Low);
        let ctx = MarketContext::new("BTC", dec!(1000), dec!(12));
        assert_eq!(ctx.volatility_level, VolatilityLevel::Medium);
        let ctx = MarketContext::new("BTC", dec!(1000), dec!(20));
        assert_eq!(ctx.volatility_level, VolatilityLevel::High);
    }
}
