//! Stateless indicator math. Free functions over borrowed slices — no OO state. Detector
//! state lives in the detectors, not here.

pub mod atr;
pub mod macd;
pub mod moving_average;
pub mod rsi;
pub mod volume_profile;

pub use atr::atr as atr_value;
pub use macd::{macd, macd_series, MacdResult};
pub use moving_average::{ema, ema_series, sma};
pub use rsi::{rsi_simple, rsi_wilder};
