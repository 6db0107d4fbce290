//! Pattern detectors. Each owns its own per-coin dedup/cooldown state and is blind to
//! the others; the aggregator in `application::signals` is what combines them.

pub mod macd;
pub mod momentum;
pub mod prev_day_vp;
pub mod rsi;
pub mod volume_profile;

pub use macd::Macd;
pub use momentum::Momentum;
pub use prev_day_vp::PrevDayVp;
pub use rsi::Rsi;
pub use volume_profile::VolumeProfile;

use crate::domain::trading::types::{Candle, Signal};
use std::any::Any;

/// Common seam for all pattern detectors: one `detect` entry point plus a `reset` for
/// clearing per-coin state (e.g. on restart or session rollover).
pub trait SignalDetector: Any {
    /// `candles` is ordered oldest-first, most recent last. Returns at most one signal.
    fn detect(&mut self, coin: &str, candles: &[Candle]) -> Option<Signal>;

    /// Clears dedup/cooldown state for one coin, or every coin when `None`.
    fn reset(&mut self, coin: Option<&str>);

    /// Lets the aggregator find a concrete detector (e.g. `VolumeProfile`, `PrevDayVp`)
    /// by downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
