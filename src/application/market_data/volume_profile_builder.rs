//! Owns the accumulating per-coin session volume profile. Resets at session boundaries
//! (UTC midnight by default); the completed profile is handed back so the orchestrator
//! can retain it as "previous day" context for the `PrevDayVp` detector.

use crate::domain::trading::types::{AggressorSide, VolumeProfile};
use rust_decimal::Decimal;
use std::collections::HashMap;

pub struct VolumeProfileBuilder {
    session_length_seconds: i64,
    tick_size: Decimal,
    profiles: HashMap<String, VolumeProfile>,
}

impl VolumeProfileBuilder {
    pub fn new(session_length_seconds: i64, tick_size: Decimal) -> Self {
        Self {
            session_length_seconds,
            tick_size,
            profiles: HashMap::new(),
        }
    }

    fn session_start(&self, timestamp: i64) -> i64 {
        (timestamp / self.session_length_seconds) * self.session_length_seconds
    }

    /// Records a trade. If the trade falls outside the current session, the old profile
    /// is finalised and returned alongside a fresh one seeded for the new session.
    pub fn record_trade(
        &mut self,
        coin: &str,
        price: Decimal,
        size: Decimal,
        side: AggressorSide,
        timestamp: i64,
    ) -> Option<VolumeProfile> {
        let session_start = self.session_start(timestamp);
        let session_end = session_start + self.session_length_seconds;

        let mut completed = None;
        let needs_reset = match self.profiles.get(coin) {
            Some(p) => timestamp >= p.session_end,
            None => true,
        };

        if needs_reset {
            if let Some(old) = self.profiles.insert(
                coin.to_string(),
                VolumeProfile::new(session_start, session_end, self.tick_size),
            ) {
                if old.total_volume() > Decimal::ZERO {
                    completed = Some(old);
                }
            }
        }

        self.profiles
            .get_mut(coin)
            .expect("just inserted or already present")
            .record_trade(price, size, side);

        completed
    }

    pub fn snapshot(&self, coin: &str) -> Option<&VolumeProfile> {
        self.profiles.get(coin)
    }
}
