//! Bucketed volume-profile analytics: POC, Value Area, HVN/LVN, delta. All pure functions
//! over a `&VolumeProfile`.
//!
//! Two tie-break rules are resolved here, deterministically:
//! - POC ties: lowest price wins (we scan buckets in ascending price order and only
//!   replace the current POC on a strictly greater volume).
//! - Value-area expansion ties: the upper bucket is added first.

use crate::domain::trading::types::{VolumeAtPrice, VolumeProfile};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

/// Price bucket with the largest traded volume. `None` for an empty profile.
pub fn poc(profile: &VolumeProfile) -> Option<Decimal> {
    let mut best: Option<(&Decimal, &VolumeAtPrice)> = None;
    for (price, level) in profile.levels.iter() {
        match best {
            Some((_, b)) if level.total_volume <= b.total_volume => {}
            _ => best = Some((price, level)),
        }
    }
    best.map(|(p, _)| *p)
}

/// `(val, vah)` covering at least `target_pct` of total session volume, expanding out from
/// the POC bucket one step at a time toward whichever side has more volume.
pub fn value_area(profile: &VolumeProfile, target_pct: f64) -> Option<(Decimal, Decimal)> {
    let poc_price = poc(profile)?;
    let prices: Vec<Decimal> = profile.levels.keys().copied().collect();
    let poc_idx = prices.iter().position(|p| *p == poc_price)?;

    let total: Decimal = profile.total_volume();
    if total == Decimal::ZERO {
        return Some((poc_price, poc_price));
    }
    let target = total * Decimal::from_f64(target_pct).unwrap_or(Decimal::new(7, 1));

    let mut lo = poc_idx;
    let mut hi = poc_idx;
    let mut accumulated = profile.levels[&prices[poc_idx]].total_volume;

    while accumulated < target {
        let above = if hi + 1 < prices.len() {
            Some(profile.levels[&prices[hi + 1]].total_volume)
        } else {
            None
        };
        let below = if lo > 0 {
            Some(profile.levels[&prices[lo - 1]].total_volume)
        } else {
            None
        };

        match (above, below) {
            (None, None) => break,
            (Some(a), None) => {
                hi += 1;
                accumulated += a;
            }
            (None, Some(b)) => {
                lo -= 1;
                accumulated += b;
            }
            (Some(a), Some(b)) => {
                // Tie: add upper first.
                if a >= b {
                    hi += 1;
                    accumulated += a;
                } else {
                    lo -= 1;
                    accumulated += b;
                }
            }
        }
    }

    Some((prices[lo], prices[hi]))
}

/// High/low volume nodes: the top/bottom `(1 - pct)` fraction of buckets by volume,
/// at least `min_levels` of each.
pub fn hvn_lvn(profile: &VolumeProfile, pct: f64, min_levels: usize) -> (Vec<Decimal>, Vec<Decimal>) {
    let mut buckets: Vec<(&Decimal, &VolumeAtPrice)> = profile.levels.iter().collect();
    buckets.sort_by(|a, b| b.1.total_volume.cmp(&a.1.total_volume));

    let fraction = (1.0 - pct).clamp(0.0, 1.0);
    let n = ((buckets.len() as f64 * fraction).ceil() as usize).max(min_levels.min(buckets.len()));
    let n = n.min(buckets.len());

    let hvn: Vec<Decimal> = buckets[..n].iter().map(|(p, _)| **p).collect();
    let lvn: Vec<Decimal> = buckets[buckets.len() - n..]
        .iter()
        .map(|(p, _)| **p)
        .collect();
    (hvn, lvn)
}

/// Delta (buy - sell volume) at a specific bucket price, if it exists.
pub fn delta_at(profile: &VolumeProfile, price: Decimal) -> Option<Decimal> {
    profile.levels.get(&price).map(|v| v.delta())
}

/// Per-level delta map, price -> delta.
pub fn delta_map(profile: &VolumeProfile) -> Vec<(Decimal, Decimal)> {
    profile
        .levels
        .iter()
        .map(|(p, v)| (*p, v.delta()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::types::AggressorSide;
    use rust_decimal_macros::dec;

    fn sample_profile() -> VolumeProfile {
        let mut p = VolumeProfile::new(0, 86_400, dec!(1));
        // POC at 100 with volume 30; symmetric decay outward.
        p.record_trade(dec!(98), dec!(5), AggressorSide::Buy);
        p.record_trade(dec!(99), dec!(10), AggressorSide::Buy);
        p.record_trade(dec!(100), dec!(20), AggressorSide::Buy);
        p.record_trade(dec!(100), dec!(10), AggressorSide::Sell);
        p.record_trade(dec!(101), dec!(10), AggressorSide::Sell);
        p.record_trade(dec!(102), dec!(5), AggressorSide::Sell);
        p
    }

    #[test]
    fn poc_is_max_volume_bucket() {
        let p = sample_profile();
        assert_eq!(poc(&p), Some(dec!(100)));
    }

    #[test]
    fn poc_ties_prefer_lowest_price() {
        let mut p = VolumeProfile::new(0, 1, dec!(1));
        p.record_trade(dec!(100), dec!(10), AggressorSide::Buy);
        p.record_trade(dec!(101), dec!(10), AggressorSide::Buy);
        assert_eq!(poc(&p), Some(dec!(100)));
    }

    #[test]
    fn value_area_covers_target_volume() {
        let p = sample_profile();
        let total = p.total_volume();
        let (val, vah) = value_area(&p, 0.7).unwrap();
        assert!(val <= dec!(100) && vah >= dec!(100));

        let mut covered = Decimal::ZERO;
        for (price, level) in &p.levels {
            if *price >= val && *price <= vah {
                covered += level.total_volume;
            }
        }
        assert!(covered >= total * dec!(0.7));
    }

    #[test]
    fn total_volume_equals_buy_plus_sell_everywhere() {
        let p = sample_profile();
        for level in p.levels.values() {
            assert_eq!(level.total_volume, level.buy_volume + level.sell_volume);
        }
    }

    #[test]
    fn hvn_lvn_respect_min_levels() {
        let p = sample_profile();
        let (hvn, lvn) = hvn_lvn(&p, 0.7, 1);
        assert!(!hvn.is_empty());
        assert!(!lvn.is_empty());
    }
}
