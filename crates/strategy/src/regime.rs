use common::{Candle, Regime, RegimeInfo};

use crate::indicators::adx;

/// ADX at or above this is a strong trend.
pub const STRONG_TREND_ADX: f64 = 40.0;
/// ADX at or above this (and below strong) is a weak trend; below is ranging.
pub const WEAK_TREND_ADX: f64 = 25.0;
/// In a weak trend at or above this ADX, counter-trend signals are blocked.
pub const COUNTER_TREND_BLOCK_ADX: f64 = 30.0;

pub const DEFAULT_ADX_PERIOD: usize = 14;

/// Classify a regime from ADX and the directional indices.
pub fn classify(adx: f64, plus_di: f64, minus_di: f64) -> RegimeInfo {
    let direction: i8 = if plus_di > minus_di {
        1
    } else if minus_di > plus_di {
        -1
    } else {
        0
    };

    let regime = match direction {
        1 if adx >= STRONG_TREND_ADX => Regime::StrongUptrend,
        -1 if adx >= STRONG_TREND_ADX => Regime::StrongDowntrend,
        1 if adx >= WEAK_TREND_ADX => Regime::WeakUptrend,
        -1 if adx >= WEAK_TREND_ADX => Regime::WeakDowntrend,
        _ if adx.is_nan() => Regime::Unknown,
        _ => Regime::Ranging,
    };

    RegimeInfo {
        regime,
        adx,
        plus_di,
        minus_di,
        direction,
    }
}

/// Regime of the candle window; `Unknown` when ADX cannot be computed yet.
pub fn detect_regime(candles: &[Candle], period: usize) -> RegimeInfo {
    match adx(candles, period) {
        Some(v) => classify(v.adx, v.plus_di, v.minus_di),
        None => RegimeInfo::unknown(),
    }
}
