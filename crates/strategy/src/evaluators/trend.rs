//! Trend-following pullback entries. Only fire in a trending regime and only
//! in the trend's direction.

use common::{Candle, Direction, RegimeInfo, StrategyResult};

use super::trend_confidence;
use crate::indicators::{closes, ema, rsi_series, stochastic_series};
use crate::{param_f64, param_usize, Params};

/// Expiry suggested for EMA pullback entries, which need room to resume.
const EMA_PULLBACK_EXPIRY_SECS: u32 = 180;

/// Price dips back to the fast EMA and the next candle closes back in trend.
pub fn ema_pullback(candles: &[Candle], regime: &RegimeInfo, params: &Params) -> StrategyResult {
    let fast = param_usize(params, "fast", 9);
    let slow = param_usize(params, "slow", 21);
    let tolerance = param_f64(params, "tolerance_pct", 0.15) / 100.0;

    let Some(direction) = regime.trend_direction() else {
        return StrategyResult::neutral("no trend");
    };
    if candles.len() < slow.max(fast) + 1 {
        return StrategyResult::neutral("insufficient data");
    }

    let prices = closes(candles);
    let (Some(ema_fast), Some(ema_slow)) = (ema(&prices, fast), ema(&prices, slow)) else {
        return StrategyResult::neutral("insufficient data");
    };
    let prev = &candles[candles.len() - 2];
    let last = &candles[candles.len() - 1];

    let fired = match direction {
        Direction::Call => {
            ema_fast > ema_slow
                && prev.low <= ema_fast * (1.0 + tolerance)
                && last.close > ema_fast
                && last.is_bullish()
        }
        Direction::Put => {
            ema_fast < ema_slow
                && prev.high >= ema_fast * (1.0 - tolerance)
                && last.close < ema_fast
                && last.is_bearish()
        }
    };

    let result = if fired {
        StrategyResult::signal(
            direction,
            trend_confidence(0.6, regime),
            format!("pullback to EMA{fast} in {}", regime.regime),
        )
        .with_expiry(EMA_PULLBACK_EXPIRY_SECS)
    } else {
        StrategyResult::neutral("no EMA pullback")
    };
    result
        .with_indicator("ema_fast", ema_fast)
        .with_indicator("ema_slow", ema_slow)
}

/// RSI retreats into the pullback zone and turns back with the trend.
pub fn rsi_pullback(candles: &[Candle], regime: &RegimeInfo, params: &Params) -> StrategyResult {
    let period = param_usize(params, "period", 14);
    let low = param_f64(params, "pullback_low", 35.0);
    let high = param_f64(params, "pullback_high", 50.0);

    let Some(direction) = regime.trend_direction() else {
        return StrategyResult::neutral("no trend");
    };
    let series = rsi_series(&closes(candles), period);
    if series.len() < 2 {
        return StrategyResult::neutral("insufficient data");
    }
    let prev = series[series.len() - 2];
    let curr = series[series.len() - 1];

    let fired = match direction {
        Direction::Call => (low..=high).contains(&prev) && curr > prev,
        Direction::Put => ((100.0 - high)..=(100.0 - low)).contains(&prev) && curr < prev,
    };

    let result = if fired {
        let turn = ((curr - prev).abs() / 100.0).min(0.1);
        StrategyResult::signal(
            direction,
            trend_confidence(0.55, regime) + turn,
            format!("RSI{period} pullback turned at {prev:.1}"),
        )
    } else {
        StrategyResult::neutral("no RSI pullback")
    };
    result.with_indicator("rsi", curr).with_indicator("rsi_prev", prev)
}

/// Stochastic %K crosses %D out of the pullback extreme, with the trend.
pub fn stoch_pullback(candles: &[Candle], regime: &RegimeInfo, params: &Params) -> StrategyResult {
    let k_period = param_usize(params, "k_period", 14);
    let d_period = param_usize(params, "d_period", 3);
    let oversold = param_f64(params, "oversold", 25.0);
    let overbought = param_f64(params, "overbought", 75.0);

    let Some(direction) = regime.trend_direction() else {
        return StrategyResult::neutral("no trend");
    };
    let series = stochastic_series(candles, k_period, d_period);
    if series.len() < 2 {
        return StrategyResult::neutral("insufficient data");
    }
    let prev = series[series.len() - 2];
    let curr = series[series.len() - 1];

    let fired = match direction {
        Direction::Call => prev.k <= oversold && prev.k <= prev.d && curr.k > curr.d,
        Direction::Put => prev.k >= overbought && prev.k >= prev.d && curr.k < curr.d,
    };

    let result = if fired {
        StrategyResult::signal(
            direction,
            trend_confidence(0.55, regime),
            format!("stochastic cross out of pullback ({:.1})", prev.k),
        )
    } else {
        StrategyResult::neutral("no stochastic pullback")
    };
    result
        .with_indicator("stoch_k", curr.k)
        .with_indicator("stoch_d", curr.d)
}
