//! Mean-reversion entries for ranging markets: fade the extremes.

use common::{Candle, Direction, RegimeInfo, StrategyResult};

use crate::indicators::{closes, rsi, rsi_averages, sma, std_dev, stochastic};
use crate::{param_f64, param_usize, Params};

/// Confidence for an extreme reading: 0.6 at the threshold, rising linearly
/// to 1.0 at the far bound.
fn extreme_confidence(depth: f64, span: f64) -> f64 {
    if span <= 0.0 {
        return 0.6;
    }
    0.6 + (depth / span).clamp(0.0, 1.0) * 0.4
}

/// RSI at or beyond its oversold / overbought thresholds. A window with no
/// price movement reads 100 but is not overbought.
pub fn rsi_reversal(candles: &[Candle], _regime: &RegimeInfo, params: &Params) -> StrategyResult {
    let period = param_usize(params, "period", 14);
    let oversold = param_f64(params, "oversold", 30.0);
    let overbought = param_f64(params, "overbought", 70.0);

    let prices = closes(candles);
    let Some(value) = rsi(&prices, period) else {
        return StrategyResult::neutral("insufficient data");
    };
    if rsi_averages(&prices, period) == Some((0.0, 0.0)) {
        return StrategyResult::neutral("no price movement").with_indicator("rsi", value);
    }

    let result = if value <= oversold {
        StrategyResult::signal(
            Direction::Call,
            extreme_confidence(oversold - value, oversold),
            format!("RSI{period} oversold at {value:.1}"),
        )
    } else if value >= overbought {
        StrategyResult::signal(
            Direction::Put,
            extreme_confidence(value - overbought, 100.0 - overbought),
            format!("RSI{period} overbought at {value:.1}"),
        )
    } else {
        StrategyResult::neutral("RSI inside band")
    };
    result.with_indicator("rsi", value)
}

/// %K and %D both in the oversold / overbought zone.
pub fn stoch_reversal(candles: &[Candle], _regime: &RegimeInfo, params: &Params) -> StrategyResult {
    let k_period = param_usize(params, "k_period", 14);
    let d_period = param_usize(params, "d_period", 3);
    let oversold = param_f64(params, "oversold", 20.0);
    let overbought = param_f64(params, "overbought", 80.0);

    let Some(s) = stochastic(candles, k_period, d_period) else {
        return StrategyResult::neutral("insufficient data");
    };

    let result = if s.k <= oversold && s.d <= oversold {
        StrategyResult::signal(
            Direction::Call,
            extreme_confidence(oversold - s.k, oversold),
            format!("stochastic oversold at {:.1}", s.k),
        )
    } else if s.k >= overbought && s.d >= overbought {
        StrategyResult::signal(
            Direction::Put,
            extreme_confidence(s.k - overbought, 100.0 - overbought),
            format!("stochastic overbought at {:.1}", s.k),
        )
    } else {
        StrategyResult::neutral("stochastic inside band")
    };
    result
        .with_indicator("stoch_k", s.k)
        .with_indicator("stoch_d", s.d)
}

/// Close outside SMA ± width·σ.
pub fn band_reversion(candles: &[Candle], _regime: &RegimeInfo, params: &Params) -> StrategyResult {
    let period = param_usize(params, "period", 20);
    let width = param_f64(params, "width", 2.0);

    let prices = closes(candles);
    let (Some(mean), Some(sd)) = (sma(&prices, period), std_dev(&prices, period)) else {
        return StrategyResult::neutral("insufficient data");
    };
    if sd == 0.0 {
        return StrategyResult::neutral("flat band");
    }

    let close = prices[prices.len() - 1];
    let upper = mean + width * sd;
    let lower = mean - width * sd;

    let result = if close < lower {
        StrategyResult::signal(
            Direction::Call,
            0.55 + ((lower - close) / sd).min(1.0) * 0.35,
            format!("close below lower band {lower:.5}"),
        )
    } else if close > upper {
        StrategyResult::signal(
            Direction::Put,
            0.55 + ((close - upper) / sd).min(1.0) * 0.35,
            format!("close above upper band {upper:.5}"),
        )
    } else {
        StrategyResult::neutral("inside band")
    };
    result
        .with_indicator("band_mid", mean)
        .with_indicator("band_upper", upper)
        .with_indicator("band_lower", lower)
}
