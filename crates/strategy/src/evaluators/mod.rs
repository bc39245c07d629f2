//! Built-in strategy evaluators.
//!
//! Each evaluator is a pure function of (candles, regime, params). Wrapped in
//! [`Evaluator`] they also satisfy the [`Strategy`] contract so configs and
//! the leaderboard can address them by id.

pub mod reversion;
pub mod trend;

use common::{Candle, RegimeInfo, Result, StrategyResult};

use crate::regime::{detect_regime, DEFAULT_ADX_PERIOD};
use crate::{ParamSpec, Params, Strategy};

pub type EvalFn = fn(&[Candle], &RegimeInfo, &Params) -> StrategyResult;

/// Trend-following pullback evaluators, in routing order.
pub const TREND_ROUTE: [&str; 3] = ["ema_pullback", "rsi_pullback", "stoch_pullback"];
/// Mean-reversion evaluators merged under the configured merge mode.
pub const REVERSION_PRIMARY: &str = "rsi_reversal";
pub const REVERSION_SECONDARY: &str = "stoch_reversal";
/// Mean-reversion evaluators tried after the merged pair, in order.
pub const REVERSION_FALLBACK: [&str; 1] = ["band_reversion"];

#[derive(Clone)]
pub struct Evaluator {
    id: &'static str,
    name: &'static str,
    schema: Vec<ParamSpec>,
    func: EvalFn,
}

impl Evaluator {
    pub fn new(id: &'static str, name: &'static str, schema: Vec<ParamSpec>, func: EvalFn) -> Self {
        Self {
            id,
            name,
            schema,
            func,
        }
    }

    /// Evaluate against an already computed regime. `params` defaults to the
    /// declared schema defaults.
    pub fn run(&self, candles: &[Candle], regime: &RegimeInfo, params: Option<&Params>) -> StrategyResult {
        let params = self.resolve_params(params);
        let mut result = (self.func)(candles, regime, &params);
        result.strategy_id = Some(self.id.to_string());
        result
    }
}

impl Strategy for Evaluator {
    fn id(&self) -> &str {
        self.id
    }

    fn name(&self) -> &str {
        self.name
    }

    fn param_schema(&self) -> &[ParamSpec] {
        &self.schema
    }

    fn evaluate(&self, candles: &[Candle], params: &Params) -> Result<StrategyResult> {
        let regime = detect_regime(candles, DEFAULT_ADX_PERIOD);
        self.evaluate_with_regime(candles, &regime, params)
    }

    fn evaluate_with_regime(&self, candles: &[Candle], regime: &RegimeInfo, params: &Params) -> Result<StrategyResult> {
        Ok(self.run(candles, regime, Some(params)))
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator").field("id", &self.id).finish()
    }
}

pub fn builtin_evaluators() -> Vec<Evaluator> {
    vec![
        Evaluator::new(
            "ema_pullback",
            "EMA pullback",
            vec![
                ParamSpec::new("fast", 9.0, 3.0, 30.0, 1.0),
                ParamSpec::new("slow", 21.0, 10.0, 100.0, 1.0),
                ParamSpec::new("tolerance_pct", 0.15, 0.0, 1.0, 0.05),
            ],
            trend::ema_pullback,
        ),
        Evaluator::new(
            "rsi_pullback",
            "RSI pullback",
            vec![
                ParamSpec::new("period", 14.0, 5.0, 30.0, 1.0),
                ParamSpec::new("pullback_low", 35.0, 20.0, 45.0, 1.0),
                ParamSpec::new("pullback_high", 50.0, 40.0, 60.0, 1.0),
            ],
            trend::rsi_pullback,
        ),
        Evaluator::new(
            "stoch_pullback",
            "Stochastic pullback",
            vec![
                ParamSpec::new("k_period", 14.0, 5.0, 30.0, 1.0),
                ParamSpec::new("d_period", 3.0, 2.0, 10.0, 1.0),
                ParamSpec::new("oversold", 25.0, 5.0, 40.0, 1.0),
                ParamSpec::new("overbought", 75.0, 60.0, 95.0, 1.0),
            ],
            trend::stoch_pullback,
        ),
        Evaluator::new(
            "rsi_reversal",
            "RSI reversal",
            vec![
                ParamSpec::new("period", 14.0, 5.0, 30.0, 1.0),
                ParamSpec::new("oversold", 30.0, 10.0, 40.0, 1.0),
                ParamSpec::new("overbought", 70.0, 60.0, 90.0, 1.0),
            ],
            reversion::rsi_reversal,
        ),
        Evaluator::new(
            "stoch_reversal",
            "Stochastic reversal",
            vec![
                ParamSpec::new("k_period", 14.0, 5.0, 30.0, 1.0),
                ParamSpec::new("d_period", 3.0, 2.0, 10.0, 1.0),
                ParamSpec::new("oversold", 20.0, 5.0, 40.0, 1.0),
                ParamSpec::new("overbought", 80.0, 60.0, 95.0, 1.0),
            ],
            reversion::stoch_reversal,
        ),
        Evaluator::new(
            "band_reversion",
            "Band reversion",
            vec![
                ParamSpec::new("period", 20.0, 10.0, 50.0, 1.0),
                ParamSpec::new("width", 2.0, 1.0, 3.5, 0.25),
            ],
            reversion::band_reversion,
        ),
    ]
}

/// Look up a built-in evaluator by id.
pub fn find(id: &str) -> Option<Evaluator> {
    builtin_evaluators().into_iter().find(|e| e.id == id)
}

/// Confidence for trend entries: `base` plus a bonus for ADX above the weak
/// trend threshold, capped at 0.95.
pub(crate) fn trend_confidence(base: f64, regime: &RegimeInfo) -> f64 {
    let bonus = ((regime.adx - crate::regime::WEAK_TREND_ADX).max(0.0) / 50.0).min(0.3);
    (base + bonus).min(0.95)
}

#[cfg(test)]
pub(crate) mod test_support {
    use common::Candle;

    /// Candles whose closes follow `closes`, with a small symmetric wick.
    pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let mut prev = closes.first().copied().unwrap_or(0.0);
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let open = prev;
                prev = c;
                Candle::new(
                    i as i64 * 60_000,
                    open,
                    open.max(c) + 0.05,
                    open.min(c) - 0.05,
                    c,
                    1.0,
                )
            })
            .collect()
    }
}
