use common::{Candle, Regime};
use proptest::prelude::*;
use strategy::indicators::{adx, closes, rsi, stochastic};
use strategy::regime::detect_regime;
use strategy::Strategy as _;
use strategy::{invoke, StrategyRegistry};

/// Random walk candles with a positive range around each close.
fn candles_strategy(max: usize) -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((-2.0f64..2.0, 0.0f64..1.5), 0..max).prop_map(|steps| {
        let mut close = 100.0;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (step, wick))| {
                let open = close;
                close = (close + step).max(1.0);
                Candle::new(
                    i as i64 * 60_000,
                    open,
                    open.max(close) + wick,
                    open.min(close) - wick,
                    close,
                    1.0,
                )
            })
            .collect()
    })
}

proptest! {
    /// Oscillators stay within their documented bounds.
    #[test]
    fn oscillators_are_bounded(candles in candles_strategy(120)) {
        if let Some(v) = rsi(&closes(&candles), 14) {
            prop_assert!((0.0..=100.0).contains(&v));
        }
        if let Some(s) = stochastic(&candles, 14, 3) {
            prop_assert!((0.0..=100.0).contains(&s.k));
            prop_assert!((0.0..=100.0).contains(&s.d));
        }
        if let Some(a) = adx(&candles, 14) {
            prop_assert!(a.adx.is_finite() && a.adx >= 0.0 && a.adx <= 100.0 + 1e-9);
            prop_assert!(a.plus_di >= 0.0 && a.minus_di >= 0.0);
        }
    }

    /// Short windows yield no value rather than an error.
    #[test]
    fn short_windows_are_none(candles in candles_strategy(14)) {
        prop_assert!(rsi(&closes(&candles), 14).is_none());
        prop_assert!(adx(&candles, 14).is_none());
        prop_assert_eq!(detect_regime(&candles, 14).regime, Regime::Unknown);
    }

    /// Every built-in evaluator returns a well-formed result on any window.
    #[test]
    fn builtin_evaluators_never_fail(candles in candles_strategy(120)) {
        let registry = StrategyRegistry::builtin();
        for strategy in registry.iter() {
            let params = strategy.default_params();
            let result = invoke(strategy.as_ref(), &candles, &params);
            prop_assert!(result.is_some(), "{} failed", strategy.id());
            let result = result.unwrap();
            prop_assert!((0.0..=1.0).contains(&result.confidence));
            prop_assert_eq!(result.strategy_id.as_deref(), Some(strategy.id()));
        }
    }
}
