//! Sequential binary-option simulation of one strategy over a candle series.
//!
//! Decide at candle `i` with the trailing `lookback` window, resolve at
//! `i + expiry`, then continue deciding from the exit candle. Trades never
//! overlap.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use common::{BacktestConfig, Candle, Direction, Outcome};
use strategy::{try_invoke, Params, Strategy};

/// Fallback when the series is too short to infer the candle interval.
const DEFAULT_INTERVAL_MS: i64 = 60_000;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("strategy failed at candle {index}: {source}")]
    Strategy {
        index: usize,
        #[source]
        source: common::Error,
    },
}

/// One resolved trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_index: usize,
    pub exit_index: usize,
    /// Entry candle timestamp (ms).
    pub entry_ms: i64,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub outcome: Outcome,
    /// Profit in account currency: `bet × payout` on a win, `-bet` on a
    /// loss, 0 on a tie.
    pub pnl: f64,
}

/// Restrict to the configured date range and order by timestamp.
pub fn select_range(candles: &[Candle], config: &BacktestConfig) -> Vec<Candle> {
    let mut series: Vec<Candle> = candles
        .iter()
        .filter(|c| config.start_ms.map_or(true, |start| c.timestamp >= start))
        .filter(|c| config.end_ms.map_or(true, |end| c.timestamp <= end))
        .copied()
        .collect();
    series.sort_by_key(|c| c.timestamp);
    series
}

/// Smallest positive spacing between consecutive candles.
pub fn candle_interval_ms(candles: &[Candle]) -> i64 {
    candles
        .windows(2)
        .map(|w| w[1].timestamp - w[0].timestamp)
        .filter(|d| *d > 0)
        .min()
        .unwrap_or(DEFAULT_INTERVAL_MS)
}

pub fn resolve(direction: Direction, entry: f64, exit: f64) -> Outcome {
    if exit == entry {
        Outcome::Tie
    } else if (exit > entry) == (direction == Direction::Call) {
        Outcome::Win
    } else {
        Outcome::Loss
    }
}

pub fn trade_pnl(outcome: Outcome, config: &BacktestConfig) -> f64 {
    match outcome {
        Outcome::Win => config.bet_amount * config.payout,
        Outcome::Loss => -config.bet_amount,
        Outcome::Tie => 0.0,
    }
}

/// Simulate `strategy` over an ordered candle series.
///
/// The first failing evaluation aborts this strategy's simulation; callers
/// isolate the error per strategy.
pub fn simulate(
    strategy: &dyn Strategy,
    params: &Params,
    candles: &[Candle],
    config: &BacktestConfig,
) -> Result<Vec<Trade>, SimulationError> {
    let interval_ms = candle_interval_ms(candles);
    let lookback = config.lookback.max(1);
    let mut trades = Vec::new();
    let mut i = config.warmup.max(1);

    while i + 1 < candles.len() {
        let window = &candles[(i + 1).saturating_sub(lookback)..=i];
        let result = try_invoke(strategy, window, params)
            .map_err(|source| SimulationError::Strategy { index: i, source })?;

        let Some(direction) = result.direction else {
            i += 1;
            continue;
        };

        let expiry = match result.expiry_secs {
            Some(secs) if config.use_strategy_expiry => {
                let ms = i64::from(secs) * 1000;
                ((ms + interval_ms - 1) / interval_ms).max(1) as usize
            }
            _ => config.expiry_candles.max(1),
        };
        let exit = i + expiry;
        if exit >= candles.len() {
            break;
        }

        let entry_price = candles[i].close;
        let exit_price = candles[exit].close;
        let outcome = resolve(direction, entry_price, exit_price);
        trades.push(Trade {
            entry_index: i,
            exit_index: exit,
            entry_ms: candles[i].timestamp,
            direction,
            entry_price,
            exit_price,
            outcome,
            pnl: trade_pnl(outcome, config),
        });
        i = exit;
    }

    debug!(strategy = %strategy.id(), trades = trades.len(), "Simulation finished");
    Ok(trades)
}


#[cfg(test)]
mod tests {
    use super::test_support::{series, Momentum};
    use super::*;
    use common::Error;

    fn config() -> BacktestConfig {
        BacktestConfig {
            warmup: 1,
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn resolves_call_and_put() {
        assert_eq!(resolve(Direction::Call, 1.0, 1.1), Outcome::Win);
        assert_eq!(resolve(Direction::Call, 1.0, 0.9), Outcome::Loss);
        assert_eq!(resolve(Direction::Put, 1.0, 0.9), Outcome::Win);
        assert_eq!(resolve(Direction::Put, 1.0, 1.0), Outcome::Tie);
    }

    #[test]
    fn trades_do_not_overlap() {
        let candles = series(&[1.0, 1.1, 1.2, 1.3, 1.2, 1.1, 1.0, 1.05]);
        let strat = Momentum { id: "m", confidence: 0.7, expiry_secs: None };
        let cfg = BacktestConfig { expiry_candles: 2, ..config() };
        let trades = simulate(&strat, &Params::new(), &candles, &cfg).unwrap();
        assert!(!trades.is_empty());
        for w in trades.windows(2) {
            assert!(w[1].entry_index >= w[0].exit_index);
        }
        // Entry at 1 (1.1 > 1.0 → call), exit at 3 (1.3): win.
        assert_eq!(trades[0].entry_index, 1);
        assert_eq!(trades[0].exit_index, 3);
        assert_eq!(trades[0].outcome, Outcome::Win);
        assert!((trades[0].pnl - 8.5).abs() < 1e-12);
    }

    #[test]
    fn strategy_expiry_converts_to_candles() {
        let candles = series(&[1.0, 1.1, 1.2, 1.3, 1.4, 1.5]);
        let strat = Momentum { id: "m", confidence: 0.7, expiry_secs: Some(90) };
        let trades = simulate(&strat, &Params::new(), &candles, &config()).unwrap();
        // 90 s on 60 s candles rounds up to 2.
        assert_eq!(trades[0].exit_index - trades[0].entry_index, 2);

        let ignore = BacktestConfig { use_strategy_expiry: false, ..config() };
        let trades = simulate(&strat, &Params::new(), &candles, &ignore).unwrap();
        assert_eq!(trades[0].exit_index - trades[0].entry_index, 1);
    }

    #[test]
    fn date_range_is_inclusive() {
        let candles = series(&[1.0; 10]);
        let cfg = BacktestConfig {
            start_ms: Some(2 * 60_000),
            end_ms: Some(5 * 60_000),
            ..config()
        };
        let selected = select_range(&candles, &cfg);
        assert_eq!(selected.len(), 4);
        assert_eq!(selected[0].timestamp, 120_000);
    }

    #[test]
    fn failure_carries_candle_index() {
        struct Broken;
        impl Strategy for Broken {
            fn id(&self) -> &str {
                "broken"
            }
            fn name(&self) -> &str {
                "broken"
            }
            fn param_schema(&self) -> &[strategy::ParamSpec] {
                &[]
            }
            fn evaluate(&self, _c: &[Candle], _p: &Params) -> common::Result<common::StrategyResult> {
                Err(Error::strategy("broken", "no data"))
            }
        }
        let err = simulate(&Broken, &Params::new(), &series(&[1.0; 5]), &config()).unwrap_err();
        let SimulationError::Strategy { index, .. } = err;
        assert_eq!(index, 1);
    }

    #[test]
    fn interval_defaults_for_single_candle() {
        assert_eq!(candle_interval_ms(&series(&[1.0])), DEFAULT_INTERVAL_MS);
        assert_eq!(candle_interval_ms(&series(&[1.0, 2.0])), 60_000);
    }
}
