//! Stochastic oscillator (%K / %D).
//!
//! %K = 100 · (close − lowest low) / (highest high − lowest low) over `k_period`
//! candles; a zero range is defined as the neutral midpoint 50.
//! %D = SMA of the last `d_period` %K values.

use common::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stochastic {
    pub k: f64,
    pub d: f64,
}

/// Latest %K / %D. Needs `k_period + d_period - 1` candles.
pub fn stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> Option<Stochastic> {
    stochastic_series(candles, k_period, d_period).last().copied()
}

/// %K / %D for every bar where both exist, oldest first.
pub fn stochastic_series(candles: &[Candle], k_period: usize, d_period: usize) -> Vec<Stochastic> {
    if k_period == 0 || d_period == 0 || candles.len() < k_period + d_period - 1 {
        return Vec::new();
    }

    let k_values: Vec<f64> = candles
        .windows(k_period)
        .map(|w| {
            let highest = w.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
            let lowest = w.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let range = highest - lowest;
            if range == 0.0 {
                50.0
            } else {
                100.0 * (w[w.len() - 1].close - lowest) / range
            }
        })
        .collect();

    k_values
        .windows(d_period)
        .map(|w| Stochastic {
            k: w[w.len() - 1],
            d: w.iter().sum::<f64>() / d_period as f64,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, close, high, low, close, 1.0)
    }

    #[test]
    fn insufficient_data_is_none() {
        let candles = vec![candle(2.0, 1.0, 1.5); 15];
        assert!(stochastic(&candles, 14, 3).is_none());
        assert!(stochastic(&candles, 14, 2).is_some());
    }

    #[test]
    fn zero_range_is_midpoint() {
        let candles = vec![candle(1.0, 1.0, 1.0); 20];
        let s = stochastic(&candles, 14, 3).unwrap();
        assert_eq!(s.k, 50.0);
        assert_eq!(s.d, 50.0);
    }

    #[test]
    fn close_at_high_is_100() {
        let mut candles: Vec<Candle> = (0..16).map(|i| candle(10.0 + i as f64, 9.0, 9.5)).collect();
        let last = candles.len() - 1;
        candles[last].close = candles[last].high;
        let s = stochastic(&candles, 14, 3).unwrap();
        assert!((s.k - 100.0).abs() < 1e-9);
        assert!(s.d <= s.k);
    }

    #[test]
    fn values_bounded() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| {
                let mid = 100.0 + (i as f64 * 0.4).sin() * 3.0;
                candle(mid + 0.5, mid - 0.5, mid + (i as f64).cos() * 0.4)
            })
            .collect();
        for s in stochastic_series(&candles, 14, 3) {
            assert!((0.0..=100.0).contains(&s.k));
            assert!((0.0..=100.0).contains(&s.d));
        }
    }
}
