//! Average Directional Index (Wilder).
//!
//! Steps:
//! 1. Compute +DM, -DM and true range from consecutive bars
//! 2. Smooth +DM, -DM and TR with Wilder smoothing
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR), -DI likewise
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX
//!
//! Needs at least `2 * period + 1` candles.

use common::Candle;

use super::moving_average::smma_series;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxValue {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// True range of `curr` given the previous close.
pub fn true_range(prev_close: f64, curr: &Candle) -> f64 {
    let hl = curr.high - curr.low;
    let hc = (curr.high - prev_close).abs();
    let lc = (curr.low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Latest ADX and directional indices for the window.
pub fn adx(candles: &[Candle], period: usize) -> Option<AdxValue> {
    if period == 0 || candles.len() < 2 * period + 1 {
        return None;
    }

    let n = candles.len();
    let mut tr = Vec::with_capacity(n - 1);
    let mut plus_dm = Vec::with_capacity(n - 1);
    let mut minus_dm = Vec::with_capacity(n - 1);

    for w in candles.windows(2) {
        let (prev, curr) = (&w[0], &w[1]);
        let up = curr.high - prev.high;
        let down = prev.low - curr.low;
        plus_dm.push(if up > down && up > 0.0 { up } else { 0.0 });
        minus_dm.push(if down > up && down > 0.0 { down } else { 0.0 });
        tr.push(true_range(prev.close, curr));
    }

    let smooth_tr = smma_series(&tr, period);
    let smooth_plus = smma_series(&plus_dm, period);
    let smooth_minus = smma_series(&minus_dm, period);

    let di: Vec<(f64, f64)> = smooth_tr
        .iter()
        .zip(smooth_plus.iter().zip(&smooth_minus))
        .map(|(&t, (&p, &m))| {
            if t == 0.0 {
                (0.0, 0.0)
            } else {
                (100.0 * p / t, 100.0 * m / t)
            }
        })
        .collect();

    let dx: Vec<f64> = di
        .iter()
        .map(|&(p, m)| {
            let sum = p + m;
            if sum == 0.0 {
                0.0
            } else {
                100.0 * (p - m).abs() / sum
            }
        })
        .collect();

    let adx = *smma_series(&dx, period).last()?;
    let &(plus_di, minus_di) = di.last()?;
    Some(AdxValue {
        adx,
        plus_di,
        minus_di,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_up(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let base = 100.0 + i as f64;
                Candle::new(i as i64 * 60_000, base, base + 1.2, base - 0.2, base + 1.0, 1.0)
            })
            .collect()
    }

    #[test]
    fn needs_two_periods_plus_one() {
        let candles = trending_up(28);
        assert!(adx(&candles, 14).is_none());
        let candles = trending_up(29);
        assert!(adx(&candles, 14).is_some());
    }

    #[test]
    fn steady_uptrend_has_high_adx_and_positive_direction() {
        let v = adx(&trending_up(60), 14).unwrap();
        assert!(v.adx > 40.0, "adx {}", v.adx);
        assert!(v.plus_di > v.minus_di);
    }

    #[test]
    fn flat_market_has_zero_adx() {
        let candles = vec![Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0); 40];
        let v = adx(&candles, 14).unwrap();
        assert_eq!(v.adx, 0.0);
        assert_eq!(v.plus_di, 0.0);
        assert_eq!(v.minus_di, 0.0);
    }

    #[test]
    fn adx_bounds() {
        let candles: Vec<Candle> = (0..80)
            .map(|i| {
                let mid = 50.0 + (i as f64 * 0.3).sin() * 4.0;
                Candle::new(i, mid, mid + 0.8, mid - 0.8, mid + 0.1, 1.0)
            })
            .collect();
        let v = adx(&candles, 14).unwrap();
        assert!((0.0..=100.0).contains(&v.adx));
    }

    #[test]
    fn true_range_includes_gap() {
        let c = Candle::new(0, 10.0, 10.5, 9.8, 10.2, 1.0);
        assert!((true_range(12.0, &c) - 2.2).abs() < 1e-12);
        assert!((true_range(10.0, &c) - 0.7).abs() < 1e-12);
    }
}
