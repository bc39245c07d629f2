/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average over the whole slice, seeded with the SMA of
/// the first `period` values. Returns the latest value.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}

/// EMA series aligned to the end of `values`: element `i` corresponds to
/// `values[period - 1 + i]`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut ema_val = seed;
    for &price in &values[period..] {
        ema_val = price * k + ema_val * (1.0 - k);
        out.push(ema_val);
    }
    out
}

/// Wilder's smoothed moving average (SMMA / RMA). Returns the latest value.
pub fn smma(values: &[f64], period: usize) -> Option<f64> {
    smma_series(values, period).last().copied()
}

/// SMMA series aligned like [`ema_series`]: seeded with the SMA of the first
/// `period` values, then `(prev * (period - 1) + x) / period`.
pub fn smma_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let p = period as f64;
    let seed = values[..period].iter().sum::<f64>() / p;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut acc = seed;
    for &x in &values[period..] {
        acc = (acc * (p - 1.0) + x) / p;
        out.push(acc);
    }
    out
}

/// Population standard deviation of the last `period` values.
pub fn std_dev(values: &[f64], period: usize) -> Option<f64> {
    let mean = sma(values, period)?;
    let window = &values[values.len() - period..];
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
    Some(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_uses_last_window() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(sma(&values, 2), Some(4.5));
        assert_eq!(sma(&values, 5), Some(3.0));
        assert_eq!(sma(&values, 6), None);
        assert_eq!(sma(&values, 0), None);
    }

    #[test]
    fn ema_of_constant_series_is_constant() {
        let values = vec![42.0; 30];
        let v = ema(&values, 9).unwrap();
        assert!((v - 42.0).abs() < 1e-12);
    }

    #[test]
    fn ema_series_alignment() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let series = ema_series(&values, 3);
        assert_eq!(series.len(), 8);
        assert!((series[0] - 2.0).abs() < 1e-12);
        // k = 0.5 for period 3
        assert!((series[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn ema_follows_trend_faster_than_sma() {
        let values: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let e = ema(&values, 10).unwrap();
        let s = sma(&values, 10).unwrap();
        assert!(e > s - 1.0);
        assert!(e <= *values.last().unwrap());
    }

    #[test]
    fn smma_matches_wilder_recurrence() {
        let values = [2.0, 4.0, 6.0, 8.0];
        // seed = (2 + 4) / 2 = 3; then (3 + 6) / 2 = 4.5; then (4.5 + 8) / 2 = 6.25
        assert_eq!(smma_series(&values, 2), vec![3.0, 4.5, 6.25]);
        assert_eq!(smma(&values, 2), Some(6.25));
        assert_eq!(smma(&values, 5), None);
    }

    #[test]
    fn std_dev_population() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let sd = std_dev(&values, 8).unwrap();
        assert!((sd - 2.0).abs() < 1e-12);
        assert_eq!(std_dev(&values, 9), None);
    }
}
