//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothed moving average (same as TradingView / standard RSI).
//! Zero average loss is defined as 100, including a perfectly flat window.

use super::moving_average::smma_series;

/// Latest RSI from close prices (oldest first).
/// Returns `None` if there are fewer than `period + 1` values.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    rsi_series(closes, period).last().copied()
}

/// Latest Wilder-smoothed (average gain, average loss). Both are 0 when the
/// window has no price movement at all.
pub fn rsi_averages(closes: &[f64], period: usize) -> Option<(f64, f64)> {
    averages_series(closes, period).last().copied()
}

fn averages_series(closes: &[f64], period: usize) -> Vec<(f64, f64)> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = changes.iter().map(|&c| c.max(0.0)).collect();
    let losses: Vec<f64> = changes.iter().map(|&c| (-c).max(0.0)).collect();

    smma_series(&gains, period)
        .into_iter()
        .zip(smma_series(&losses, period))
        .collect()
}

/// RSI for every bar from index `period` onward; element `i` corresponds to
/// `closes[period + i]`. Empty when there are fewer than `period + 1` values.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    averages_series(closes, period)
        .into_iter()
        .map(|(avg_gain, avg_loss)| {
            if avg_loss == 0.0 {
                100.0
            } else {
                let rs = avg_gain / avg_loss;
                100.0 - 100.0 / (1.0 + rs)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_returns_none_when_insufficient_data() {
        // Need at least period+1 = 15 values
        let prices = vec![100.0; 14];
        assert!(rsi(&prices, 14).is_none());
    }

    #[test]
    fn rsi_returns_some_with_sufficient_data() {
        // 15 values: exactly period + 1
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert!(rsi(&prices, 14).is_some());
        assert_eq!(rsi_series(&prices, 14).len(), 1);
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let prices = vec![10.0, 11.0, 12.0, 13.0, 14.0];
        let value = rsi(&prices, 3).unwrap();
        assert!((value - 100.0).abs() < 1e-6, "Expected ~100, got {value}");
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let prices = vec![14.0, 13.0, 12.0, 11.0, 10.0];
        let value = rsi(&prices, 3).unwrap();
        assert!((value - 0.0).abs() < 1e-6, "Expected ~0, got {value}");
    }

    #[test]
    fn rsi_flat_window_is_100() {
        let prices = vec![1.1; 20];
        assert_eq!(rsi(&prices, 14), Some(100.0));
    }

    #[test]
    fn averages_are_zero_only_without_movement() {
        assert_eq!(rsi_averages(&[1.1; 20], 14), Some((0.0, 0.0)));
        let (gain, loss) = rsi_averages(&[10.0, 11.0, 12.0, 13.0, 14.0], 3).unwrap();
        assert!(gain > 0.0);
        assert_eq!(loss, 0.0);
        assert!(rsi_averages(&[1.0; 3], 3).is_none());
    }

    #[test]
    fn rsi_known_value() {
        // Wilder's worked example: first RSI of the series ≈ 70.46
        let prices = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28,
        ];
        let v = rsi(&prices, 14).unwrap();
        assert!((v - 70.46).abs() < 0.1, "RSI {v}");
    }

    #[test]
    fn rsi_stays_in_range() {
        let prices: Vec<f64> = (0..80)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0)
            .collect();
        for v in rsi_series(&prices, 14) {
            assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
        }
    }
}
