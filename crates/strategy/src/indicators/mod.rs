//! Stateless indicator functions over price slices and candle windows.
//!
//! Inputs are oldest first. Every function returns `None` (or an empty
//! series) when the window is too short; that is never an error.

pub mod adx;
pub mod moving_average;
pub mod rsi;
pub mod stochastic;

pub use adx::{adx, true_range, AdxValue};
pub use moving_average::{ema, ema_series, sma, smma, smma_series, std_dev};
pub use rsi::{rsi, rsi_averages, rsi_series};
pub use stochastic::{stochastic, stochastic_series, Stochastic};

/// Close prices of a candle window.
pub fn closes(candles: &[common::Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}
