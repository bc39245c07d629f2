//! Per-strategy performance metrics.
//!
//! Every metric is a pure function of the trade list (plus the backtest
//! config and the candle span). Ratios that would be infinite are capped at
//! [`RATIO_CAP`] so serialized results stay finite.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use common::{BacktestConfig, Outcome};

use crate::backtest::Trade;

pub const RATIO_CAP: f64 = 100.0;

const MS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub ties: usize,
    /// Wins over decisive (win + loss) trades.
    pub win_rate: f64,
    pub net_profit: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub final_balance: f64,
    pub peak_balance: f64,
    pub min_balance: f64,
    pub max_drawdown: f64,
    /// Percent of the running peak, 0..=100.
    pub max_drawdown_pct: f64,
    pub recovery_factor: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub sharpe: f64,
    pub sortino: f64,
    pub kelly_fraction: f64,
    /// Population std-dev of per-ISO-week win rates.
    pub win_rate_std_dev: f64,
    pub weeks: usize,
    pub span_days: f64,
    pub trades_per_day: f64,
    pub total_volume: f64,
    pub daily_volume: f64,
    pub days_to_volume_target: Option<f64>,
    pub min_required_balance: f64,
}

impl BacktestMetrics {
    /// `first_ms`/`last_ms` bound the simulated candle series.
    pub fn compute(trades: &[Trade], config: &BacktestConfig, first_ms: i64, last_ms: i64) -> Self {
        let wins = count(trades, Outcome::Win);
        let losses = count(trades, Outcome::Loss);
        let ties = count(trades, Outcome::Tie);
        let win_rate = win_rate(wins, losses);

        let gross_profit: f64 = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
        let gross_loss: f64 = trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum();
        let net_profit = gross_profit - gross_loss;

        let curve = balance_curve(trades, config.initial_balance);
        let (max_drawdown, max_drawdown_pct) = max_drawdown(&curve);
        let final_balance = curve.last().copied().unwrap_or(config.initial_balance);
        let peak_balance = curve.iter().copied().fold(f64::MIN, f64::max);
        let min_balance = curve.iter().copied().fold(f64::MAX, f64::min);

        let returns: Vec<f64> = trades.iter().map(|t| t.pnl / config.bet_amount).collect();
        let weekly = weekly_win_rates(trades);

        let span_days = ((last_ms - first_ms) as f64 / MS_PER_DAY).max(1.0);
        let total_volume = trades.len() as f64 * config.bet_amount;
        let daily_volume = total_volume / span_days;

        Self {
            trades: trades.len(),
            wins,
            losses,
            ties,
            win_rate,
            net_profit,
            gross_profit,
            gross_loss,
            profit_factor: profit_factor(gross_profit, gross_loss),
            expectancy: if trades.is_empty() {
                0.0
            } else {
                net_profit / trades.len() as f64
            },
            final_balance,
            peak_balance,
            min_balance,
            max_drawdown,
            max_drawdown_pct,
            recovery_factor: recovery_factor(net_profit, max_drawdown),
            max_consecutive_wins: max_consecutive(trades, Outcome::Win),
            max_consecutive_losses: max_consecutive(trades, Outcome::Loss),
            sharpe: sharpe_ratio(&returns),
            sortino: sortino_ratio(&returns),
            kelly_fraction: kelly_fraction(win_rate, config.payout),
            win_rate_std_dev: population_std_dev(&weekly),
            weeks: weekly.len(),
            span_days,
            trades_per_day: trades.len() as f64 / span_days,
            total_volume,
            daily_volume,
            days_to_volume_target: days_to_volume_target(
                config.target_deposit * config.volume_target_multiplier,
                daily_volume,
            ),
            min_required_balance: (max_drawdown * config.drawdown_balance_multiple)
                .max(config.bet_amount),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

fn count(trades: &[Trade], outcome: Outcome) -> usize {
    trades.iter().filter(|t| t.outcome == outcome).count()
}

pub fn win_rate(wins: usize, losses: usize) -> f64 {
    let decisive = wins + losses;
    if decisive == 0 {
        0.0
    } else {
        wins as f64 / decisive as f64
    }
}

/// Gross profit / gross loss, capped. No losses: cap if profitable, else 0.
pub fn profit_factor(gross_profit: f64, gross_loss: f64) -> f64 {
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { RATIO_CAP } else { 0.0 };
    }
    (gross_profit / gross_loss).min(RATIO_CAP)
}

/// Net profit / max drawdown, capped.
pub fn recovery_factor(net_profit: f64, max_drawdown: f64) -> f64 {
    if max_drawdown < 1e-10 {
        return if net_profit > 0.0 { RATIO_CAP } else { 0.0 };
    }
    (net_profit / max_drawdown).clamp(-RATIO_CAP, RATIO_CAP)
}

/// Running balance after each trade, starting with the initial balance.
pub fn balance_curve(trades: &[Trade], initial_balance: f64) -> Vec<f64> {
    let mut curve = Vec::with_capacity(trades.len() + 1);
    let mut balance = initial_balance;
    curve.push(balance);
    for t in trades {
        balance += t.pnl;
        curve.push(balance);
    }
    curve
}

/// Largest peak-to-trough fall as (currency, percent of peak).
pub fn max_drawdown(curve: &[f64]) -> (f64, f64) {
    let Some(&first) = curve.first() else {
        return (0.0, 0.0);
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_pct = 0.0_f64;
    for &balance in curve {
        if balance > peak {
            peak = balance;
        }
        let dd = peak - balance;
        if dd > max_dd {
            max_dd = dd;
        }
        if peak > 0.0 {
            max_dd_pct = max_dd_pct.max(dd / peak * 100.0);
        }
    }
    (max_dd, max_dd_pct)
}

pub fn max_consecutive(trades: &[Trade], outcome: Outcome) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.outcome == outcome {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

/// Per-trade Sharpe: mean / sample std of returns. 0 below two trades or
/// with zero variance.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = sample_std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean(returns) / std).clamp(-RATIO_CAP, RATIO_CAP)
}

/// Per-trade Sortino: mean / downside deviation. No downside: cap if the
/// mean is positive, else 0.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let m = mean(returns);
    let downside_sq: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    if downside_sq <= 0.0 {
        return if m > 0.0 { RATIO_CAP } else { 0.0 };
    }
    let downside = (downside_sq / returns.len() as f64).sqrt();
    (m / downside).clamp(-RATIO_CAP, RATIO_CAP)
}

/// Kelly = (b·p − q) / b with odds `b` = payout, clamped to [0, 1].
pub fn kelly_fraction(win_probability: f64, payout: f64) -> f64 {
    if payout <= 0.0 {
        return 0.0;
    }
    let p = win_probability;
    let q = 1.0 - p;
    ((payout * p - q) / payout).clamp(0.0, 1.0)
}

/// Win rate per ISO week of the entry candle, in week order. Weeks without
/// a decisive trade are skipped.
pub fn weekly_win_rates(trades: &[Trade]) -> Vec<f64> {
    let mut weeks: BTreeMap<(i32, u32), (usize, usize)> = BTreeMap::new();
    for t in trades {
        let Some(dt) = DateTime::<Utc>::from_timestamp_millis(t.entry_ms) else {
            continue;
        };
        let week = dt.iso_week();
        let bucket = weeks.entry((week.year(), week.week())).or_default();
        match t.outcome {
            Outcome::Win => bucket.0 += 1,
            Outcome::Loss => bucket.1 += 1,
            Outcome::Tie => {}
        }
    }
    weeks
        .values()
        .filter(|(w, l)| w + l > 0)
        .map(|&(w, l)| win_rate(w, l))
        .collect()
}

/// `None` when no volume is traded.
pub fn days_to_volume_target(target_volume: f64, daily_volume: f64) -> Option<f64> {
    if daily_volume <= 0.0 {
        None
    } else {
        Some(target_volume / daily_volume)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

pub(crate) fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Direction;

    const WEEK_MS: i64 = 7 * 86_400_000;
    // 2024-01-01T00:00:00Z, a Monday.
    const MONDAY_MS: i64 = 1_704_067_200_000;

    fn trade(outcome: Outcome, entry_ms: i64) -> Trade {
        let pnl = match outcome {
            Outcome::Win => 8.5,
            Outcome::Loss => -10.0,
            Outcome::Tie => 0.0,
        };
        Trade {
            entry_index: 0,
            exit_index: 1,
            entry_ms,
            direction: Direction::Call,
            entry_price: 1.0,
            exit_price: 1.0,
            outcome,
            pnl,
        }
    }

    fn trades(outcomes: &[Outcome]) -> Vec<Trade> {
        outcomes.iter().map(|&o| trade(o, MONDAY_MS)).collect()
    }

    use Outcome::{Loss as L, Tie as T, Win as W};

    #[test]
    fn counts_and_profitability() {
        let t = trades(&[W, W, L, T, W]);
        let m = BacktestMetrics::compute(&t, &BacktestConfig::default(), MONDAY_MS, MONDAY_MS);
        assert_eq!((m.trades, m.wins, m.losses, m.ties), (5, 3, 1, 1));
        assert!((m.win_rate - 0.75).abs() < 1e-12);
        assert!((m.net_profit - 15.5).abs() < 1e-9);
        assert!((m.profit_factor - 2.55).abs() < 1e-9);
        assert!((m.expectancy - 3.1).abs() < 1e-9);
        assert!((m.final_balance - 1015.5).abs() < 1e-9);
    }

    #[test]
    fn drawdown_from_peak() {
        let t = trades(&[W, L, L, W]);
        let curve = balance_curve(&t, 1000.0);
        let (dd, pct) = max_drawdown(&curve);
        assert!((dd - 20.0).abs() < 1e-9);
        assert!((pct - 20.0 / 1008.5 * 100.0).abs() < 1e-9);
        let m = BacktestMetrics::compute(&t, &BacktestConfig::default(), 0, 0);
        assert!((m.min_required_balance - 40.0).abs() < 1e-9);
        assert!((m.min_balance - 988.5).abs() < 1e-9);
    }

    #[test]
    fn no_losses_caps_ratios() {
        let t = trades(&[W, W, W]);
        let m = BacktestMetrics::compute(&t, &BacktestConfig::default(), 0, 0);
        assert_eq!(m.profit_factor, RATIO_CAP);
        assert_eq!(m.recovery_factor, RATIO_CAP);
        assert_eq!(m.sortino, RATIO_CAP);
        assert_eq!(m.sharpe, 0.0);
        assert!((m.min_required_balance - 10.0).abs() < 1e-12);
    }

    #[test]
    fn streaks() {
        let t = trades(&[W, W, L, L, L, W, T, L]);
        assert_eq!(max_consecutive(&t, Outcome::Win), 2);
        assert_eq!(max_consecutive(&t, Outcome::Loss), 3);
    }

    #[test]
    fn kelly_matches_formula() {
        // p = 0.6, b = 0.85 → (0.51 − 0.4) / 0.85
        assert!((kelly_fraction(0.6, 0.85) - 0.11 / 0.85).abs() < 1e-12);
        assert_eq!(kelly_fraction(0.4, 0.85), 0.0);
        assert_eq!(kelly_fraction(1.0, 0.85), 1.0);
    }

    #[test]
    fn sharpe_uses_sample_std() {
        let returns = [0.85, -1.0];
        let m = (0.85 - 1.0) / 2.0;
        let std = (((0.85 - m) * (0.85 - m) + (-1.0 - m) * (-1.0 - m)) / 1.0_f64).sqrt();
        assert!((sharpe_ratio(&returns) - m / std).abs() < 1e-12);
        assert_eq!(sharpe_ratio(&[0.85]), 0.0);
    }

    #[test]
    fn weekly_win_rate_buckets_by_iso_week() {
        let t = vec![
            trade(W, MONDAY_MS),
            trade(L, MONDAY_MS + 3_600_000),
            trade(W, MONDAY_MS + WEEK_MS),
            trade(W, MONDAY_MS + WEEK_MS + 1),
            trade(T, MONDAY_MS + 2 * WEEK_MS),
        ];
        assert_eq!(weekly_win_rates(&t), vec![0.5, 1.0]);
        assert!((population_std_dev(&[0.5, 1.0]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn volume_target_days() {
        let t = trades(&[W, L]);
        // Two days of data, 2 × 10 traded → 10 per day; target 1000 × 10.
        let m = BacktestMetrics::compute(&t, &BacktestConfig::default(), 0, 2 * 86_400_000);
        assert!((m.daily_volume - 10.0).abs() < 1e-12);
        assert_eq!(m.days_to_volume_target, Some(1000.0));
        assert_eq!(days_to_volume_target(100.0, 0.0), None);
    }

    #[test]
    fn empty_trade_list_is_all_zero() {
        let m = BacktestMetrics::compute(&[], &BacktestConfig::default(), 0, 0);
        assert_eq!(m.trades, 0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.expectancy, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.days_to_volume_target, None);
        assert_eq!(m.final_balance, 1000.0);
    }
}
