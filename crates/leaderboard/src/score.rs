//! Two independent verdicts on a strategy.
//!
//! The composite score is relative: min-max normalized across the entries of
//! one run, so it only orders peers. The grade is absolute: fixed thresholds,
//! no peers involved.

use serde::{Deserialize, Serialize};

use common::{BacktestConfig, ScoringWeights};

use crate::metrics::BacktestMetrics;

/// Normalized value used when every entry has the same raw value.
const DEGENERATE_NORM: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        write!(f, "{s}")
    }
}

/// Absolute grade. A non-positive expectancy is always F; otherwise points
/// are awarded for win-rate margin over break-even, profit factor, drawdown
/// and recovery.
pub fn grade(metrics: &BacktestMetrics, config: &BacktestConfig) -> Grade {
    if metrics.trades == 0 || metrics.expectancy <= 0.0 {
        return Grade::F;
    }

    let margin = metrics.win_rate - config.break_even_win_rate();
    let points = tier(margin, 0.05, 0.02)
        + tier(metrics.profit_factor, 1.5, 1.2)
        + tier(-metrics.max_drawdown_pct, -10.0, -25.0)
        + tier(metrics.recovery_factor, 3.0, 1.0);

    if points >= 7 {
        Grade::A
    } else if points >= 5 {
        Grade::B
    } else if points >= 3 {
        Grade::C
    } else {
        Grade::D
    }
}

fn tier(value: f64, high: f64, low: f64) -> u32 {
    if value >= high {
        2
    } else if value >= low {
        1
    } else {
        0
    }
}

/// Raw criterion values in weight order. `true` marks criteria where lower is
/// better.
fn criteria(m: &BacktestMetrics) -> [(f64, bool); 6] {
    [
        (m.win_rate, false),
        (m.profit_factor, false),
        (m.max_drawdown_pct, true),
        (m.max_consecutive_losses as f64, true),
        (m.trades_per_day, false),
        (m.recovery_factor, false),
    ]
}

fn weight_vector(w: &ScoringWeights) -> [f64; 6] {
    [
        w.win_rate,
        w.profit_factor,
        w.drawdown,
        w.consecutive_losses,
        w.trades_per_day,
        w.recovery_factor,
    ]
}

/// Composite score in [0, 100] for each metrics set, in input order.
///
/// Min and max are order-independent and each score sums its terms in a fixed
/// order, so permuting the input permutes the output bit-for-bit.
pub fn composite_scores(metrics: &[&BacktestMetrics], weights: &ScoringWeights) -> Vec<f64> {
    let weights = weight_vector(weights);
    let raw: Vec<[(f64, bool); 6]> = metrics.iter().map(|m| criteria(m)).collect();

    let mut lo = [f64::INFINITY; 6];
    let mut hi = [f64::NEG_INFINITY; 6];
    for row in &raw {
        for (k, (v, _)) in row.iter().enumerate() {
            lo[k] = lo[k].min(*v);
            hi[k] = hi[k].max(*v);
        }
    }

    raw.iter()
        .map(|row| {
            let mut score = 0.0;
            for (k, &(v, inverted)) in row.iter().enumerate() {
                let range = hi[k] - lo[k];
                let norm = if range.abs() < 1e-12 {
                    DEGENERATE_NORM
                } else if inverted {
                    (hi[k] - v) / range
                } else {
                    (v - lo[k]) / range
                };
                score += weights[k] * norm;
            }
            score * 100.0
        })
        .collect()
}
