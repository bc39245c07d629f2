//! Backtest scoring and strategy-config extraction.
//!
//! [`LeaderboardScorer`] runs strategies over historical candles and ranks
//! them; [`extract_config`] turns ranked results into the document the
//! signal generator loads.

pub mod backtest;
pub mod extractor;
pub mod metrics;
pub mod score;
pub mod scorer;

pub use backtest::{simulate, SimulationError, Trade};
pub use extractor::{extract_config, extract_config_at};
pub use metrics::BacktestMetrics;
pub use score::{composite_scores, grade, Grade};
pub use scorer::{
    compare_entries, rank_entries, Candidate, FailedStrategy, LeaderboardEntry, LeaderboardResult,
    LeaderboardScorer,
};
