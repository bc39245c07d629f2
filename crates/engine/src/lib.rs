pub mod generator;
pub mod resample;

pub use generator::{
    passes_trend_filter, GeneratorStats, ListenerId, SignalGenerator, StrategyStats,
    UpdateOutcome,
};
pub use resample::{resample_ticks, split_payout_ticks};
