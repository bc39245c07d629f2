pub mod config;
pub mod error;
pub mod types;

pub use config::{
    BacktestConfig, ExtractorConfig, GeneratorConfig, MergeMode, ResampleConfig, ScoringWeights,
    Settings,
};
pub use error::{Error, Result};
pub use types::*;
