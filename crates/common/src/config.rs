use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, Result};

/// All tunables, layered as defaults → optional TOML file → environment.
///
/// Example `config/signals.toml`:
/// ```toml
/// [generator]
/// min_confidence = 0.65
/// merge_mode = "best"
///
/// [backtest]
/// payout = 0.82
/// min_trades = 20
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub resample: ResampleConfig,
    pub generator: GeneratorConfig,
    pub backtest: BacktestConfig,
    pub extractor: ExtractorConfig,
}

impl Settings {
    /// Parse settings from TOML text. Missing sections fall back to defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read settings at '{}': {e}", path.display()))
        })?;
        let settings = Self::from_toml(&content)?;
        info!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Defaults (or `path` when given), then environment overrides.
    /// Loads `.env` if present.
    pub fn from_env(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let mut settings = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup. Split out from `from_env`
    /// so the mapping can be exercised without touching the process env.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "SIGNAL_MIN_CONFIDENCE")? {
            self.generator.min_confidence = v;
        }
        if let Some(v) = parse_var(&lookup, "SIGNAL_DEFAULT_EXPIRY_SECS")? {
            self.generator.default_expiry_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "SIGNAL_MERGE_MODE")? {
            self.generator.merge_mode = v;
        }
        if let Some(v) = parse_var(&lookup, "SIGNAL_TREND_FILTER")? {
            self.generator.trend_filter = v;
        }
        if let Some(v) = parse_var(&lookup, "RESAMPLE_INTERVAL_SECS")? {
            self.resample.interval_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "RESAMPLE_MIN_TICKS")? {
            self.resample.min_ticks = v;
        }
        if let Some(v) = parse_var(&lookup, "BACKTEST_MIN_TRADES")? {
            self.backtest.min_trades = v;
        }
        if let Some(v) = parse_var(&lookup, "BACKTEST_MIN_WIN_RATE")? {
            self.backtest.min_win_rate = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.resample.validate()?;
        self.generator.validate()?;
        self.backtest.validate()?;
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("{key}='{raw}': {e}")))?;
            debug!(key, "Applied environment override");
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Tick → candle aggregation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub interval_secs: u32,
    /// Buckets with fewer ticks than this are dropped.
    pub min_ticks: usize,
    pub drop_payout_ticks: bool,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            min_ticks: 1,
            drop_payout_ticks: true,
        }
    }
}

impl ResampleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::Config("resample.interval_secs must be > 0".into()));
        }
        Ok(())
    }
}

/// How the two primary mean-reversion evaluators are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Emit only when both agree; report the higher confidence.
    #[default]
    Consensus,
    /// Emit whichever fired with the higher confidence.
    Best,
    /// Primary evaluator only.
    Off,
}

impl FromStr for MergeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "consensus" => Ok(MergeMode::Consensus),
            "best" => Ok(MergeMode::Best),
            "off" => Ok(MergeMode::Off),
            other => Err(Error::Config(format!(
                "merge mode must be 'consensus', 'best' or 'off', got '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for MergeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeMode::Consensus => write!(f, "consensus"),
            MergeMode::Best => write!(f, "best"),
            MergeMode::Off => write!(f, "off"),
        }
    }
}

/// Signal generator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Per-symbol candle buffer cap; oldest evicted first.
    pub max_candles: usize,
    /// Evaluation starts once a buffer holds this many candles.
    pub min_candles: usize,
    /// Signal log cap; oldest evicted first.
    pub max_signals: usize,
    pub min_confidence: f64,
    pub default_expiry_secs: u32,
    pub merge_mode: MergeMode,
    pub trend_filter: bool,
    pub adx_period: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_candles: 250,
            min_candles: 50,
            max_signals: 200,
            min_confidence: 0.6,
            default_expiry_secs: 60,
            merge_mode: MergeMode::Consensus,
            trend_filter: true,
            adx_period: 14,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::Config(format!(
                "generator.min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.max_candles == 0 || self.min_candles > self.max_candles {
            return Err(Error::Config(
                "generator.min_candles must be <= max_candles and max_candles > 0".into(),
            ));
        }
        if self.adx_period == 0 {
            return Err(Error::Config("generator.adx_period must be > 0".into()));
        }
        Ok(())
    }
}

/// Weights of the relative composite score. Must sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub drawdown: f64,
    pub consecutive_losses: f64,
    pub trades_per_day: f64,
    pub recovery_factor: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            win_rate: 0.30,
            profit_factor: 0.20,
            drawdown: 0.15,
            consecutive_losses: 0.10,
            trades_per_day: 0.10,
            recovery_factor: 0.15,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.win_rate
            + self.profit_factor
            + self.drawdown
            + self.consecutive_losses
            + self.trades_per_day
            + self.recovery_factor
    }
}

/// Backtest simulation and leaderboard parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Stake per trade.
    pub bet_amount: f64,
    /// Payout on a win as a fraction of the stake (0.85 = 85 %).
    pub payout: f64,
    /// Candles between entry and resolution when no override applies.
    pub expiry_candles: usize,
    /// Convert a strategy-supplied expiry (seconds) into candles.
    pub use_strategy_expiry: bool,
    /// Inclusive candle timestamp range in ms.
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub initial_balance: f64,
    pub target_deposit: f64,
    pub volume_target_multiplier: f64,
    pub min_trades: usize,
    pub min_win_rate: f64,
    /// Required balance = max drawdown × this.
    pub drawdown_balance_multiple: f64,
    /// Candles handed to an evaluator per decision.
    pub lookback: usize,
    /// First decision index.
    pub warmup: usize,
    pub weights: ScoringWeights,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            bet_amount: 10.0,
            payout: 0.85,
            expiry_candles: 1,
            use_strategy_expiry: true,
            start_ms: None,
            end_ms: None,
            initial_balance: 1000.0,
            target_deposit: 1000.0,
            volume_target_multiplier: 10.0,
            min_trades: 10,
            min_win_rate: 0.0,
            drawdown_balance_multiple: 2.0,
            lookback: 250,
            warmup: 50,
            weights: ScoringWeights::default(),
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.bet_amount <= 0.0 {
            return Err(Error::Config("backtest.bet_amount must be > 0".into()));
        }
        if self.payout <= 0.0 {
            return Err(Error::Config("backtest.payout must be > 0".into()));
        }
        if self.expiry_candles == 0 {
            return Err(Error::Config("backtest.expiry_candles must be > 0".into()));
        }
        if self.lookback == 0 {
            return Err(Error::Config("backtest.lookback must be > 0".into()));
        }
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "backtest.weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }

    /// Win rate at which a binary bet with this payout breaks even.
    pub fn break_even_win_rate(&self) -> f64 {
        1.0 / (1.0 + self.payout)
    }
}

/// Leaderboard → strategy config extraction parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub min_trades: usize,
    pub max_strategies_per_symbol: usize,
    pub data_source: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_trades: 10,
            max_strategies_per_symbol: 5,
            data_source: "leaderboard".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_are_valid() {
        Settings::default().validate().unwrap();
        assert!((ScoringWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [generator]
            min_confidence = 0.7
            merge_mode = "best"
            "#,
        )
        .unwrap();
        assert_eq!(settings.generator.min_confidence, 0.7);
        assert_eq!(settings.generator.merge_mode, MergeMode::Best);
        assert_eq!(settings.generator.max_candles, 250);
        assert_eq!(settings.resample.interval_secs, 60);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let err = Settings::from_toml(
            r#"
            [backtest.weights]
            win_rate = 0.9
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SIGNAL_MIN_CONFIDENCE", "0.25"),
            ("SIGNAL_MERGE_MODE", "off"),
            ("RESAMPLE_INTERVAL_SECS", "30"),
        ]);
        let mut settings = Settings::default();
        settings
            .apply_env(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.generator.min_confidence, 0.25);
        assert_eq!(settings.generator.merge_mode, MergeMode::Off);
        assert_eq!(settings.resample.interval_secs, 30);
    }

    #[test]
    fn bad_env_value_is_config_error() {
        let mut settings = Settings::default();
        let err = settings
            .apply_env(|k| (k == "SIGNAL_MERGE_MODE").then(|| "sometimes".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn break_even_for_85_percent_payout() {
        let cfg = BacktestConfig::default();
        assert!((cfg.break_even_win_rate() - 1.0 / 1.85).abs() < 1e-12);
    }
}
