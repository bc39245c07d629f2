use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Indicator name → value snapshot attached to strategy results and signals.
pub type IndicatorSnapshot = BTreeMap<String, f64>;

/// Single observation from the feed.
///
/// Price rows carry a small intra-tick spread across OHLC; broker payout
/// telemetry rides the same feed as flat rows. `timestamp` is in (fractional)
/// seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub timestamp: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    /// Where the tick came from, e.g. "history" or "realtime".
    #[serde(default)]
    pub source: String,
}

impl Tick {
    /// Build a flat tick with `value` duplicated across OHLC.
    pub fn new(symbol: impl Into<String>, timestamp: f64, value: f64) -> Self {
        Self::ohlc(symbol, timestamp, value, value, value, value)
    }

    pub fn ohlc(
        symbol: impl Into<String>,
        timestamp: f64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume: 0.0,
            source: "realtime".to_string(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn price(&self) -> f64 {
        self.close
    }

    /// True when this row is broker payout telemetry rather than a price.
    ///
    /// Payout rows are flat (open = high = low = close) and bounded in
    /// [0, 100]. The source tag is ignored.
    pub fn is_payout(&self) -> bool {
        let v = self.close;
        self.open == v && self.high == v && self.low == v && (0.0..=100.0).contains(&v)
    }
}

/// OHLCV candle. `timestamp` is the bucket start in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Direction of a binary signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    /// +1 for call, -1 for put.
    pub fn sign(self) -> i8 {
        match self {
            Direction::Call => 1,
            Direction::Put => -1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Call => Direction::Put,
            Direction::Put => Direction::Call,
        }
    }

    /// Map a trend direction (+1 / -1) to the signal direction that follows it.
    pub fn from_sign(sign: i8) -> Option<Self> {
        match sign {
            s if s > 0 => Some(Direction::Call),
            s if s < 0 => Some(Direction::Put),
            _ => None,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Call => write!(f, "call"),
            Direction::Put => write!(f, "put"),
        }
    }
}

/// Market regime derived from ADX and the directional indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    StrongUptrend,
    WeakUptrend,
    Ranging,
    WeakDowntrend,
    StrongDowntrend,
    #[default]
    Unknown,
}

impl Regime {
    pub fn is_trending(self) -> bool {
        matches!(
            self,
            Regime::StrongUptrend | Regime::WeakUptrend | Regime::WeakDowntrend | Regime::StrongDowntrend
        )
    }

    pub fn is_strong(self) -> bool {
        matches!(self, Regime::StrongUptrend | Regime::StrongDowntrend)
    }

    pub fn is_weak(self) -> bool {
        matches!(self, Regime::WeakUptrend | Regime::WeakDowntrend)
    }
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Regime::StrongUptrend => "strong_uptrend",
            Regime::WeakUptrend => "weak_uptrend",
            Regime::Ranging => "ranging",
            Regime::WeakDowntrend => "weak_downtrend",
            Regime::StrongDowntrend => "strong_downtrend",
            Regime::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// Regime snapshot. Recomputed on every evaluation, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeInfo {
    pub regime: Regime,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    /// +1 up, -1 down, 0 flat.
    pub direction: i8,
}

impl RegimeInfo {
    pub fn unknown() -> Self {
        Self {
            regime: Regime::Unknown,
            adx: 0.0,
            plus_di: 0.0,
            minus_di: 0.0,
            direction: 0,
        }
    }

    /// The signal direction that goes with the trend, if there is one.
    pub fn trend_direction(&self) -> Option<Direction> {
        if self.regime.is_trending() {
            Direction::from_sign(self.direction)
        } else {
            None
        }
    }
}

/// Opinion returned by a strategy evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    /// `None` means the strategy looked and has no opinion.
    pub direction: Option<Direction>,
    /// Always within [0, 1].
    pub confidence: f64,
    pub reason: String,
    #[serde(default)]
    pub indicators: IndicatorSnapshot,
    #[serde(default)]
    pub strategy_id: Option<String>,
    #[serde(default)]
    pub expiry_secs: Option<u32>,
}

impl StrategyResult {
    /// A directional opinion. Confidence is clamped into [0, 1]; NaN becomes 0.
    pub fn signal(direction: Direction, confidence: f64, reason: impl Into<String>) -> Self {
        Self {
            direction: Some(direction),
            confidence: clamp_unit(confidence),
            reason: reason.into(),
            indicators: IndicatorSnapshot::new(),
            strategy_id: None,
            expiry_secs: None,
        }
    }

    /// No opinion.
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            direction: None,
            confidence: 0.0,
            reason: reason.into(),
            indicators: IndicatorSnapshot::new(),
            strategy_id: None,
            expiry_secs: None,
        }
    }

    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    pub fn with_strategy_id(mut self, id: impl Into<String>) -> Self {
        self.strategy_id = Some(id.into());
        self
    }

    pub fn with_expiry(mut self, secs: u32) -> Self {
        self.expiry_secs = Some(secs);
        self
    }

    pub fn is_directional(&self) -> bool {
        self.direction.is_some()
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Lifecycle status of an emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    #[default]
    Pending,
    Win,
    Loss,
    Tie,
}

impl std::fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalStatus::Pending => write!(f, "pending"),
            SignalStatus::Win => write!(f, "win"),
            SignalStatus::Loss => write!(f, "loss"),
            SignalStatus::Tie => write!(f, "tie"),
        }
    }
}

/// Resolution reported back for a pending signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

impl From<Outcome> for SignalStatus {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Win => SignalStatus::Win,
            Outcome::Loss => SignalStatus::Loss,
            Outcome::Tie => SignalStatus::Tie,
        }
    }
}

/// A governed signal emitted by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub symbol: String,
    pub direction: Direction,
    pub strategy_id: String,
    pub regime: Regime,
    pub confidence: f64,
    pub expiry_secs: u32,
    pub entry_price: f64,
    /// Timestamp (ms) of the candle the signal was decided on.
    pub candle_timestamp: i64,
    pub indicators: IndicatorSnapshot,
    pub status: SignalStatus,
}

impl Signal {
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn is_pending(&self) -> bool {
        self.status == SignalStatus::Pending
    }
}
