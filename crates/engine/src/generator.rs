//! Signal generator: per-symbol candle buffers → regime → strategy selection
//! → trend / confidence filters → governed signals with outcome feedback.
//!
//! One instance owns its buffers, signal log, counters and listeners. There
//! is no global instance; construct one per driver (live feed, backtest, test).

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use common::{
    Candle, Direction, GeneratorConfig, IndicatorSnapshot, Outcome, RegimeInfo, Signal,
    SignalStatus, StrategyResult,
};
use strategy::evaluators::{self, Evaluator};
use strategy::regime::{detect_regime, COUNTER_TREND_BLOCK_ADX};
use strategy::{invoke_with_regime, merge, MergeDecision, Strategy, StrategyConfigDocument, StrategyRegistry};

/// Handle returned by [`SignalGenerator::on_signal`]; pass it to
/// [`SignalGenerator::remove_listener`] to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&Signal) + Send + Sync>;

/// Result of reporting an outcome for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Pending signal resolved; counters updated.
    Updated,
    /// No signal with this id in the log (never existed or evicted).
    UnknownId,
    /// Signal was already resolved; the first outcome stands.
    AlreadyResolved,
}

/// Per-strategy counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyStats {
    pub generated: u64,
    pub wins: u64,
    pub losses: u64,
    pub ties: u64,
}

impl StrategyStats {
    /// Wins over decided (win + loss) outcomes; 0 when nothing is decided.
    pub fn win_rate(&self) -> f64 {
        let decided = self.wins + self.losses;
        if decided == 0 {
            0.0
        } else {
            self.wins as f64 / decided as f64
        }
    }

    pub fn resolved(&self) -> u64 {
        self.wins + self.losses + self.ties
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorStats {
    pub total_generated: u64,
    pub filtered_trend: u64,
    pub filtered_confidence: u64,
    pub by_strategy: BTreeMap<String, StrategyStats>,
}

impl GeneratorStats {
    pub fn filtered_total(&self) -> u64 {
        self.filtered_trend + self.filtered_confidence
    }
}

/// Why a selected opinion did not become a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    CounterTrend,
    LowConfidence,
}

/// Built-in regime routing.
struct Router {
    trend: Vec<Evaluator>,
    primary: Option<Evaluator>,
    secondary: Option<Evaluator>,
    fallback: Vec<Evaluator>,
}

impl Router {
    fn builtin() -> Self {
        Self {
            trend: evaluators::TREND_ROUTE
                .iter()
                .filter_map(|id| evaluators::find(id))
                .collect(),
            primary: evaluators::find(evaluators::REVERSION_PRIMARY),
            secondary: evaluators::find(evaluators::REVERSION_SECONDARY),
            fallback: evaluators::REVERSION_FALLBACK
                .iter()
                .filter_map(|id| evaluators::find(id))
                .collect(),
        }
    }
}

pub struct SignalGenerator {
    config: GeneratorConfig,
    registry: StrategyRegistry,
    router: Router,
    strategy_config: Option<StrategyConfigDocument>,
    buffers: HashMap<String, Vec<Candle>>,
    signals: VecDeque<Signal>,
    stats: GeneratorStats,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl SignalGenerator {
    pub fn new(config: GeneratorConfig, registry: StrategyRegistry) -> Self {
        info!(
            strategies = registry.len(),
            min_confidence = config.min_confidence,
            merge_mode = %config.merge_mode,
            trend_filter = config.trend_filter,
            "SignalGenerator initialized"
        );
        Self {
            config,
            registry,
            router: Router::builtin(),
            strategy_config: None,
            buffers: HashMap::new(),
            signals: VecDeque::new(),
            stats: GeneratorStats::default(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Default config and built-in strategies only.
    pub fn with_defaults() -> Self {
        Self::new(GeneratorConfig::default(), StrategyRegistry::builtin())
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    // ─── Strategy config ──────────────────────────────────────────────────────

    /// Install per-symbol strategy preferences. Unknown ids are kept (they are
    /// skipped at selection time) but logged here.
    pub fn load_config(&mut self, document: StrategyConfigDocument) {
        for (symbol, prefs) in &document.symbols {
            for id in prefs.strategies.iter().filter(|id| !self.registry.contains(id)) {
                warn!(symbol = %symbol, strategy = %id, "Config names an unregistered strategy");
            }
        }
        info!(
            symbols = document.symbols.len(),
            data_source = %document.data_source,
            "Strategy config loaded"
        );
        self.strategy_config = Some(document);
    }

    pub fn clear_config(&mut self) {
        self.strategy_config = None;
    }

    pub fn strategy_config(&self) -> Option<&StrategyConfigDocument> {
        self.strategy_config.as_ref()
    }

    // ─── Candle intake ────────────────────────────────────────────────────────

    /// Append a candle and evaluate once enough history is buffered.
    ///
    /// A candle with the same timestamp as the last buffered one replaces it
    /// (an in-progress candle update); an older candle is ignored.
    pub fn add_candle(&mut self, symbol: &str, candle: Candle) -> Option<Signal> {
        let max = self.config.max_candles;
        let buffer = self.buffers.entry(symbol.to_string()).or_default();

        match buffer.last().map(|c| c.timestamp) {
            Some(last_ts) if candle.timestamp < last_ts => {
                debug!(symbol, ts = candle.timestamp, "Ignoring out-of-order candle");
                return None;
            }
            Some(last_ts) if candle.timestamp == last_ts => {
                let idx = buffer.len() - 1;
                buffer[idx] = candle;
            }
            _ => buffer.push(candle),
        }
        if buffer.len() > max {
            let excess = buffer.len() - max;
            buffer.drain(..excess);
        }

        if buffer.len() < self.config.min_candles {
            return None;
        }
        self.evaluate(symbol)
    }

    /// Replace a symbol's buffer wholesale, keeping the newest `max_candles`.
    /// Candles are sorted by timestamp and duplicates keep the later entry.
    pub fn set_history(&mut self, symbol: &str, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.timestamp);
        let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
        for c in candles {
            if deduped.last().map(|l| l.timestamp) == Some(c.timestamp) {
                deduped.pop();
            }
            deduped.push(c);
        }
        if deduped.len() > self.config.max_candles {
            let excess = deduped.len() - self.config.max_candles;
            deduped.drain(..excess);
        }
        debug!(symbol, candles = deduped.len(), "History replaced");
        self.buffers.insert(symbol.to_string(), deduped);
    }

    /// Feed candles one by one through [`add_candle`](Self::add_candle) and
    /// collect every emitted signal.
    pub fn replay(&mut self, symbol: &str, candles: &[Candle]) -> Vec<Signal> {
        candles
            .iter()
            .filter_map(|c| self.add_candle(symbol, *c))
            .collect()
    }

    pub fn candles(&self, symbol: &str) -> &[Candle] {
        self.buffers.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Current regime, or `None` while fewer than `min_candles` are buffered.
    pub fn get_regime(&self, symbol: &str) -> Option<RegimeInfo> {
        let candles = self.candles(symbol);
        if candles.len() < self.config.min_candles {
            return None;
        }
        Some(detect_regime(candles, self.config.adx_period))
    }

    // ─── Evaluation pipeline ──────────────────────────────────────────────────

    fn evaluate(&mut self, symbol: &str) -> Option<Signal> {
        let candles = self.candles(symbol);
        let last = *candles.last()?;
        let regime = detect_regime(candles, self.config.adx_period);
        debug!(symbol, regime = %regime.regime, adx = regime.adx, "Evaluating");

        let selected = self.select(symbol, candles, &regime)?;
        let direction = selected.direction?;

        if let Err(rejection) = self.check_filters(&regime, direction, selected.confidence) {
            match rejection {
                Rejection::CounterTrend => self.stats.filtered_trend += 1,
                Rejection::LowConfidence => self.stats.filtered_confidence += 1,
            }
            debug!(
                symbol,
                ?rejection,
                direction = %direction,
                confidence = selected.confidence,
                "Signal filtered"
            );
            return None;
        }

        Some(self.emit(symbol, &last, &regime, direction, selected))
    }

    /// Config-driven selection first, then built-in regime routing.
    fn select(&self, symbol: &str, candles: &[Candle], regime: &RegimeInfo) -> Option<StrategyResult> {
        if let Some(result) = self.select_from_config(symbol, candles, regime) {
            return Some(result);
        }
        self.select_builtin(candles, regime)
    }

    /// Configured strategies in priority order. Each sees the regime computed
    /// with this generator's ADX period.
    fn select_from_config(&self, symbol: &str, candles: &[Candle], regime: &RegimeInfo) -> Option<StrategyResult> {
        let prefs = self.strategy_config.as_ref()?.for_symbol(symbol)?;
        for id in &prefs.strategies {
            let Some(strategy) = self.registry.get(id) else {
                continue;
            };
            let params = strategy.resolve_params(prefs.params_for(id));
            match invoke_with_regime(strategy.as_ref(), candles, regime, &params) {
                Some(result) if result.is_directional() => return Some(result),
                _ => continue,
            }
        }
        None
    }

    fn select_builtin(&self, candles: &[Candle], regime: &RegimeInfo) -> Option<StrategyResult> {
        if regime.regime.is_trending() {
            return self
                .router
                .trend
                .iter()
                .map(|e| e.run(candles, regime, None))
                .find(StrategyResult::is_directional);
        }

        let primary = self.router.primary.as_ref().map(|e| e.run(candles, regime, None));
        let secondary = self.router.secondary.as_ref().map(|e| e.run(candles, regime, None));
        match merge(self.config.merge_mode, primary.as_ref(), secondary.as_ref()) {
            MergeDecision::Emit(result) => Some(result),
            MergeDecision::Reject => {
                debug!(merge_mode = %self.config.merge_mode, "Mean-reversion evaluators disagree");
                None
            }
            MergeDecision::NoOpinion => self
                .router
                .fallback
                .iter()
                .map(|e| e.run(candles, regime, None))
                .find(StrategyResult::is_directional),
        }
    }

    fn check_filters(&self, regime: &RegimeInfo, direction: Direction, confidence: f64) -> Result<(), Rejection> {
        if self.config.trend_filter && !passes_trend_filter(regime, direction) {
            return Err(Rejection::CounterTrend);
        }
        if confidence < self.config.min_confidence {
            return Err(Rejection::LowConfidence);
        }
        Ok(())
    }

    fn emit(
        &mut self,
        symbol: &str,
        last: &Candle,
        regime: &RegimeInfo,
        direction: Direction,
        result: StrategyResult,
    ) -> Signal {
        let mut indicators = IndicatorSnapshot::new();
        indicators.insert("adx".into(), regime.adx);
        indicators.insert("plus_di".into(), regime.plus_di);
        indicators.insert("minus_di".into(), regime.minus_di);
        indicators.extend(result.indicators);

        let strategy_id = result.strategy_id.unwrap_or_else(|| "unknown".to_string());
        let signal = Signal {
            id: Signal::new_id(),
            created_at: Utc::now(),
            symbol: symbol.to_string(),
            direction,
            strategy_id: strategy_id.clone(),
            regime: regime.regime,
            confidence: result.confidence,
            expiry_secs: result.expiry_secs.unwrap_or(self.config.default_expiry_secs),
            entry_price: last.close,
            candle_timestamp: last.timestamp,
            indicators,
            status: SignalStatus::Pending,
        };

        self.signals.push_back(signal.clone());
        while self.signals.len() > self.config.max_signals {
            self.signals.pop_front();
        }
        self.stats.total_generated += 1;
        self.stats.by_strategy.entry(strategy_id).or_default().generated += 1;

        info!(
            id = %signal.id,
            symbol,
            direction = %signal.direction,
            strategy = %signal.strategy_id,
            confidence = signal.confidence,
            regime = %signal.regime,
            "Signal emitted"
        );

        for (_, listener) in &self.listeners {
            listener(&signal);
        }
        signal
    }

    // ─── Listeners ────────────────────────────────────────────────────────────

    /// Register a synchronous listener called for every emitted signal.
    pub fn on_signal<F: Fn(&Signal) + Send + Sync + 'static>(&mut self, f: F) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(f)));
        id
    }

    /// Unsubscribe. Returns false if the listener was already removed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    // ─── Signal log & outcomes ────────────────────────────────────────────────

    /// Up to `limit` most recent signals, newest first.
    pub fn get_signals(&self, limit: usize) -> Vec<Signal> {
        self.signals.iter().rev().take(limit).cloned().collect()
    }

    pub fn get_signal(&self, id: &str) -> Option<&Signal> {
        self.signals.iter().find(|s| s.id == id)
    }

    pub fn stats(&self) -> &GeneratorStats {
        &self.stats
    }

    /// Resolve a pending signal. Only the first outcome is applied.
    pub fn update_signal_result(&mut self, id: &str, outcome: Outcome) -> UpdateOutcome {
        let Some(signal) = self.signals.iter_mut().find(|s| s.id == id) else {
            warn!(id, "Outcome for unknown signal ignored");
            return UpdateOutcome::UnknownId;
        };
        if !signal.is_pending() {
            warn!(id, status = %signal.status, "Signal already resolved; outcome ignored");
            return UpdateOutcome::AlreadyResolved;
        }

        signal.status = outcome.into();
        let stats = self
            .stats
            .by_strategy
            .entry(signal.strategy_id.clone())
            .or_default();
        match outcome {
            Outcome::Win => stats.wins += 1,
            Outcome::Loss => stats.losses += 1,
            Outcome::Tie => stats.ties += 1,
        }
        info!(id, strategy = %signal.strategy_id, status = %signal.status, "Signal resolved");
        UpdateOutcome::Updated
    }
}

/// Strong trend: only the trend direction passes. Weak trend with ADX at or
/// above the block threshold: counter-trend is rejected. Otherwise both pass.
pub fn passes_trend_filter(regime: &RegimeInfo, direction: Direction) -> bool {
    let Some(trend) = Direction::from_sign(regime.direction) else {
        return true;
    };
    if regime.regime.is_strong() {
        return direction == trend;
    }
    if regime.regime.is_weak() && regime.adx >= COUNTER_TREND_BLOCK_ADX {
        return direction != trend.opposite();
    }
    true
}
