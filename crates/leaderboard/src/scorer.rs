use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use common::{BacktestConfig, Candle, Error, Result};
use strategy::{Params, Strategy, StrategyRegistry};

use crate::backtest::{select_range, simulate};
use crate::metrics::BacktestMetrics;
use crate::score::{composite_scores, grade, Grade};

/// One strategy with the parameters it is backtested under.
#[derive(Clone)]
pub struct Candidate {
    pub strategy: Arc<dyn Strategy>,
    pub params: Params,
}

impl Candidate {
    /// Declared defaults overlaid with `overrides`.
    pub fn new(strategy: Arc<dyn Strategy>, overrides: Option<&Params>) -> Self {
        let params = strategy.resolve_params(overrides);
        Self { strategy, params }
    }

    pub fn defaults(strategy: Arc<dyn Strategy>) -> Self {
        Self::new(strategy, None)
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("strategy", &self.strategy.id())
            .field("params", &self.params)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub strategy_id: String,
    pub strategy_name: String,
    pub params: Params,
    pub metrics: BacktestMetrics,
    /// Relative composite score, comparable only within one result.
    pub score: f64,
    /// Absolute grade, independent of the other entries.
    pub grade: Grade,
    /// 1-based position. Entries that arrive with a rank keep their relative
    /// order ahead of unranked ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedStrategy {
    pub strategy_id: String,
    pub error: String,
}

/// Output of one leaderboard run over one symbol.
///
/// Everything except `executed_at` and `duration_ms` is a function of the
/// inputs. Those two describe the run itself and should be ignored when
/// diffing results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardResult {
    pub symbol: String,
    pub data_source: String,
    /// Wall-clock start of the run.
    pub executed_at: DateTime<Utc>,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
    pub total_strategies: usize,
    /// Strategies that ran but fell below the trade-count or win-rate floor.
    pub excluded_count: usize,
    #[serde(default)]
    pub failed: Vec<FailedStrategy>,
    /// Ranked, best first.
    pub entries: Vec<LeaderboardEntry>,
}

impl LeaderboardResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read leaderboard result at '{}': {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn entry(&self, strategy_id: &str) -> Option<&LeaderboardEntry> {
        self.entries.iter().find(|e| e.strategy_id == strategy_id)
    }
}

// ─── Ranking ────────────────────────────────────────────────────────

/// Total order: preassigned rank ascending first, then composite score
/// descending, then strategy id ascending, then parameters.
pub fn compare_entries(a: &LeaderboardEntry, b: &LeaderboardEntry) -> Ordering {
    let primary = match (a.rank, b.rank) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.score.total_cmp(&a.score),
    };
    primary
        .then_with(|| a.strategy_id.cmp(&b.strategy_id))
        .then_with(|| compare_params(&a.params, &b.params))
}

fn compare_params(a: &Params, b: &Params) -> Ordering {
    for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
        let ord = ka.cmp(kb).then_with(|| va.total_cmp(vb));
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Sort into leaderboard order and assign ranks 1..=n.
pub fn rank_entries(entries: &mut [LeaderboardEntry]) {
    entries.sort_by(compare_entries);
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = Some(i as u32 + 1);
    }
}

// ─── Scorer ─────────────────────────────────────────────────────────

/// Runs every candidate as a full backtest and ranks the survivors.
pub struct LeaderboardScorer {
    config: BacktestConfig,
}

impl LeaderboardScorer {
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Backtest every registered strategy under its declared defaults.
    pub fn run_registry(
        &self,
        symbol: &str,
        data_source: &str,
        candles: &[Candle],
        registry: &StrategyRegistry,
    ) -> LeaderboardResult {
        let candidates: Vec<Candidate> = registry.iter().cloned().map(Candidate::defaults).collect();
        self.run(symbol, data_source, candles, &candidates)
    }

    /// Backtest `candidates` over `candles`.
    ///
    /// A candidate whose simulation fails is logged, listed in `failed` and
    /// left out; the rest are still scored.
    pub fn run(
        &self,
        symbol: &str,
        data_source: &str,
        candles: &[Candle],
        candidates: &[Candidate],
    ) -> LeaderboardResult {
        let started = Instant::now();
        let executed_at = Utc::now();

        let series = select_range(candles, &self.config);
        let first_ms = series.first().map_or(0, |c| c.timestamp);
        let last_ms = series.last().map_or(0, |c| c.timestamp);

        let mut survivors: Vec<(&Candidate, BacktestMetrics)> = Vec::new();
        let mut failed = Vec::new();
        let mut excluded_count = 0;

        for candidate in candidates {
            let id = candidate.strategy.id();
            let trades = match simulate(candidate.strategy.as_ref(), &candidate.params, &series, &self.config) {
                Ok(trades) => trades,
                Err(e) => {
                    warn!(symbol, strategy = %id, error = %e, "Strategy simulation failed; skipping");
                    failed.push(FailedStrategy {
                        strategy_id: id.to_string(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let metrics = BacktestMetrics::compute(&trades, &self.config, first_ms, last_ms);
            if metrics.trades < self.config.min_trades || metrics.win_rate < self.config.min_win_rate {
                excluded_count += 1;
                continue;
            }
            survivors.push((candidate, metrics));
        }

        let scores = composite_scores(
            &survivors.iter().map(|(_, m)| m).collect::<Vec<_>>(),
            &self.config.weights,
        );

        let mut entries: Vec<LeaderboardEntry> = survivors
            .into_iter()
            .zip(scores)
            .map(|((candidate, metrics), score)| LeaderboardEntry {
                strategy_id: candidate.strategy.id().to_string(),
                strategy_name: candidate.strategy.name().to_string(),
                params: candidate.params.clone(),
                grade: grade(&metrics, &self.config),
                metrics,
                score,
                rank: None,
            })
            .collect();
        rank_entries(&mut entries);
        failed.sort_by(|a, b| a.strategy_id.cmp(&b.strategy_id).then_with(|| a.error.cmp(&b.error)));

        let result = LeaderboardResult {
            symbol: symbol.to_string(),
            data_source: data_source.to_string(),
            executed_at,
            duration_ms: started.elapsed().as_millis() as u64,
            total_strategies: candidates.len(),
            excluded_count,
            failed,
            entries,
        };

        info!(
            symbol,
            candles = series.len(),
            strategies = result.total_strategies,
            ranked = result.entries.len(),
            excluded = result.excluded_count,
            failed = result.failed.len(),
            duration_ms = result.duration_ms,
            "Leaderboard run complete"
        );
        result
    }
}
