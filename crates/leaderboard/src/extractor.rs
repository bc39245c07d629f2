//! Leaderboard results → per-symbol strategy preference document.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use common::ExtractorConfig;
use strategy::{StrategyConfigDocument, SymbolStrategies};

use crate::scorer::{compare_entries, LeaderboardEntry, LeaderboardResult};

/// Most preferred run first: newest execution, then longer duration, then
/// more strategies, then data source, then the runs' ranked entries.
fn compare_runs(a: &LeaderboardResult, b: &LeaderboardResult) -> Ordering {
    b.executed_at
        .cmp(&a.executed_at)
        .then_with(|| b.duration_ms.cmp(&a.duration_ms))
        .then_with(|| b.total_strategies.cmp(&a.total_strategies))
        .then_with(|| a.data_source.cmp(&b.data_source))
        .then_with(|| compare_ranked_entries(a, b))
}

/// Content tie-break. Runs that still compare equal produce the same
/// extracted preferences, so either may be chosen.
fn compare_ranked_entries(a: &LeaderboardResult, b: &LeaderboardResult) -> Ordering {
    fn ranked(r: &LeaderboardResult) -> Vec<&LeaderboardEntry> {
        let mut entries: Vec<&LeaderboardEntry> = r.entries.iter().collect();
        entries.sort_by(|x, y| compare_entries(x, y));
        entries
    }
    let (ra, rb) = (ranked(a), ranked(b));
    ra.iter()
        .zip(rb.iter())
        .map(|(x, y)| compare_entries(x, y).then_with(|| y.metrics.trades.cmp(&x.metrics.trades)))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| ra.len().cmp(&rb.len()))
}

/// Entries that meet the trade floor, in leaderboard order, capped.
fn usable_entries<'a>(result: &'a LeaderboardResult, config: &ExtractorConfig) -> Vec<&'a LeaderboardEntry> {
    let mut entries: Vec<&LeaderboardEntry> = result
        .entries
        .iter()
        .filter(|e| e.metrics.trades >= config.min_trades)
        .collect();
    entries.sort_by(|a, b| compare_entries(a, b));
    entries.truncate(config.max_strategies_per_symbol);
    entries
}

fn symbol_strategies(entries: &[&LeaderboardEntry]) -> SymbolStrategies {
    let mut prefs = SymbolStrategies::default();
    for entry in entries {
        // A strategy appearing twice keeps its best-ranked parameters.
        if prefs.params.contains_key(&entry.strategy_id) {
            continue;
        }
        prefs.strategies.push(entry.strategy_id.clone());
        prefs.params.insert(entry.strategy_id.clone(), entry.params.clone());
    }
    prefs
}

/// Build the strategy config document, stamped with the current time.
pub fn extract_config(results: &[LeaderboardResult], config: &ExtractorConfig) -> StrategyConfigDocument {
    extract_config_at(results, config, Utc::now())
}

/// Build the strategy config document with an explicit generation time.
///
/// For each symbol the preferred run is used; if none of its entries survive
/// the trade floor the next run is tried. Symbols with no usable run are
/// left out. Output depends only on the content of `results`, not on their
/// order.
pub fn extract_config_at(
    results: &[LeaderboardResult],
    config: &ExtractorConfig,
    generated_at: DateTime<Utc>,
) -> StrategyConfigDocument {
    let mut by_symbol: BTreeMap<&str, Vec<&LeaderboardResult>> = BTreeMap::new();
    for result in results {
        by_symbol.entry(result.symbol.as_str()).or_default().push(result);
    }

    let mut document = StrategyConfigDocument {
        generated_at,
        data_source: config.data_source.clone(),
        symbols: BTreeMap::new(),
    };

    for (symbol, mut runs) in by_symbol {
        runs.sort_by(|a, b| compare_runs(a, b));

        let chosen = runs.iter().enumerate().find_map(|(i, run)| {
            let entries = usable_entries(run, config);
            (!entries.is_empty()).then_some((i, run, entries))
        });

        let Some((fallbacks, run, entries)) = chosen else {
            warn!(symbol, runs = runs.len(), "No usable leaderboard run; symbol omitted");
            continue;
        };

        info!(
            symbol,
            executed_at = %run.executed_at,
            skipped_runs = fallbacks,
            strategies = entries.len(),
            "Selected leaderboard run"
        );
        document
            .symbols
            .insert(symbol.to_string(), symbol_strategies(&entries));
    }

    document
}
