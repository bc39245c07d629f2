use std::sync::Arc;

use common::{BacktestConfig, Candle, Direction, ExtractorConfig, GeneratorConfig, Result, StrategyResult};
use engine::SignalGenerator;
use leaderboard::{extract_config, Candidate, LeaderboardResult, LeaderboardScorer};
use strategy::{ParamSpec, Params, Strategy, StrategyConfigDocument, StrategyRegistry};

const START_MS: i64 = 1_704_067_200_000;

/// Follows the direction of the last candle.
struct Momentum;

impl Strategy for Momentum {
    fn id(&self) -> &str {
        "momentum"
    }
    fn name(&self) -> &str {
        "Last-candle momentum"
    }
    fn param_schema(&self) -> &[ParamSpec] {
        &[]
    }
    fn evaluate(&self, candles: &[Candle], _params: &Params) -> Result<StrategyResult> {
        let [.., prev, last] = candles else {
            return Ok(StrategyResult::neutral("insufficient data"));
        };
        Ok(if last.close > prev.close {
            StrategyResult::signal(Direction::Call, 0.9, "up")
        } else if last.close < prev.close {
            StrategyResult::signal(Direction::Put, 0.9, "down")
        } else {
            StrategyResult::neutral("flat")
        })
    }
}

fn wave(n: usize) -> Vec<Candle> {
    let mut prev = 100.0;
    (0..n)
        .map(|i| {
            let close = 100.0 + 5.0 * (i as f64 * 0.3).sin() + 0.01 * i as f64;
            let candle = Candle::new(
                START_MS + i as i64 * 60_000,
                prev,
                prev.max(close) + 0.5,
                prev.min(close) - 0.5,
                close,
                10.0,
            );
            prev = close;
            candle
        })
        .collect()
}

fn candidates() -> Vec<Candidate> {
    let mut all: Vec<Candidate> = StrategyRegistry::builtin()
        .iter()
        .cloned()
        .map(Candidate::defaults)
        .collect();
    all.push(Candidate::defaults(Arc::new(Momentum)));
    all
}

/// Blank the two run-dependent fields, `executed_at` and `duration_ms`.
fn normalized_json(mut result: LeaderboardResult) -> String {
    result.executed_at = chrono::DateTime::from_timestamp_millis(START_MS).unwrap();
    result.duration_ms = 0;
    result.to_json().unwrap()
}

#[test]
fn leaderboard_is_byte_identical_for_reversed_candidates() {
    let scorer = LeaderboardScorer::new(BacktestConfig::default()).unwrap();
    let candles = wave(300);

    let forward = candidates();
    let mut reversed = candidates();
    reversed.reverse();

    let a = scorer.run("EURUSD", "synthetic", &candles, &forward);
    let b = scorer.run("EURUSD", "synthetic", &candles, &reversed);
    assert_eq!(a.total_strategies, 7);
    assert!(a.entry("momentum").is_some());
    assert_eq!(normalized_json(a), normalized_json(b));
}

#[test]
fn extracted_config_drives_the_generator() {
    let scorer = LeaderboardScorer::new(BacktestConfig::default()).unwrap();
    let candles = wave(300);
    let result = scorer.run(
        "EURUSD",
        "synthetic",
        &candles,
        &[Candidate::defaults(Arc::new(Momentum))],
    );
    assert_eq!(result.entries.len(), 1);

    let doc = extract_config(&[result], &ExtractorConfig::default());
    assert_eq!(doc.symbols["EURUSD"].strategies, vec!["momentum"]);

    // The document survives a trip through its file format.
    let doc = StrategyConfigDocument::from_json(&doc.to_json().unwrap()).unwrap();

    let registry = StrategyRegistry::with_plugins(vec![Arc::new(Momentum) as Arc<dyn Strategy>]).unwrap();
    let mut generator = SignalGenerator::new(GeneratorConfig::default(), registry);
    generator.load_config(doc);

    let signals = generator.replay("EURUSD", &candles);
    assert!(!signals.is_empty());
    assert!(signals.iter().all(|s| s.strategy_id == "momentum"));
    assert_eq!(
        generator.stats().by_strategy["momentum"].generated,
        signals.len() as u64
    );
}
