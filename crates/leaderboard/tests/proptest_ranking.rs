use common::BacktestConfig;
use leaderboard::{rank_entries, BacktestMetrics, Grade, LeaderboardEntry};
use proptest::prelude::*;
use strategy::Params;

fn entry(id: String, score: f64) -> LeaderboardEntry {
    LeaderboardEntry {
        strategy_name: id.clone(),
        strategy_id: id,
        params: Params::new(),
        metrics: BacktestMetrics::compute(&[], &BacktestConfig::default(), 0, 0),
        score,
        grade: Grade::D,
        rank: None,
    }
}

/// Distinct ids with scores drawn from a tiny set so ties are common.
fn entries_strategy() -> impl Strategy<Value = Vec<LeaderboardEntry>> {
    prop::collection::btree_map("[a-z]{1,4}", prop::sample::select(vec![10.0, 25.5, 50.0, 99.0]), 0..40)
        .prop_map(|m| m.into_iter().map(|(id, score)| entry(id, score)).collect())
}

fn order(entries: &[LeaderboardEntry]) -> Vec<String> {
    entries.iter().map(|e| e.strategy_id.clone()).collect()
}

proptest! {
    /// Reversed or rotated input produces the identical ranking.
    #[test]
    fn ranking_ignores_input_order(entries in entries_strategy(), rotate in 0usize..40) {
        let mut forward = entries.clone();
        rank_entries(&mut forward);

        let mut reversed = entries.clone();
        reversed.reverse();
        rank_entries(&mut reversed);
        prop_assert_eq!(&forward, &reversed);

        let mut rotated = entries;
        if !rotated.is_empty() {
            let k = rotate % rotated.len();
            rotated.rotate_left(k);
        }
        rank_entries(&mut rotated);
        prop_assert_eq!(&forward, &rotated);
    }

    /// Score descending, ties by id ascending, ranks 1..=n.
    #[test]
    fn ranking_is_a_total_order(entries in entries_strategy()) {
        let mut ranked = entries;
        rank_entries(&mut ranked);
        for (i, w) in ranked.windows(2).enumerate() {
            prop_assert!(
                w[0].score > w[1].score
                    || (w[0].score == w[1].score && w[0].strategy_id < w[1].strategy_id)
            );
            prop_assert_eq!(w[0].rank, Some(i as u32 + 1));
        }
    }
}

#[test]
fn tied_scores_resolve_identically_across_repeated_runs() {
    let ids = ["momentum", "band_reversion", "rsi_reversal", "alpha", "stoch_reversal"];
    let expected = vec!["alpha", "band_reversion", "momentum", "rsi_reversal", "stoch_reversal"];
    for run in 0..12 {
        let mut entries: Vec<LeaderboardEntry> = ids
            .iter()
            .map(|id| entry(id.to_string(), 42.0))
            .collect();
        entries.rotate_left(run % ids.len());
        if run % 2 == 1 {
            entries.reverse();
        }
        rank_entries(&mut entries);
        assert_eq!(order(&entries), expected, "run {run}");
    }
}
