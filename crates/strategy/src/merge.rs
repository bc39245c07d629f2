//! Merge of the two primary mean-reversion evaluators.
//!
//! The rules are a decision table keyed by merge mode, which evaluators fired
//! and whether their directions agree:
//!
//! | mode      | fired          | agree | decision                           |
//! |-----------|----------------|-------|------------------------------------|
//! | off       | primary        | -     | emit primary                       |
//! | off       | secondary only | -     | no opinion                         |
//! | consensus | both           | yes   | emit higher confidence, "consensus" |
//! | consensus | both           | no    | reject                             |
//! | consensus | one            | -     | no opinion                         |
//! | best      | both           | any   | emit higher confidence (tie: primary) |
//! | best      | one            | -     | emit that one                      |
//! | any       | neither        | -     | no opinion                         |

use common::{MergeMode, StrategyResult};

/// Strategy id carried by consensus-merged results.
pub const CONSENSUS_ID: &str = "consensus";

#[derive(Debug, Clone, PartialEq)]
pub enum MergeDecision {
    /// Use this result as the selected opinion.
    Emit(StrategyResult),
    /// Both fired but the mode forbids emitting; selection stops here.
    Reject,
    /// Nothing to emit; selection may fall through to other evaluators.
    NoOpinion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fired {
    Neither,
    PrimaryOnly,
    SecondaryOnly,
    Both { agree: bool },
}

fn fired(primary: Option<&StrategyResult>, secondary: Option<&StrategyResult>) -> Fired {
    let p = primary.filter(|r| r.is_directional());
    let s = secondary.filter(|r| r.is_directional());
    match (p, s) {
        (None, None) => Fired::Neither,
        (Some(_), None) => Fired::PrimaryOnly,
        (None, Some(_)) => Fired::SecondaryOnly,
        (Some(p), Some(s)) => Fired::Both {
            agree: p.direction == s.direction,
        },
    }
}

/// Combine the primary and secondary opinions under `mode`.
///
/// Non-directional results count as "did not fire".
pub fn merge(
    mode: MergeMode,
    primary: Option<&StrategyResult>,
    secondary: Option<&StrategyResult>,
) -> MergeDecision {
    let state = fired(primary, secondary);
    match (mode, state, primary, secondary) {
        (_, Fired::Neither, _, _) => MergeDecision::NoOpinion,

        (MergeMode::Off, Fired::PrimaryOnly | Fired::Both { .. }, Some(p), _) => {
            MergeDecision::Emit(p.clone())
        }
        (MergeMode::Off, _, _, _) => MergeDecision::NoOpinion,

        (MergeMode::Consensus, Fired::Both { agree: true }, Some(p), Some(s)) => {
            MergeDecision::Emit(consensus(p, s))
        }
        (MergeMode::Consensus, Fired::Both { agree: false }, _, _) => MergeDecision::Reject,
        (MergeMode::Consensus, _, _, _) => MergeDecision::NoOpinion,

        (MergeMode::Best, Fired::Both { .. }, Some(p), Some(s)) => {
            if s.confidence > p.confidence {
                MergeDecision::Emit(s.clone())
            } else {
                MergeDecision::Emit(p.clone())
            }
        }
        (MergeMode::Best, Fired::PrimaryOnly, Some(p), _) => MergeDecision::Emit(p.clone()),
        (MergeMode::Best, Fired::SecondaryOnly, _, Some(s)) => MergeDecision::Emit(s.clone()),
        (MergeMode::Best, _, _, _) => MergeDecision::NoOpinion,
    }
}

fn consensus(p: &StrategyResult, s: &StrategyResult) -> StrategyResult {
    let mut merged = if s.confidence > p.confidence {
        s.clone()
    } else {
        p.clone()
    };
    merged.confidence = p.confidence.max(s.confidence);
    merged.reason = format!("consensus: {} + {}", p.reason, s.reason);
    merged.strategy_id = Some(CONSENSUS_ID.to_string());
    merged.indicators = p.indicators.clone();
    merged
        .indicators
        .extend(s.indicators.iter().map(|(k, v)| (k.clone(), *v)));
    merged
}
