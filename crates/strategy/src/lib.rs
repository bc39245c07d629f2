pub mod config;
pub mod evaluators;
pub mod indicators;
pub mod merge;
pub mod regime;
pub mod registry;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use config::{StrategyConfigDocument, SymbolStrategies};
pub use evaluators::Evaluator;
pub use merge::{merge, MergeDecision};
pub use regime::{classify, detect_regime};
pub use registry::{invoke, invoke_with_regime, try_invoke, StrategyRegistry};

use common::{Candle, RegimeInfo, Result, StrategyResult};

/// Parameter name → value. Ordered so serialized overrides are stable.
pub type Params = BTreeMap<String, f64>;

/// One entry of a strategy's declared parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParamSpec {
    pub fn new(name: &str, default: f64, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.to_string(),
            default,
            min,
            max,
            step,
        }
    }
}

/// All strategy implementations must satisfy this trait, built-in or plugged in.
pub trait Strategy: Send + Sync {
    /// Stable identity used in configs, stats and leaderboards.
    fn id(&self) -> &str;

    /// Human-readable name shown in logs.
    fn name(&self) -> &str;

    /// Declared tunable parameters.
    fn param_schema(&self) -> &[ParamSpec];

    /// Inspect the candle window (oldest first) and return an opinion.
    ///
    /// Too little history is not an error: return a neutral result.
    fn evaluate(&self, candles: &[Candle], params: &Params) -> Result<StrategyResult>;

    /// Evaluate when the caller has already classified the window. Strategies
    /// that read the regime should use `regime` rather than recompute it.
    fn evaluate_with_regime(
        &self,
        candles: &[Candle],
        _regime: &RegimeInfo,
        params: &Params,
    ) -> Result<StrategyResult> {
        self.evaluate(candles, params)
    }

    fn default_params(&self) -> Params {
        self.param_schema()
            .iter()
            .map(|p| (p.name.clone(), p.default))
            .collect()
    }

    /// Declared defaults overlaid with `overrides`.
    fn resolve_params(&self, overrides: Option<&Params>) -> Params {
        let mut params = self.default_params();
        if let Some(overrides) = overrides {
            params.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        }
        params
    }
}

pub fn param_f64(params: &Params, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .copied()
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

pub fn param_usize(params: &Params, key: &str, default: usize) -> usize {
    params
        .get(key)
        .copied()
        .filter(|v| v.is_finite() && *v >= 1.0)
        .map(|v| v.round() as usize)
        .unwrap_or(default)
}
