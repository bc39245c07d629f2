use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{info, warn};

use common::{Candle, Error, RegimeInfo, Result, StrategyResult};

use crate::evaluators::builtin_evaluators;
use crate::{Params, Strategy};

/// Closed set of strategies addressable by id.
///
/// Built once at construction; nothing is registered afterwards.
#[derive(Clone)]
pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn Strategy>>,
    index: HashMap<String, usize>,
}

impl StrategyRegistry {
    /// Build the registry, rejecting duplicate or empty ids.
    pub fn new(strategies: Vec<Arc<dyn Strategy>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(strategies.len());
        for (i, strategy) in strategies.iter().enumerate() {
            let id = strategy.id().to_string();
            if id.is_empty() {
                return Err(Error::Config(format!(
                    "strategy '{}' has an empty id",
                    strategy.name()
                )));
            }
            if index.insert(id.clone(), i).is_some() {
                return Err(Error::Config(format!("duplicate strategy id '{id}'")));
            }
            info!(id = %id, name = %strategy.name(), "Registered strategy");
        }
        Ok(Self { strategies, index })
    }

    /// Just the built-in evaluators.
    pub fn builtin() -> Self {
        let strategies = builtin_evaluators()
            .into_iter()
            .map(|e| Arc::new(e) as Arc<dyn Strategy>)
            .collect();
        // Built-in ids are unique by construction.
        Self::new(strategies).unwrap_or_else(|_| Self::empty())
    }

    /// Built-ins followed by `plugins`.
    pub fn with_plugins(plugins: Vec<Arc<dyn Strategy>>) -> Result<Self> {
        let mut strategies: Vec<Arc<dyn Strategy>> = builtin_evaluators()
            .into_iter()
            .map(|e| Arc::new(e) as Arc<dyn Strategy>)
            .collect();
        strategies.extend(plugins);
        Self::new(strategies)
    }

    pub fn empty() -> Self {
        Self {
            strategies: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Strategy>> {
        self.index.get(id).map(|&i| &self.strategies[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Strategies in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Strategy>> {
        self.strategies.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

/// Run one strategy and surface any failure as an error.
///
/// An `Err`, a panic, or a malformed result (confidence outside [0, 1]) all
/// come back as [`Error::Strategy`]. The result is tagged with the strategy id
/// when the strategy did not tag it itself.
pub fn try_invoke(strategy: &dyn Strategy, candles: &[Candle], params: &Params) -> Result<StrategyResult> {
    checked(strategy, || strategy.evaluate(candles, params))
}

fn checked<F>(strategy: &dyn Strategy, eval: F) -> Result<StrategyResult>
where
    F: FnOnce() -> Result<StrategyResult>,
{
    let outcome = catch_unwind(AssertUnwindSafe(eval));

    let mut result = match outcome {
        Ok(result) => result?,
        Err(_) => return Err(Error::strategy(strategy.id(), "panicked during evaluation")),
    };

    if !result.confidence.is_finite() || !(0.0..=1.0).contains(&result.confidence) {
        return Err(Error::strategy(
            strategy.id(),
            format!("malformed confidence {}", result.confidence),
        ));
    }

    if result.strategy_id.is_none() {
        result.strategy_id = Some(strategy.id().to_string());
    }
    Ok(result)
}

/// Run one strategy, isolating failures.
///
/// This is the invocation site for the signal generator: any failure
/// collapses to `None` so the caller can move on to the next candidate.
pub fn invoke(strategy: &dyn Strategy, candles: &[Candle], params: &Params) -> Option<StrategyResult> {
    isolate(strategy, try_invoke(strategy, candles, params))
}

/// [`invoke`] with a regime the caller already computed for this window.
pub fn invoke_with_regime(
    strategy: &dyn Strategy,
    candles: &[Candle],
    regime: &RegimeInfo,
    params: &Params,
) -> Option<StrategyResult> {
    let result = checked(strategy, || strategy.evaluate_with_regime(candles, regime, params));
    isolate(strategy, result)
}

fn isolate(strategy: &dyn Strategy, result: Result<StrategyResult>) -> Option<StrategyResult> {
    match result {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(strategy = %strategy.id(), error = %e, "Strategy evaluation isolated");
            None
        }
    }
}
