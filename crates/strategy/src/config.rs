use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Error, Result};

use crate::Params;

/// Per-symbol strategy preferences, produced from leaderboard results and
/// loaded into the signal generator to override its built-in routing.
///
/// Example `config/strategy-config.json`:
/// ```json
/// {
///   "generated_at": "2024-05-01T12:00:00Z",
///   "data_source": "history",
///   "symbols": {
///     "EURUSD": {
///       "strategies": ["rsi_reversal", "band_reversion"],
///       "params": { "rsi_reversal": { "oversold": 25.0, "period": 10.0 } }
///     }
///   }
/// }
/// ```
///
/// Every map is a `BTreeMap` so serialization is byte-stable: symbols and
/// parameter keys come out sorted, strategy lists keep their rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfigDocument {
    pub generated_at: DateTime<Utc>,
    pub data_source: String,
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolStrategies>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolStrategies {
    /// Strategy ids in priority order.
    pub strategies: Vec<String>,
    /// Strategy id → parameter overrides.
    #[serde(default)]
    pub params: BTreeMap<String, Params>,
}

impl SymbolStrategies {
    pub fn params_for(&self, strategy_id: &str) -> Option<&Params> {
        self.params.get(strategy_id)
    }
}

impl StrategyConfigDocument {
    pub fn new(data_source: impl Into<String>) -> Self {
        Self {
            generated_at: Utc::now(),
            data_source: data_source.into(),
            symbols: BTreeMap::new(),
        }
    }

    pub fn for_symbol(&self, symbol: &str) -> Option<&SymbolStrategies> {
        self.symbols.get(symbol)
    }

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
                "failed to read strategy config at '{}': {e}",
                path.display()
            ))
        })?;
        let doc = Self::from_json(&content)?;
        info!(path = %path.display(), symbols = doc.symbols.len(), "Loaded strategy config");
        Ok(doc)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut json = self.to_json()?;
        json.push('\n');
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}
