use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use super::KeyValueStore;
use crate::strategies::StrategyRegistry;
use crate::types::{ResultRecord, SweepSettings, TimeFrame};

pub const RESULTS_KEY: &str = "optimizer.results";
pub const SETTINGS_KEY: &str = "optimizer.settings";

/// Session state that survives restarts: the last result set and the
/// user's sweep settings.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Stored results, or an empty collection when nothing usable is stored.
    pub fn load_results(&self) -> Vec<ResultRecord> {
        let raw = match self.store.get(RESULTS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read stored results: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(results) => results,
            Err(e) => {
                warn!("Discarding malformed stored results: {}", e);
                Vec::new()
            }
        }
    }

    pub fn save_results(&self, results: &[ResultRecord]) -> Result<()> {
        let json = serde_json::to_string(results)?;
        self.store.set(RESULTS_KEY, &json)?;
        debug!("Persisted {} results", results.len());
        Ok(())
    }

    pub fn clear_results(&self) -> Result<()> {
        self.store.remove(RESULTS_KEY)
    }

    /// Stored settings, validated against the registry. Falls back to
    /// defaults silently when the stored value cannot be used.
    pub fn load_settings(&self, registry: &StrategyRegistry) -> SweepSettings {
        let stored = match self.store.get(SETTINGS_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<SweepSettings>(&raw) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    warn!("Discarding malformed stored settings: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to read stored settings: {}", e);
                None
            }
        };

        match stored {
            Some(settings) => validate_settings(settings, registry),
            None => default_settings(registry),
        }
    }

    pub fn save_settings(&self, settings: &SweepSettings) -> Result<()> {
        let json = serde_json::to_string(settings)?;
        self.store.set(SETTINGS_KEY, &json)
    }
}

pub fn default_settings(registry: &StrategyRegistry) -> SweepSettings {
    let (strategy, param_ranges) = match registry.first() {
        Some(def) => (def.name.clone(), def.initial_ranges()),
        None => (String::new(), crate::strategies::default_ranges()),
    };

    SweepSettings {
        strategy,
        symbol: "BTC/USDT".to_string(),
        timeframe: TimeFrame::H1,
        lookback_days: 30,
        leverage: 10.0,
        trial_count: 30,
        param_ranges,
    }
}

/// Repair restored settings. Ranges whose key set no longer matches the
/// strategy's parameters are replaced by the strategy's initial ranges.
pub fn validate_settings(mut settings: SweepSettings, registry: &StrategyRegistry) -> SweepSettings {
    let Some(def) = registry.get(&settings.strategy) else {
        warn!("Stored strategy {} is no longer offered", settings.strategy);
        return default_settings(registry);
    };

    if !def.matches_params(&settings.param_ranges) {
        warn!("Stored ranges for {} are stale, using preset", def.name);
        settings.param_ranges = def.initial_ranges();
    }
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::strategies::{default_ranges, StrategyDef};
    use crate::types::{ParamRange, ParamRanges};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn session_store() -> (Arc<MemoryStore>, SessionStore) {
        let kv = Arc::new(MemoryStore::new());
        (kv.clone(), SessionStore::new(kv))
    }

    fn record(period: i64) -> ResultRecord {
        let mut params = BTreeMap::new();
        params.insert("period".to_string(), json!(period));
        ResultRecord::new(params, period as f64, 50.0, 3)
    }

    #[test]
    fn test_results_roundtrip_preserves_order() {
        let (_, store) = session_store();
        let results = vec![record(14), record(7).with_strategy("RSI"), record(21)];

        store.save_results(&results).unwrap();
        assert_eq!(store.load_results(), results);

        store.clear_results().unwrap();
        assert!(store.load_results().is_empty());
    }

    #[test]
    fn test_malformed_results_fall_back_to_empty() {
        let (kv, store) = session_store();
        kv.set(RESULTS_KEY, "{not json").unwrap();
        assert!(store.load_results().is_empty());
    }

    #[test]
    fn test_stale_ranges_replaced_by_first_preset() {
        let (kv, store) = session_store();
        let registry = StrategyRegistry::builtin();

        let mut stale = ParamRanges::new();
        stale.insert("period".to_string(), ParamRange::new(5.0, 10.0, 1.0));
        stale.insert("threshold".to_string(), ParamRange::new(1.0, 2.0, 0.5));
        let settings = SweepSettings {
            strategy: "RSI".to_string(),
            param_ranges: stale,
            ..default_settings(&registry)
        };
        kv.set(SETTINGS_KEY, &serde_json::to_string(&settings).unwrap()).unwrap();

        let restored = store.load_settings(&registry);
        let rsi = registry.get("RSI").unwrap();
        assert_eq!(restored.strategy, "RSI");
        assert_eq!(restored.param_ranges, rsi.first_preset().unwrap().ranges);
    }

    #[test]
    fn test_valid_settings_restored_unchanged() {
        let (_, store) = session_store();
        let registry = StrategyRegistry::builtin();

        let mut settings = default_settings(&registry);
        settings.symbol = "SOL/USDT".to_string();
        settings.timeframe = TimeFrame::M15;
        settings
            .param_ranges
            .insert("fast_period".to_string(), ParamRange::new(4.0, 8.0, 1.0));
        store.save_settings(&settings).unwrap();

        assert_eq!(store.load_settings(&registry), settings);
    }

    #[test]
    fn test_strategy_without_presets_uses_default_ranges() {
        let registry = StrategyRegistry::new(vec![StrategyDef::new(
            "Custom",
            &["lookback", "threshold"],
            vec![],
        )]);
        let settings = SweepSettings {
            strategy: "Custom".to_string(),
            param_ranges: ParamRanges::new(),
            ..default_settings(&StrategyRegistry::builtin())
        };

        let repaired = validate_settings(settings, &registry);
        assert_eq!(repaired.param_ranges, default_ranges());
    }

    #[test]
    fn test_unknown_or_malformed_settings_use_defaults() {
        let (kv, store) = session_store();
        let registry = StrategyRegistry::builtin();

        kv.set(SETTINGS_KEY, r#"{"strategy":"Gone"}"#).unwrap();
        assert_eq!(store.load_settings(&registry), default_settings(&registry));

        let mut gone = default_settings(&registry);
        gone.strategy = "Gone".to_string();
        kv.set(SETTINGS_KEY, &serde_json::to_string(&gone).unwrap()).unwrap();
        assert_eq!(store.load_settings(&registry), default_settings(&registry));
    }
}
