pub mod presets;

use std::collections::BTreeSet;

use crate::types::{ParamRange, ParamRanges};

/// Fallback ranges when a strategy ships without presets.
pub fn default_ranges() -> ParamRanges {
    let mut ranges = ParamRanges::new();
    ranges.insert("fast_period".to_string(), ParamRange::new(5.0, 20.0, 1.0));
    ranges.insert("slow_period".to_string(), ParamRange::new(20.0, 50.0, 5.0));
    ranges
}

/// A named search space for one strategy, with the trial budget to spend on it.
#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub ranges: ParamRanges,
    pub trials: u32,
}

impl Preset {
    pub fn new(name: &str, trials: u32, ranges: &[(&str, ParamRange)]) -> Self {
        Self {
            name: name.to_string(),
            ranges: ranges
                .iter()
                .map(|(k, r)| (k.to_string(), *r))
                .collect(),
            trials,
        }
    }
}

/// A strategy the optimizer knows how to backtest.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyDef {
    pub name: String,
    pub params: Vec<String>,
    /// Ordered narrowest to widest.
    pub presets: Vec<Preset>,
}

impl StrategyDef {
    pub fn new(name: &str, params: &[&str], presets: Vec<Preset>) -> Self {
        Self {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            presets,
        }
    }

    pub fn recognizes(&self, param: &str) -> bool {
        self.params.iter().any(|p| p == param)
    }

    /// Keep only the ranges for parameters this strategy recognizes.
    pub fn filter_ranges(&self, ranges: &ParamRanges) -> ParamRanges {
        ranges
            .iter()
            .filter(|(k, _)| self.recognizes(k))
            .map(|(k, r)| (k.clone(), *r))
            .collect()
    }

    /// True when `ranges` covers exactly this strategy's parameter set.
    pub fn matches_params(&self, ranges: &ParamRanges) -> bool {
        let expected: BTreeSet<&str> = self.params.iter().map(String::as_str).collect();
        let actual: BTreeSet<&str> = ranges.keys().map(String::as_str).collect();
        expected == actual
    }

    pub fn first_preset(&self) -> Option<&Preset> {
        self.presets.first()
    }

    pub fn widest_preset(&self) -> Option<&Preset> {
        self.presets.last()
    }

    /// Ranges used when nothing valid was stored: first preset, else the
    /// hardcoded default.
    pub fn initial_ranges(&self) -> ParamRanges {
        self.first_preset()
            .map(|p| p.ranges.clone())
            .unwrap_or_else(default_ranges)
    }
}

/// Read-only registry of known strategies, in display order.
#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    strategies: Vec<StrategyDef>,
}

impl StrategyRegistry {
    pub fn new(strategies: Vec<StrategyDef>) -> Self {
        Self { strategies }
    }

    pub fn builtin() -> Self {
        Self::new(presets::builtin_strategies())
    }

    pub fn get(&self, name: &str) -> Option<&StrategyDef> {
        self.strategies.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StrategyDef> {
        self.strategies.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn first(&self) -> Option<&StrategyDef> {
        self.strategies.first()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_ranges() {
        let registry = StrategyRegistry::builtin();
        let rsi = registry.get("RSI").unwrap();

        let mut ranges = rsi.initial_ranges();
        ranges.insert("bogus_key".to_string(), ParamRange::new(0.0, 1.0, 1.0));

        let filtered = rsi.filter_ranges(&ranges);
        assert!(!filtered.contains_key("bogus_key"));
        assert!(rsi.matches_params(&filtered));
        assert!(!rsi.matches_params(&ranges));
    }

    #[test]
    fn test_no_presets_falls_back_to_default() {
        let custom = StrategyDef::new("Custom", &["fast_period", "slow_period"], vec![]);
        assert!(custom.first_preset().is_none());
        assert_eq!(custom.initial_ranges(), default_ranges());
    }

    #[test]
    fn test_builtin_presets_match_params() {
        let registry = StrategyRegistry::builtin();
        assert!(registry.first().is_some());
        for def in registry.iter() {
            for preset in &def.presets {
                assert!(
                    def.matches_params(&preset.ranges),
                    "{} preset {} does not cover its parameters",
                    def.name,
                    preset.name
                );
                assert!(preset.trials > 0);
            }
        }
    }
}
