use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::TimeFrame;
use crate::session::SessionError;
use crate::strategies::{Preset, StrategyDef, StrategyRegistry};

/// Inclusive search interval for one strategy parameter.
///
/// Travels on the wire as a `[start, end, step]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct ParamRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl ParamRange {
    pub const fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// Number of grid points covered by this range.
    pub fn grid_points(&self) -> u64 {
        if self.step <= 0.0 || self.end < self.start {
            return 1;
        }
        ((self.end - self.start) / self.step).floor() as u64 + 1
    }
}

impl From<[f64; 3]> for ParamRange {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<ParamRange> for [f64; 3] {
    fn from(r: ParamRange) -> Self {
        [r.start, r.end, r.step]
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{} step {}", self.start, self.end, self.step)
    }
}

pub type ParamRanges = BTreeMap<String, ParamRange>;

/// The user's governing sweep configuration. Persisted across restarts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    pub strategy: String,
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub lookback_days: u32,
    pub leverage: f64,
    pub trial_count: u32,
    pub param_ranges: ParamRanges,
}

/// One parameter-sweep job. Built right before submission and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRequest {
    pub strategy: String,
    pub symbol: String,
    pub timeframe: TimeFrame,
    pub lookback_days: u32,
    pub param_ranges: ParamRanges,
    pub leverage: f64,
    pub trial_count: u32,
}

impl SweepRequest {
    /// Build a request from the user's settings. Ranges for parameters the
    /// strategy does not recognize are dropped.
    pub fn from_settings(
        registry: &StrategyRegistry,
        settings: &SweepSettings,
    ) -> Result<Self, SessionError> {
        let def = registry
            .get(&settings.strategy)
            .ok_or_else(|| SessionError::UnknownStrategy(settings.strategy.clone()))?;

        Self::build(
            def,
            settings,
            &settings.param_ranges,
            settings.trial_count,
        )
    }

    /// Build a request that sweeps one of the strategy's presets, taking
    /// market, window and leverage from `base`.
    pub fn for_preset(
        def: &StrategyDef,
        preset: &Preset,
        base: &SweepSettings,
    ) -> Result<Self, SessionError> {
        Self::build(def, base, &preset.ranges, preset.trials)
    }

    fn build(
        def: &StrategyDef,
        base: &SweepSettings,
        ranges: &ParamRanges,
        trial_count: u32,
    ) -> Result<Self, SessionError> {
        if !(base.leverage.is_finite() && base.leverage > 0.0) {
            return Err(SessionError::InvalidRequest(format!(
                "leverage must be positive, got {}",
                base.leverage
            )));
        }
        if trial_count == 0 {
            return Err(SessionError::InvalidRequest(
                "trial count must be > 0".to_string(),
            ));
        }
        if base.symbol.trim().is_empty() {
            return Err(SessionError::InvalidRequest("symbol is empty".to_string()));
        }

        Ok(Self {
            strategy: def.name.clone(),
            symbol: base.symbol.clone(),
            timeframe: base.timeframe,
            lookback_days: base.lookback_days,
            param_ranges: def.filter_ranges(ranges),
            leverage: base.leverage,
            trial_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rsi_settings() -> SweepSettings {
        let mut ranges = ParamRanges::new();
        ranges.insert("period".to_string(), ParamRange::new(7.0, 21.0, 1.0));
        ranges.insert("oversold".to_string(), ParamRange::new(20.0, 35.0, 5.0));
        ranges.insert("overbought".to_string(), ParamRange::new(65.0, 80.0, 5.0));
        ranges.insert("bogus_key".to_string(), ParamRange::new(1.0, 2.0, 1.0));

        SweepSettings {
            strategy: "RSI".to_string(),
            symbol: "BTC/USDT".to_string(),
            timeframe: TimeFrame::H1,
            lookback_days: 30,
            leverage: 5.0,
            trial_count: 50,
            param_ranges: ranges,
        }
    }

    #[test]
    fn test_unrecognized_params_dropped() {
        let registry = StrategyRegistry::builtin();
        let request = SweepRequest::from_settings(&registry, &rsi_settings()).unwrap();

        assert_eq!(request.param_ranges.len(), 3);
        assert!(!request.param_ranges.contains_key("bogus_key"));
        assert!(request.param_ranges.contains_key("period"));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let registry = StrategyRegistry::builtin();
        let mut settings = rsi_settings();
        settings.strategy = "Martingale".to_string();

        let err = SweepRequest::from_settings(&registry, &settings).unwrap_err();
        assert!(matches!(err, SessionError::UnknownStrategy(name) if name == "Martingale"));
    }

    #[test]
    fn test_non_positive_leverage_rejected() {
        let registry = StrategyRegistry::builtin();
        let mut settings = rsi_settings();
        settings.leverage = 0.0;

        assert!(matches!(
            SweepRequest::from_settings(&registry, &settings),
            Err(SessionError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_param_range_wire_shape() {
        let range = ParamRange::new(10.0, 20.0, 2.0);
        let value = serde_json::to_value(range).unwrap();
        assert_eq!(value, serde_json::json!([10.0, 20.0, 2.0]));

        let parsed: ParamRange = serde_json::from_str("[50, 100, 10]").unwrap();
        assert_eq!(parsed, ParamRange::new(50.0, 100.0, 10.0));
        assert_eq!(parsed.grid_points(), 6);
    }
}
