use std::collections::VecDeque;

use super::error::SessionError;
use crate::strategies::StrategyRegistry;
use crate::types::{ResultRecord, SweepRequest, SweepSettings};

/// Pending sweeps of an ultimate optimization, dispatched one at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepQueue {
    pending: VecDeque<SweepRequest>,
}

impl SweepQueue {
    /// One request per strategy that has presets, using its widest preset.
    /// Market, lookback and leverage come from `base`.
    pub fn build(registry: &StrategyRegistry, base: &SweepSettings) -> Result<Self, SessionError> {
        let mut pending = VecDeque::new();
        for def in registry.iter() {
            if let Some(preset) = def.widest_preset() {
                pending.push_back(SweepRequest::for_preset(def, preset, base)?);
            }
        }

        if pending.is_empty() {
            return Err(SessionError::EmptyChain);
        }
        Ok(Self { pending })
    }

    pub fn pop_next(&mut self) -> Option<SweepRequest> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn strategies(&self) -> Vec<String> {
        self.pending.iter().map(|r| r.strategy.clone()).collect()
    }
}

/// Attach the producing strategy to every record of a chained batch.
pub fn tag_results(records: Vec<ResultRecord>, strategy: &str) -> Vec<ResultRecord> {
    records
        .into_iter()
        .map(|r| r.with_strategy(strategy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{Preset, StrategyDef};
    use crate::types::{ParamRange, ParamRanges, TimeFrame};
    use std::collections::BTreeMap;

    fn base() -> SweepSettings {
        SweepSettings {
            strategy: "SMA Crossover".to_string(),
            symbol: "ETH/USDT".to_string(),
            timeframe: TimeFrame::H4,
            lookback_days: 90,
            leverage: 3.0,
            trial_count: 10,
            param_ranges: ParamRanges::new(),
        }
    }

    #[test]
    fn test_queue_uses_widest_preset_and_skips_empty() {
        let registry = StrategyRegistry::new(vec![
            StrategyDef::new(
                "A",
                &["x"],
                vec![
                    Preset::new("narrow", 5, &[("x", ParamRange::new(1.0, 2.0, 1.0))]),
                    Preset::new("wide", 50, &[("x", ParamRange::new(1.0, 20.0, 1.0))]),
                ],
            ),
            StrategyDef::new("NoPresets", &["y"], vec![]),
            StrategyDef::new(
                "B",
                &["y"],
                vec![Preset::new("only", 7, &[("y", ParamRange::new(3.0, 4.0, 1.0))])],
            ),
        ]);

        let mut queue = SweepQueue::build(&registry, &base()).unwrap();
        assert_eq!(queue.strategies(), vec!["A".to_string(), "B".to_string()]);

        let first = queue.pop_next().unwrap();
        assert_eq!(first.trial_count, 50);
        assert_eq!(first.param_ranges["x"], ParamRange::new(1.0, 20.0, 1.0));
        assert_eq!(first.symbol, "ETH/USDT");
        assert_eq!(first.timeframe, TimeFrame::H4);

        assert_eq!(queue.pop_next().unwrap().strategy, "B");
        assert!(queue.pop_next().is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_queue_without_presets_is_refused() {
        let registry = StrategyRegistry::new(vec![StrategyDef::new("Bare", &["x"], vec![])]);
        assert_eq!(SweepQueue::build(&registry, &base()), Err(SessionError::EmptyChain));
    }

    #[test]
    fn test_builtin_chain_covers_every_strategy() {
        let registry = StrategyRegistry::builtin();
        let queue = SweepQueue::build(&registry, &base()).unwrap();
        assert_eq!(queue.len(), registry.iter().count());
    }

    #[test]
    fn test_tag_results() {
        let records = vec![ResultRecord::new(BTreeMap::new(), 1.0, 2.0, 3)];
        let tagged = tag_results(records, "RSI");
        assert_eq!(tagged[0].strategy.as_deref(), Some("RSI"));
    }
}
