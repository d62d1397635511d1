use super::{Preset, StrategyDef};
use crate::types::ParamRange;

const fn r(start: f64, end: f64, step: f64) -> ParamRange {
    ParamRange::new(start, end, step)
}

/// Strategies offered by the optimizer, each with presets ordered from the
/// tightest search to the widest.
pub fn builtin_strategies() -> Vec<StrategyDef> {
    vec![
        StrategyDef::new(
            "SMA Crossover",
            &["fast_period", "slow_period"],
            vec![
                Preset::new("Quick", 30, &[
                    ("fast_period", r(10.0, 20.0, 2.0)),
                    ("slow_period", r(50.0, 100.0, 10.0)),
                ]),
                Preset::new("Balanced", 60, &[
                    ("fast_period", r(5.0, 30.0, 1.0)),
                    ("slow_period", r(30.0, 150.0, 5.0)),
                ]),
                Preset::new("Wide", 100, &[
                    ("fast_period", r(3.0, 50.0, 1.0)),
                    ("slow_period", r(20.0, 200.0, 5.0)),
                ]),
            ],
        ),
        StrategyDef::new(
            "EMA Crossover",
            &["fast_period", "slow_period"],
            vec![
                Preset::new("Quick", 30, &[
                    ("fast_period", r(8.0, 16.0, 2.0)),
                    ("slow_period", r(21.0, 55.0, 4.0)),
                ]),
                Preset::new("Wide", 100, &[
                    ("fast_period", r(3.0, 40.0, 1.0)),
                    ("slow_period", r(15.0, 120.0, 3.0)),
                ]),
            ],
        ),
        StrategyDef::new(
            "RSI",
            &["period", "oversold", "overbought"],
            vec![
                Preset::new("Classic", 30, &[
                    ("period", r(10.0, 18.0, 2.0)),
                    ("oversold", r(25.0, 35.0, 5.0)),
                    ("overbought", r(65.0, 75.0, 5.0)),
                ]),
                Preset::new("Wide", 100, &[
                    ("period", r(5.0, 30.0, 1.0)),
                    ("oversold", r(10.0, 40.0, 2.0)),
                    ("overbought", r(60.0, 90.0, 2.0)),
                ]),
            ],
        ),
        StrategyDef::new(
            "MACD",
            &["fast_period", "slow_period", "signal_period"],
            vec![
                Preset::new("Classic", 30, &[
                    ("fast_period", r(8.0, 16.0, 2.0)),
                    ("slow_period", r(20.0, 32.0, 2.0)),
                    ("signal_period", r(7.0, 11.0, 1.0)),
                ]),
                Preset::new("Wide", 100, &[
                    ("fast_period", r(5.0, 20.0, 1.0)),
                    ("slow_period", r(20.0, 50.0, 2.0)),
                    ("signal_period", r(5.0, 15.0, 1.0)),
                ]),
            ],
        ),
        StrategyDef::new(
            "Bollinger Bands",
            &["period", "std_dev"],
            vec![
                Preset::new("Classic", 30, &[
                    ("period", r(15.0, 25.0, 1.0)),
                    ("std_dev", r(1.5, 2.5, 0.25)),
                ]),
                Preset::new("Wide", 100, &[
                    ("period", r(10.0, 50.0, 2.0)),
                    ("std_dev", r(1.0, 3.5, 0.25)),
                ]),
            ],
        ),
    ]
}
