use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One evaluated parameter combination returned by the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "params")]
    pub parameters: BTreeMap<String, Value>,
    #[serde(rename = "return", deserialize_with = "metric_or_zero")]
    pub return_pct: f64,
    #[serde(rename = "win_rate", deserialize_with = "metric_or_zero")]
    pub win_rate_pct: f64,
    /// Accepts `12` as well as `12.0`.
    #[serde(rename = "trades", deserialize_with = "whole_count")]
    pub trade_count: u64,
    /// Strategy that produced the record. Set client-side for chained runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Any further metrics the backend reports (drawdown, sharpe, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ResultRecord {
    #[cfg(test)]
    pub fn new(
        parameters: BTreeMap<String, Value>,
        return_pct: f64,
        win_rate_pct: f64,
        trade_count: u64,
    ) -> Self {
        Self {
            parameters,
            return_pct,
            win_rate_pct,
            trade_count,
            strategy: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = Some(strategy.into());
        self
    }

    /// Canonical identity of the parameter combination: keys sorted, whole
    /// floats written as integers, then serialized. Metrics and the strategy
    /// tag do not take part.
    pub fn param_key(&self) -> String {
        let canonical: BTreeMap<&String, Value> = self
            .parameters
            .iter()
            .map(|(k, v)| (k, canonical_value(v)))
            .collect();
        serde_json::to_string(&canonical).unwrap_or_default()
    }

    pub fn params_label(&self) -> String {
        self.parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `10.0` and `10` name the same parameter value.
fn canonical_value(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canonical_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical_value(v)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// Null metrics read as zero.
fn metric_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0))
}

fn whole_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(0),
        Some(n) if n.is_finite() && n >= 0.0 => Ok(n.round() as u64),
        Some(n) => Err(de::Error::custom(format!("invalid trade count {}", n))),
    }
}

/// Trial counters for the sweep currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(current: u64, total: u64) -> Self {
        Self { current, total }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64 * 100.0
        }
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.current, self.total)
    }
}

/// Print a ranked table of results, best return first.
pub fn print_results(results: &[ResultRecord], limit: usize) {
    let mut ranked: Vec<&ResultRecord> = results.iter().collect();
    ranked.sort_by(|a, b| b.return_pct.total_cmp(&a.return_pct));

    println!("\n{}", "=".repeat(72));
    println!("                     OPTIMIZATION RESULTS ({})", results.len());
    println!("{}", "=".repeat(72));
    if ranked.is_empty() {
        println!("  No results stored");
    }
    for (i, r) in ranked.iter().take(limit).enumerate() {
        let strategy = r.strategy.as_deref().unwrap_or("-");
        println!(
            "{:>3}. {:<18} return {:>8.2}% | win {:>5.1}% | {:>4} trades | {}",
            i + 1,
            strategy,
            r.return_pct,
            r.win_rate_pct,
            r.trade_count,
            r.params_label()
        );
    }
    println!("{}", "=".repeat(72));
}
