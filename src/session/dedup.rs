use std::collections::HashSet;

use crate::types::ResultRecord;

/// Drop records whose parameter set was already seen, keeping first-seen order.
///
/// Local to one payload: records from earlier frames are not consulted.
pub fn dedup_results(records: Vec<ResultRecord>) -> Vec<ResultRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| seen.insert(r.param_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record(fast: i64, slow: i64, ret: f64) -> ResultRecord {
        let mut params = BTreeMap::new();
        params.insert("fast_period".to_string(), json!(fast));
        params.insert("slow_period".to_string(), json!(slow));
        ResultRecord::new(params, ret, 50.0, 10)
    }

    #[test]
    fn test_dedup_keeps_first_seen() {
        let out = dedup_results(vec![
            record(10, 50, 1.0),
            record(12, 50, 2.0),
            record(10, 50, 9.0),
            record(14, 60, 3.0),
            record(12, 50, 7.0),
        ]);

        let returns: Vec<f64> = out.iter().map(|r| r.return_pct).collect();
        assert_eq!(returns, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_dedup_distinct_keys_preserved_under_permutation() {
        let base = vec![
            record(10, 50, 1.0),
            record(12, 50, 2.0),
            record(10, 50, 3.0),
            record(14, 60, 4.0),
        ];
        let mut permuted = base.clone();
        permuted.reverse();

        let keys = |v: Vec<ResultRecord>| -> Vec<String> {
            dedup_results(v).iter().map(|r| r.param_key()).collect()
        };

        let a = keys(base);
        let mut b = keys(permuted);
        assert_eq!(a.len(), 3);
        assert_eq!(b.len(), 3);
        // First-seen order follows the input order.
        assert_eq!(b[0], record(14, 60, 0.0).param_key());
        b.sort();
        let mut a_sorted = a.clone();
        a_sorted.sort();
        assert_eq!(a_sorted, b);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let once = dedup_results(vec![record(1, 2, 0.0), record(1, 2, 1.0), record(3, 4, 0.0)]);
        let twice = dedup_results(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dedup_ignores_strategy_tag() {
        let out = dedup_results(vec![
            record(10, 50, 1.0).with_strategy("SMA Crossover"),
            record(10, 50, 1.0).with_strategy("EMA Crossover"),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].strategy.as_deref(), Some("SMA Crossover"));
    }

    #[test]
    fn test_dedup_empty() {
        assert!(dedup_results(Vec::new()).is_empty());
    }
}
