//! Per-security realized P/L: group, match each group, fold.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::LedgerError;
use crate::fifo::{match_security, MatchOutcome, UnmatchedSellPolicy};
use crate::types::Transaction;

/// Partition `records` by security. Within a group, input order is kept.
pub fn group_by_security(records: &[Transaction]) -> BTreeMap<String, Vec<Transaction>> {
    let mut groups: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();
    for t in records {
        groups.entry(t.security.clone()).or_default().push(t.clone());
    }
    groups
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProfitReport {
    pub by_security: BTreeMap<String, MatchOutcome>,
}

impl ProfitReport {
    /// Run the FIFO matcher once per security.
    pub fn compute(
        records: &[Transaction],
        policy: UnmatchedSellPolicy,
    ) -> Result<Self, LedgerError> {
        let by_security = group_by_security(records)
            .into_iter()
            .map(|(security, group)| {
                let outcome = match_security(&security, &group, policy)?;
                Ok((security, outcome))
            })
            .collect::<Result<BTreeMap<_, _>, LedgerError>>()?;
        Ok(Self { by_security })
    }

    /// security -> realized profit.
    pub fn realized(&self) -> BTreeMap<String, f64> {
        self.by_security
            .iter()
            .map(|(s, o)| (s.clone(), o.total_profit))
            .collect()
    }

    pub fn total_realized(&self) -> f64 {
        self.by_security.values().map(|o| o.total_profit).sum()
    }

    pub fn total_unmatched_sell(&self) -> f64 {
        self.by_security.values().map(|o| o.unmatched_sell).sum()
    }
}

fn by_profit_then_security(a: &(String, f64), b: &(String, f64)) -> Ordering {
    a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0))
}

/// Up to `n` securities with strictly positive profit, best first.
/// Equal profits are ordered by security.
pub fn top_gainers(realized: &BTreeMap<String, f64>, n: usize) -> Vec<(String, f64)> {
    let mut gainers: Vec<(String, f64)> = realized
        .iter()
        .filter(|(_, p)| **p > 0.0)
        .map(|(s, p)| (s.clone(), *p))
        .collect();
    gainers.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    gainers.truncate(n);
    gainers
}

/// Full signed mapping, ascending by profit, for a waterfall chart.
pub fn waterfall(realized: &BTreeMap<String, f64>) -> Vec<(String, f64)> {
    let mut rows: Vec<(String, f64)> = realized.iter().map(|(s, p)| (s.clone(), *p)).collect();
    rows.sort_by(by_profit_then_security);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    fn profits(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect()
    }

    #[test]
    fn all_buys_give_zero_for_every_security() {
        let records = vec![
            Transaction::buy(d(1), "AAPL", 100.0),
            Transaction::buy(d(2), "MSFT", 50.0),
            Transaction::buy(d(3), "AAPL", 70.0),
        ];
        let report = ProfitReport::compute(&records, UnmatchedSellPolicy::Drop).unwrap();
        let realized = report.realized();
        assert_eq!(realized.len(), 2);
        assert!(realized.values().all(|p| *p == 0.0));
        assert_eq!(report.total_realized(), 0.0);
    }

    #[test]
    fn securities_do_not_share_lots() {
        let records = vec![
            Transaction::buy(d(1), "AAPL", 100.0),
            Transaction::sell(d(2), "MSFT", 100.0),
        ];
        let report = ProfitReport::compute(&records, UnmatchedSellPolicy::Drop).unwrap();
        assert_eq!(report.by_security["AAPL"].open_lots.len(), 1);
        assert_eq!(report.by_security["MSFT"].unmatched_sell, 100.0);
        assert_eq!(report.total_unmatched_sell(), 100.0);
    }

    #[test]
    fn strict_policy_error_propagates() {
        let records = vec![
            Transaction::buy(d(1), "AAPL", 100.0),
            Transaction::sell(d(2), "MSFT", 10.0),
        ];
        let err = ProfitReport::compute(&records, UnmatchedSellPolicy::Error).unwrap_err();
        assert!(matches!(err, LedgerError::UnmatchedSell { ref security, .. } if security == "MSFT"));
    }

    #[test]
    fn top_gainers_positive_only_with_ties_by_symbol() {
        let realized = profits(&[
            ("TSLA", 25.0),
            ("AAPL", 40.0),
            ("NVDA", 40.0),
            ("GME", -10.0),
            ("AMC", 0.0),
        ]);
        let top = top_gainers(&realized, 3);
        assert_eq!(
            top,
            vec![
                ("AAPL".to_string(), 40.0),
                ("NVDA".to_string(), 40.0),
                ("TSLA".to_string(), 25.0)
            ]
        );
        assert_eq!(top_gainers(&realized, 1).len(), 1);
        assert!(top_gainers(&profits(&[("GME", -1.0)]), 3).is_empty());
    }

    #[test]
    fn waterfall_sorts_ascending() {
        let realized = profits(&[("B", 5.0), ("A", -3.0), ("C", 5.0), ("D", 0.0)]);
        let order: Vec<String> = waterfall(&realized).into_iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec!["A", "D", "B", "C"]);
    }

    fn arb_records() -> impl Strategy<Value = Vec<Transaction>> {
        let symbol = prop::sample::select(vec!["AAPL", "MSFT", "TSLA", "VFV"]);
        let row = (symbol, any::<bool>(), 0u32..60, 0u32..100_000).prop_map(|(s, buy, day, cents)| {
            let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(day as u64);
            let amount = cents as f64 / 100.0;
            if buy {
                Transaction::buy(date, s, amount)
            } else {
                Transaction::sell(date, s, amount)
            }
        });
        prop::collection::vec(row, 0..40)
    }

    proptest! {
        #[test]
        fn grouping_is_an_order_preserving_partition(records in arb_records()) {
            let groups = group_by_security(&records);
            let total: usize = groups.values().map(Vec::len).sum();
            prop_assert_eq!(total, records.len());
            for (security, group) in &groups {
                let expected: Vec<&Transaction> =
                    records.iter().filter(|t| &t.security == security).collect();
                let got: Vec<&Transaction> = group.iter().collect();
                prop_assert_eq!(got, expected);
            }
        }

        #[test]
        fn aggregation_is_idempotent(records in arb_records()) {
            let a = ProfitReport::compute(&records, UnmatchedSellPolicy::Drop).unwrap();
            let b = ProfitReport::compute(&records, UnmatchedSellPolicy::Drop).unwrap();
            let bits = |r: &ProfitReport| -> Vec<(String, u64)> {
                r.realized().into_iter().map(|(s, p)| (s, p.to_bits())).collect()
            };
            prop_assert_eq!(bits(&a), bits(&b));
            prop_assert_eq!(a, b);
        }
    }
}
