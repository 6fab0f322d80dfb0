//! Portfolio-wide cumulative totals.

use std::collections::BTreeSet;

use crate::error::LedgerError;
use crate::types::{PortfolioMetrics, TradeFields, TransactionType};

/// Fields the totals need that are absent from at least one record.
/// `date` is not required here.
fn missing_fields<R: TradeFields>(records: &[R]) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if records.iter().any(|r| r.transaction_type().is_none()) {
        missing.push("transaction_type");
    }
    if records.iter().any(|r| r.amount().is_none()) {
        missing.push("amount");
    }
    if records.iter().any(|r| r.security().is_none()) {
        missing.push("security");
    }
    missing
}

impl PortfolioMetrics {
    /// Validate the whole set, then fold it in one pass.
    pub fn compute<R: TradeFields>(records: &[R]) -> Result<Self, LedgerError> {
        let missing = missing_fields(records);
        if !missing.is_empty() {
            return Err(LedgerError::Validation { missing });
        }

        let mut metrics = PortfolioMetrics::default();
        let mut securities: BTreeSet<&str> = BTreeSet::new();
        for r in records {
            let amount = r.amount().unwrap_or_default().abs();
            match r.transaction_type() {
                Some(TransactionType::Buy) => metrics.total_invested += amount,
                Some(TransactionType::Sell) => metrics.total_sold += amount,
                None => {}
            }
            if let Some(s) = r.security() {
                securities.insert(s);
            }
            metrics.num_transactions += 1;
        }
        metrics.unique_securities = securities.len();
        Ok(metrics)
    }

    pub fn net_profit(&self) -> f64 {
        self.total_sold - self.total_invested
    }

    /// Net profit as a percentage of the amount invested; 0 when nothing was invested.
    pub fn net_return_pct(&self) -> f64 {
        if self.total_invested > 0.0 {
            self.net_profit() / self.total_invested * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RawRecord, Transaction};
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    #[test]
    fn totals_over_two_securities() {
        let records = vec![
            Transaction::buy(d(1), "AAPL", 100.0),
            Transaction::sell(d(2), "AAPL", 60.0),
            Transaction::buy(d(3), "MSFT", 40.0),
        ];
        let m = PortfolioMetrics::compute(&records).unwrap();
        assert_eq!(m.total_invested, 140.0);
        assert_eq!(m.total_sold, 60.0);
        assert_eq!(m.num_transactions, 3);
        assert_eq!(m.unique_securities, 2);
        assert_eq!(m.net_profit(), -80.0);
    }

    #[test]
    fn empty_set_is_all_zero() {
        let m = PortfolioMetrics::compute::<Transaction>(&[]).unwrap();
        assert_eq!(m, PortfolioMetrics::default());
        assert_eq!(m.net_return_pct(), 0.0);
    }

    #[test]
    fn negative_raw_amounts_count_as_absolute() {
        let rows = vec![RawRecord {
            date: None,
            security: Some("VFV".into()),
            transaction_type: Some(TransactionType::Sell),
            amount: Some(-250.0),
        }];
        let m = PortfolioMetrics::compute(&rows).unwrap();
        assert_eq!(m.total_sold, 250.0);
    }

    #[test]
    fn missing_field_fails_before_folding() {
        let rows = vec![
            RawRecord {
                date: Some(d(1)),
                security: Some("AAPL".into()),
                transaction_type: Some(TransactionType::Buy),
                amount: Some(10.0),
            },
            RawRecord {
                date: Some(d(2)),
                security: None,
                transaction_type: Some(TransactionType::Buy),
                amount: None,
            },
        ];
        let err = PortfolioMetrics::compute(&rows).unwrap_err();
        assert_eq!(
            err,
            LedgerError::Validation {
                missing: vec!["amount", "security"]
            }
        );
    }

    #[test]
    fn return_pct_relative_to_invested() {
        let m = PortfolioMetrics {
            total_invested: 200.0,
            total_sold: 250.0,
            num_transactions: 2,
            unique_securities: 1,
        };
        assert_eq!(m.net_return_pct(), 25.0);
    }
}
