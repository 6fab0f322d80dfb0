//! Core domain types for transactions, lots, realized P/L and metrics.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A validated ledger row. `amount` is the total consideration, always >= 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub date: NaiveDate,
    pub security: String,
    pub transaction_type: TransactionType,
    pub amount: f64,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        security: impl Into<String>,
        transaction_type: TransactionType,
        amount: f64,
    ) -> Self {
        Self {
            date,
            security: security.into(),
            transaction_type,
            amount: amount.abs(),
        }
    }

    pub fn buy(date: NaiveDate, security: impl Into<String>, amount: f64) -> Self {
        Self::new(date, security, TransactionType::Buy, amount)
    }

    pub fn sell(date: NaiveDate, security: impl Into<String>, amount: f64) -> Self {
        Self::new(date, security, TransactionType::Sell, amount)
    }
}

/// A normalized row before validation. A field is `None` when the input set
/// did not carry it (absent column or blank cell).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    pub date: Option<NaiveDate>,
    pub security: Option<String>,
    pub transaction_type: Option<TransactionType>,
    pub amount: Option<f64>,
}

/// Field access shared by validated and raw rows, so aggregations that only
/// need a subset of fields can run on either.
pub trait TradeFields {
    fn date(&self) -> Option<NaiveDate>;
    fn security(&self) -> Option<&str>;
    fn transaction_type(&self) -> Option<TransactionType>;
    fn amount(&self) -> Option<f64>;
}

impl TradeFields for Transaction {
    fn date(&self) -> Option<NaiveDate> {
        Some(self.date)
    }
    fn security(&self) -> Option<&str> {
        Some(&self.security)
    }
    fn transaction_type(&self) -> Option<TransactionType> {
        Some(self.transaction_type)
    }
    fn amount(&self) -> Option<f64> {
        Some(self.amount)
    }
}

impl TradeFields for RawRecord {
    fn date(&self) -> Option<NaiveDate> {
        self.date
    }
    fn security(&self) -> Option<&str> {
        self.security.as_deref()
    }
    fn transaction_type(&self) -> Option<TransactionType> {
        self.transaction_type
    }
    fn amount(&self) -> Option<f64> {
        self.amount
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LotSide {
    Long,
    Short,
}

/// Open volume awaiting a match. Only lives inside one matcher run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lot {
    pub side: LotSide,
    pub amount: f64,
    pub opened: NaiveDate,
}

impl Lot {
    pub fn long(amount: f64, opened: NaiveDate) -> Self {
        Self {
            side: LotSide::Long,
            amount,
            opened,
        }
    }

    pub fn short(amount: f64, opened: NaiveDate) -> Self {
        Self {
            side: LotSide::Short,
            amount,
            opened,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealizedEvent {
    pub security: String,
    /// Date of the closing trade (the SELL, or the covering BUY for shorts).
    pub closed: NaiveDate,
    /// Acquisition date of the lot that was matched.
    pub opened: NaiveDate,
    pub matched_amount: f64,
    pub profit: f64,
}

/// Cumulative totals over a transaction set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PortfolioMetrics {
    pub total_invested: f64,
    pub total_sold: f64,
    pub num_transactions: usize,
    pub unique_securities: usize,
}
