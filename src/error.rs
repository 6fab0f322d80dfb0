//! Ledger error kinds surfaced by normalization, validation and matching.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// Required field(s) absent from the input record set.
    #[error("missing required fields: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// A field could not be coerced to its type.
    #[error("row {row}: {field} {value:?} is not a valid {expected}")]
    DataType {
        row: usize,
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid CSV header: expected {expected:?}, got {got:?}")]
    InvalidHeader { expected: &'static str, got: String },

    #[error("no transactions found in input")]
    EmptyInput,

    /// Strict policy only: a SELL exceeded the open lots.
    #[error("{security}: SELL on {date} left {unmatched:.2} unmatched")]
    UnmatchedSell {
        security: String,
        date: NaiveDate,
        unmatched: f64,
    },

    #[error("csv: {0}")]
    Csv(String),
}

impl From<csv::Error> for LedgerError {
    fn from(e: csv::Error) -> Self {
        LedgerError::Csv(e.to_string())
    }
}
