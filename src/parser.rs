//! Normalize transaction text into ledger rows.
//! Accepts the model's CSV (`date,security,transaction_type,amount`), user CSV
//! with the same columns in any order, or free-form lines such as
//! "2024-01-15 BUY AAPL $1,500.00".

use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::types::{RawRecord, TradeFields, Transaction, TransactionType};
use crate::utils::sanitize_symbol;

pub const EXPECTED_HEADER: &str = "date,security,transaction_type,amount";

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%b %d, %Y", "%B %d, %Y"];

// "CAD 12", "12.00 USD"
static CURRENCY_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:USD|CAD|EUR|GBP|AUD|CHF|JPY|HKD)\s*|\s*(?:USD|CAD|EUR|GBP|AUD|CHF|JPY|HKD)$").unwrap()
});

// "2024-01-15 BUY AAPL $1,500.00"
static RE_DATE_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4})\s+(BUY|SELL|BOUGHT|SOLD)\s+([A-Z][A-Z0-9.\-]{0,9})\s+([-+(]?\s*\$?\s*[\d,]+(?:\.\d+)?\)?)$").unwrap()
});

// "Sold $1,200.50 of TSLA on 2024-03-01"
static RE_VERB_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(BUY|SELL|BOUGHT|SOLD)\s+([-+(]?\s*\$?\s*[\d,]+(?:\.\d+)?\)?)\s+(?:of\s+)?([A-Z][A-Z0-9.\-]{0,9})\s+on\s+(\d{4}-\d{2}-\d{2}|\d{1,2}/\d{1,2}/\d{4})$").unwrap()
});

/// Remove a surrounding markdown code fence and a leading `csv` tag.
pub fn strip_model_wrapping(text: &str) -> &str {
    let mut t = text.trim();
    if t.starts_with("```") && t.ends_with("```") && t.len() >= 6 {
        t = t[3..t.len() - 3].trim();
    }
    if t.get(..3).is_some_and(|p| p.eq_ignore_ascii_case("csv")) {
        t = t[3..].trim();
    }
    t
}

/// Parse the conversion model's output. The header must match exactly.
pub fn parse_model_csv(text: &str) -> Result<Vec<RawRecord>, LedgerError> {
    let body = strip_model_wrapping(text);
    let first = body.lines().next().unwrap_or("").trim();
    if first != EXPECTED_HEADER {
        return Err(LedgerError::InvalidHeader {
            expected: EXPECTED_HEADER,
            got: first.to_string(),
        });
    }
    let rows = read_csv(body)?;
    if rows.is_empty() {
        return Err(LedgerError::EmptyInput);
    }
    Ok(rows)
}

/// Read CSV with a header row. Columns are matched by name, case-insensitive;
/// unknown columns are ignored and absent ones leave the field `None`.
pub fn read_csv(text: &str) -> Result<Vec<RawRecord>, LedgerError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_ascii_lowercase(), i))
        .collect();
    let col = |name: &str| columns.get(name).copied();
    let (c_date, c_sec, c_type, c_amt) = (
        col("date"),
        col("security"),
        col("transaction_type"),
        col("amount"),
    );
    debug!("csv columns: {:?}", columns);

    let mut out = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result?;
        let row = i + 1;
        let cell = |c: Option<usize>| {
            c.and_then(|idx| record.get(idx))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        out.push(RawRecord {
            date: cell(c_date).map(|s| parse_date(s, row)).transpose()?,
            security: cell(c_sec).map(sanitize_symbol).filter(|s| !s.is_empty()),
            transaction_type: cell(c_type)
                .map(|s| parse_transaction_type(s, row))
                .transpose()?,
            amount: cell(c_amt).map(|s| parse_amount(s, row)).transpose()?,
        });
    }
    Ok(out)
}

/// Parse one free-form line. `None` when the line is not a recognizable trade.
pub fn parse_line(line: &str, row: usize) -> Result<Option<RawRecord>, LedgerError> {
    let t = line.trim();

    if let Some(c) = RE_DATE_FIRST.captures(t) {
        return Ok(Some(RawRecord {
            date: Some(parse_date(&c[1], row)?),
            transaction_type: Some(parse_transaction_type(&c[2], row)?),
            security: Some(sanitize_symbol(&c[3])),
            amount: Some(parse_amount(&c[4], row)?),
        }));
    }

    if let Some(c) = RE_VERB_FIRST.captures(t) {
        return Ok(Some(RawRecord {
            transaction_type: Some(parse_transaction_type(&c[1], row)?),
            amount: Some(parse_amount(&c[2], row)?),
            security: Some(sanitize_symbol(&c[3])),
            date: Some(parse_date(&c[4], row)?),
        }));
    }

    Ok(None)
}

/// Parse local text of unknown shape: CSV when the first line is a header
/// naming `date`, free-form lines otherwise.
pub fn parse_text(text: &str) -> Result<Vec<RawRecord>, LedgerError> {
    let body = strip_model_wrapping(text);
    let first = body.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let looks_like_csv = first.contains(',')
        && first
            .split(',')
            .any(|h| h.trim().eq_ignore_ascii_case("date"));

    let rows = if looks_like_csv {
        read_csv(body)?
    } else {
        let mut rows = Vec::new();
        for (i, line) in body.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(line, i + 1)? {
                Some(r) => rows.push(r),
                None => warn!("Unrecognized transaction line {}: {}", i + 1, line.trim()),
            }
        }
        rows
    };

    if rows.is_empty() {
        return Err(LedgerError::EmptyInput);
    }
    Ok(rows)
}

/// Turn raw rows into transactions, or name every field some row lacks.
pub fn validate(rows: &[RawRecord]) -> Result<Vec<Transaction>, LedgerError> {
    let mut missing = Vec::new();
    if rows.iter().any(|r| r.date().is_none()) {
        missing.push("date");
    }
    if rows.iter().any(|r| r.security().is_none()) {
        missing.push("security");
    }
    if rows.iter().any(|r| r.transaction_type().is_none()) {
        missing.push("transaction_type");
    }
    if rows.iter().any(|r| r.amount().is_none()) {
        missing.push("amount");
    }
    if !missing.is_empty() {
        return Err(LedgerError::Validation { missing });
    }

    Ok(rows
        .iter()
        .filter_map(|r| match (r.date, &r.security, r.transaction_type, r.amount) {
            (Some(date), Some(sec), Some(tt), Some(amt)) => {
                Some(Transaction::new(date, sec.clone(), tt, amt))
            }
            _ => None,
        })
        .collect())
}

pub fn parse_date(s: &str, row: usize) -> Result<NaiveDate, LedgerError> {
    let s = s.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    // "2024-01-15 09:30:00" or "2024-01-15T09:30:00Z"
    if let Some(d) = s
        .get(..10)
        .and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok())
    {
        return Ok(d);
    }
    Err(LedgerError::DataType {
        row,
        field: "date",
        value: s.to_string(),
        expected: "date",
    })
}

/// Strip currency marks, separators and sign. Parentheses mean negative in
/// statements, but only the magnitude is kept either way. Anything else left
/// over must be a plain float (`1e3` included).
pub fn parse_amount(s: &str, row: usize) -> Result<f64, LedgerError> {
    let bad = || LedgerError::DataType {
        row,
        field: "amount",
        value: s.to_string(),
        expected: "number",
    };
    let cleaned: String = CURRENCY_CODE
        .replace_all(s.trim(), "")
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '(' | ')') && !c.is_whitespace())
        .collect();
    if !cleaned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return Err(bad());
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(f64::abs)
        .ok_or_else(bad)
}

pub fn parse_transaction_type(s: &str, row: usize) -> Result<TransactionType, LedgerError> {
    match s.trim().to_ascii_uppercase().as_str() {
        "BUY" | "BOUGHT" | "PURCHASE" | "MARKET BUY" | "LIMIT BUY" => Ok(TransactionType::Buy),
        "SELL" | "SOLD" | "MARKET SELL" | "LIMIT SELL" => Ok(TransactionType::Sell),
        _ => Err(LedgerError::DataType {
            row,
            field: "transaction_type",
            value: s.to_string(),
            expected: "BUY or SELL",
        }),
    }
}
