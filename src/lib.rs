//! Brokerage activity ledger: normalization, FIFO realized P/L per security,
//! portfolio totals and report views.

pub mod config;
pub mod error;
pub mod fifo;
pub mod llm_client;
pub mod metrics;
pub mod parser;
pub mod pnl;
pub mod report;
pub mod types;
pub mod utils;
