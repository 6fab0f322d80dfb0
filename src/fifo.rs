//! FIFO lot matching over one security's transactions.
//!
//! Amounts are total consideration, not share counts, so a lot is matched by
//! dollar volume. Proceeds allocated to a fully consumed lot equal the lot's
//! own amount, and a partially consumed lot contributes
//! `remaining - lot * (remaining / lot)`. Both come out at zero up to float
//! rounding; without share counts there is no price to realize against.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::types::{Lot, LotSide, RealizedEvent, Transaction, TransactionType};

/// What to do with SELL volume that finds no open lot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UnmatchedSellPolicy {
    /// Drop the excess with no profit effect.
    #[default]
    Drop,
    /// Fail the run with `LedgerError::UnmatchedSell`.
    Error,
    /// Open a short lot that later BUYs cover first.
    CarryShort,
}

impl FromStr for UnmatchedSellPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" | "lenient" => Ok(Self::Drop),
            "error" | "strict" => Ok(Self::Error),
            "carry-short" | "carry_short" | "short" => Ok(Self::CarryShort),
            other => Err(format!(
                "unknown policy {other:?} (expected drop, error or carry-short)"
            )),
        }
    }
}

impl fmt::Display for UnmatchedSellPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Drop => "drop",
            Self::Error => "error",
            Self::CarryShort => "carry-short",
        })
    }
}

/// Result of matching one security.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct MatchOutcome {
    pub total_profit: f64,
    pub events: Vec<RealizedEvent>,
    /// Lots still open at the end of the run, head first. Not marked to market.
    pub open_lots: Vec<Lot>,
    /// SELL volume dropped under `UnmatchedSellPolicy::Drop`.
    pub unmatched_sell: f64,
}

/// Match all transactions of `security`. Records are stable-sorted by date,
/// so same-day trades keep their input order.
pub fn match_security(
    security: &str,
    records: &[Transaction],
    policy: UnmatchedSellPolicy,
) -> Result<MatchOutcome, LedgerError> {
    let mut ordered: Vec<&Transaction> = records.iter().collect();
    ordered.sort_by_key(|t| t.date);

    let mut lots: VecDeque<Lot> = VecDeque::new();
    let mut outcome = MatchOutcome::default();

    for t in ordered {
        match t.transaction_type {
            TransactionType::Buy => {
                if policy == UnmatchedSellPolicy::CarryShort {
                    let open = close_lots(&mut lots, LotSide::Short, security, t, &mut outcome);
                    if open > 0.0 {
                        lots.push_back(Lot::long(open, t.date));
                    }
                } else if t.amount > 0.0 {
                    lots.push_back(Lot::long(t.amount, t.date));
                }
            }
            TransactionType::Sell => {
                let remaining = close_lots(&mut lots, LotSide::Long, security, t, &mut outcome);
                if remaining > 0.0 {
                    match policy {
                        UnmatchedSellPolicy::Drop => {
                            warn!(
                                "{}: SELL on {} has {:.2} with no open lot; dropped",
                                security, t.date, remaining
                            );
                            outcome.unmatched_sell += remaining;
                        }
                        UnmatchedSellPolicy::Error => {
                            return Err(LedgerError::UnmatchedSell {
                                security: security.to_string(),
                                date: t.date,
                                unmatched: remaining,
                            });
                        }
                        UnmatchedSellPolicy::CarryShort => {
                            lots.push_back(Lot::short(remaining, t.date));
                        }
                    }
                }
            }
        }
    }

    debug!(
        "{}: {} events, {} open lots, profit {:.2}",
        security,
        outcome.events.len(),
        lots.len(),
        outcome.total_profit
    );
    outcome.open_lots = lots.into();
    Ok(outcome)
}

/// Consume head lots of `side` against `closing.amount`. Returns the volume
/// left over once no lot of that side remains.
fn close_lots(
    lots: &mut VecDeque<Lot>,
    side: LotSide,
    security: &str,
    closing: &Transaction,
    outcome: &mut MatchOutcome,
) -> f64 {
    let mut remaining = closing.amount;
    while remaining > 0.0 && lots.front().is_some_and(|l| l.side == side) {
        let Some(lot) = lots.pop_front() else { break };

        let (matched, profit) = if lot.amount <= remaining {
            let proceeds = lot.amount;
            remaining -= lot.amount;
            (lot.amount, proceeds - lot.amount)
        } else {
            let profit = remaining - lot.amount * (remaining / lot.amount);
            lots.push_front(Lot {
                amount: lot.amount - remaining,
                ..lot.clone()
            });
            let matched = remaining;
            remaining = 0.0;
            (matched, profit)
        };

        outcome.total_profit += profit;
        outcome.events.push(RealizedEvent {
            security: security.to_string(),
            closed: closing.date,
            opened: lot.opened,
            matched_amount: matched,
            profit,
        });
    }
    remaining
}
