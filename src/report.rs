//! Presentation views: everything here formats or reshapes figures that the
//! matcher and metrics already produced.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::config::ReportCfg;
use crate::pnl::{top_gainers, waterfall, ProfitReport};
use crate::types::{Lot, LotSide, PortfolioMetrics, Transaction, TransactionType};
use crate::utils::format_money;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SecurityProfit {
    pub security: String,
    pub profit: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Allocation {
    pub security: String,
    pub amount: f64,
    pub pct: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub metrics: PortfolioMetrics,
    pub net_profit: f64,
    pub net_return_pct: f64,
    /// Ascending by profit.
    pub realized: Vec<SecurityProfit>,
    pub total_realized: f64,
    pub top_gainers: Vec<SecurityProfit>,
    pub unmatched_sell: f64,
    pub open_lots: BTreeMap<String, Vec<Lot>>,
    pub recent: Vec<Transaction>,
    pub allocation: Vec<Allocation>,
    pub daily_activity: Vec<DailyActivity>,
    pub cumulative_pl: Vec<(NaiveDate, f64)>,
}

fn to_rows(pairs: Vec<(String, f64)>) -> Vec<SecurityProfit> {
    pairs
        .into_iter()
        .map(|(security, profit)| SecurityProfit { security, profit })
        .collect()
}

impl Report {
    pub fn build(
        records: &[Transaction],
        metrics: PortfolioMetrics,
        profits: &ProfitReport,
        cfg: &ReportCfg,
    ) -> Self {
        let realized = profits.realized();
        let open_lots = profits
            .by_security
            .iter()
            .filter(|(_, o)| !o.open_lots.is_empty())
            .map(|(s, o)| (s.clone(), o.open_lots.clone()))
            .collect();
        Self {
            net_profit: metrics.net_profit(),
            net_return_pct: metrics.net_return_pct(),
            metrics,
            realized: to_rows(waterfall(&realized)),
            total_realized: profits.total_realized(),
            top_gainers: to_rows(top_gainers(&realized, cfg.top_n)),
            unmatched_sell: profits.total_unmatched_sell(),
            open_lots,
            recent: recent_transactions(records, cfg.recent),
            allocation: allocation(records),
            daily_activity: daily_activity(records),
            cumulative_pl: cumulative_pl(records),
        }
    }
}

/// Newest first; same-day rows keep input order.
pub fn recent_transactions(records: &[Transaction], n: usize) -> Vec<Transaction> {
    let mut rows = records.to_vec();
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows.truncate(n);
    rows
}

/// |Σ signed amount| per security (BUY positive, SELL negative) and its share.
pub fn allocation(records: &[Transaction]) -> Vec<Allocation> {
    let mut net: BTreeMap<&str, f64> = BTreeMap::new();
    for t in records {
        let signed = match t.transaction_type {
            TransactionType::Buy => t.amount,
            TransactionType::Sell => -t.amount,
        };
        *net.entry(t.security.as_str()).or_default() += signed;
    }
    let total: f64 = net.values().map(|v| v.abs()).sum();
    net.into_iter()
        .map(|(security, v)| Allocation {
            security: security.to_string(),
            amount: v.abs(),
            pct: if total > 0.0 { v.abs() / total * 100.0 } else { 0.0 },
        })
        .collect()
}

pub fn daily_activity(records: &[Transaction]) -> Vec<DailyActivity> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for t in records {
        *counts.entry(t.date).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(date, count)| DailyActivity { date, count })
        .collect()
}

/// Running total over date-sorted rows, one point per row. SELL counts as
/// `-amount`, BUY as 0.
pub fn cumulative_pl(records: &[Transaction]) -> Vec<(NaiveDate, f64)> {
    let mut ordered: Vec<&Transaction> = records.iter().collect();
    ordered.sort_by_key(|t| t.date);
    ordered
        .into_iter()
        .scan(0.0, |total, t| {
            if t.transaction_type == TransactionType::Sell {
                *total -= t.amount;
            }
            Some((t.date, *total))
        })
        .collect()
}

/// Plain listing used as model context.
pub fn ledger_table(records: &[Transaction]) -> String {
    let mut out = String::from("date        type  security    amount\n");
    for t in records {
        let _ = writeln!(
            out,
            "{}  {:<4}  {:<10}  {:.2}",
            t.date, t.transaction_type, t.security, t.amount
        );
    }
    out
}

/// Short summary of the computed figures, for the chat context.
pub fn portfolio_context(report: &Report) -> String {
    let m = &report.metrics;
    let mut out = String::new();
    let _ = writeln!(out, "Total invested: {}", format_money(m.total_invested));
    let _ = writeln!(out, "Total sold: {}", format_money(m.total_sold));
    let _ = writeln!(out, "Net profit/loss: {}", format_money(report.net_profit));
    let _ = writeln!(out, "Transactions: {}", m.num_transactions);
    let _ = writeln!(out, "Securities: {}", m.unique_securities);
    let _ = writeln!(out, "Realized P/L by security (FIFO):");
    for r in &report.realized {
        let _ = writeln!(out, "  {}: {}", r.security, format_money(r.profit));
    }
    out
}

pub fn render_text(report: &Report) -> String {
    let m = &report.metrics;
    let mut out = String::new();

    let _ = writeln!(out, "== Key Metrics ==");
    let _ = writeln!(out, "Total Invested     {}", format_money(m.total_invested));
    let _ = writeln!(out, "Total Realized     {}", format_money(m.total_sold));
    let _ = writeln!(
        out,
        "Net Profit/Loss    {} ({:.1}%)",
        format_money(report.net_profit),
        report.net_return_pct
    );
    let _ = writeln!(out, "Active Securities  {}", m.unique_securities);
    let _ = writeln!(out, "Transactions       {}", m.num_transactions);

    let _ = writeln!(out, "\n== Profit/Loss by Security (FIFO) ==");
    if report.realized.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for r in &report.realized {
        let _ = writeln!(out, "{:<10} {:>14}", r.security, format_money(r.profit));
    }
    let _ = writeln!(out, "{:<10} {:>14}", "TOTAL", format_money(report.total_realized));
    if report.unmatched_sell > 0.0 {
        let _ = writeln!(
            out,
            "Unmatched sell volume dropped: {}",
            format_money(report.unmatched_sell)
        );
    }

    let _ = writeln!(out, "\n== Top Gainers ==");
    if report.top_gainers.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for g in &report.top_gainers {
        let _ = writeln!(out, "{:<10} {:>14}", g.security, format_money(g.profit));
    }

    if !report.open_lots.is_empty() {
        let _ = writeln!(out, "\n== Open Lots ==");
        for (security, lots) in &report.open_lots {
            for lot in lots {
                let side = match lot.side {
                    LotSide::Long => "long",
                    LotSide::Short => "short",
                };
                let _ = writeln!(
                    out,
                    "{:<10} {:<5} {:>14}  since {}",
                    security,
                    side,
                    format_money(lot.amount),
                    lot.opened
                );
            }
        }
    }

    let _ = writeln!(out, "\n== Recent Transactions ==");
    for t in &report.recent {
        let _ = writeln!(
            out,
            "{}  {:<4}  {:<10} {:>14}",
            t.date,
            t.transaction_type,
            t.security,
            format_money(t.amount)
        );
    }

    let _ = writeln!(out, "\n== Asset Allocation ==");
    for a in &report.allocation {
        let _ = writeln!(
            out,
            "{:<10} {:>14}  {:>6.2}%",
            a.security,
            format_money(a.amount),
            a.pct
        );
    }

    let _ = writeln!(out, "\n== Daily Transaction Volume ==");
    for d in &report.daily_activity {
        let _ = writeln!(out, "{}  {}", d.date, d.count);
    }

    let _ = writeln!(out, "\n== Cumulative P/L ==");
    for (date, total) in &report.cumulative_pl {
        let _ = writeln!(out, "{}  {:>14}", date, format_money(*total));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fifo::UnmatchedSellPolicy;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, day).unwrap()
    }

    fn sample() -> Vec<Transaction> {
        vec![
            Transaction::buy(d(1), "AAPL", 300.0),
            Transaction::buy(d(1), "MSFT", 100.0),
            Transaction::sell(d(3), "AAPL", 100.0),
            Transaction::sell(d(3), "TSLA", 50.0),
        ]
    }

    fn build(records: &[Transaction]) -> Report {
        let metrics = PortfolioMetrics::compute(records).unwrap();
        let profits = ProfitReport::compute(records, UnmatchedSellPolicy::Drop).unwrap();
        Report::build(records, metrics, &profits, &ReportCfg::default())
    }

    #[test]
    fn recent_is_newest_first_and_stable() {
        let recent = recent_transactions(&sample(), 3);
        let order: Vec<(&str, NaiveDate)> =
            recent.iter().map(|t| (t.security.as_str(), t.date)).collect();
        assert_eq!(order, vec![("AAPL", d(3)), ("TSLA", d(3)), ("AAPL", d(1))]);
    }

    #[test]
    fn allocation_uses_absolute_net_amounts() {
        let alloc = allocation(&sample());
        // AAPL 200, MSFT 100, TSLA |-50| = 50; total 350
        assert_eq!(alloc.len(), 3);
        assert_eq!(alloc[0].security, "AAPL");
        assert_eq!(alloc[0].amount, 200.0);
        assert_eq!(alloc[2].amount, 50.0);
        let pct: f64 = alloc.iter().map(|a| a.pct).sum();
        assert!((pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn daily_activity_counts_per_date() {
        assert_eq!(
            daily_activity(&sample()),
            vec![
                DailyActivity { date: d(1), count: 2 },
                DailyActivity { date: d(3), count: 2 }
            ]
        );
    }

    #[test]
    fn cumulative_pl_runs_over_sorted_rows() {
        let records = vec![
            Transaction::sell(d(5), "AAPL", 40.0),
            Transaction::buy(d(1), "AAPL", 300.0),
            Transaction::sell(d(3), "MSFT", 25.0),
            Transaction::sell(d(3), "AAPL", 10.0),
        ];
        assert_eq!(
            cumulative_pl(&records),
            vec![(d(1), 0.0), (d(3), -25.0), (d(3), -35.0), (d(5), -75.0)]
        );
        assert!(cumulative_pl(&[]).is_empty());
    }

    #[test]
    fn report_collects_open_lots_and_dropped_volume() {
        let report = build(&sample());
        assert_eq!(report.unmatched_sell, 50.0);
        assert_eq!(report.open_lots["AAPL"], vec![Lot::long(200.0, d(1))]);
        assert_eq!(report.open_lots["MSFT"], vec![Lot::long(100.0, d(1))]);
        assert!(!report.open_lots.contains_key("TSLA"));
        assert_eq!(report.net_profit, -250.0);
    }

    #[test]
    fn text_render_has_all_sections() {
        let text = render_text(&build(&sample()));
        for heading in [
            "== Key Metrics ==",
            "== Profit/Loss by Security (FIFO) ==",
            "== Top Gainers ==",
            "== Open Lots ==",
            "== Recent Transactions ==",
            "== Asset Allocation ==",
            "== Daily Transaction Volume ==",
            "== Cumulative P/L ==",
        ] {
            assert!(text.contains(heading), "missing {heading}");
        }
        assert!(text.contains("Total Invested     $400.00"));
        assert!(text.contains("Unmatched sell volume dropped: $50.00"));
    }

    #[test]
    fn json_render_is_structured() {
        let v = serde_json::to_value(build(&sample())).unwrap();
        assert_eq!(v["metrics"]["num_transactions"], 4);
        assert_eq!(v["recent"][0]["transaction_type"], "SELL");
        assert!(v["realized"].as_array().unwrap().len() == 3);
        assert_eq!(v["cumulative_pl"].as_array().unwrap().len(), 4);
        assert_eq!(v["cumulative_pl"][3][1], -150.0);
    }

    #[test]
    fn context_lists_realized_rows() {
        let ctx = portfolio_context(&build(&sample()));
        assert!(ctx.contains("Transactions: 4"));
        assert!(ctx.contains("  MSFT: $0.00"));
    }
}
