//! Entry point. Wires input -> normalizer -> FIFO/metrics -> report.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use trade_ledger::config::{AppConfig, OutputFormat};
use trade_ledger::fifo::UnmatchedSellPolicy;
use trade_ledger::llm_client::LlmClient;
use trade_ledger::parser;
use trade_ledger::pnl::ProfitReport;
use trade_ledger::report::{self, Report};
use trade_ledger::types::{PortfolioMetrics, RawRecord, Transaction};

#[derive(Debug, Parser)]
#[command(name = "trade-ledger", version, about = "Realized P/L and totals from brokerage activity")]
struct Cli {
    /// Config file (default: ./config.yaml, then the user config dir).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Activity file; reads stdin when omitted or "-".
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Send the text through the conversion model instead of parsing it locally.
    #[arg(long)]
    model: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compute metrics and FIFO realized P/L and print the report.
    Report {
        #[command(flatten)]
        input: InputArgs,
        /// What to do with sell volume that has no open lot: drop, error, carry-short.
        #[arg(long)]
        policy: Option<UnmatchedSellPolicy>,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        top: Option<usize>,
    },
    /// Convert free-form activity text to ledger CSV with the model.
    Convert {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Ask the model for commentary on the ledger.
    Analyze {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Interactive questions about the ledger.
    Chat {
        #[command(flatten)]
        input: InputArgs,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = AppConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Report {
            input,
            policy,
            json,
            top,
        } => {
            if let Some(p) = policy {
                cfg.matching.unmatched_sell = p;
            }
            if json {
                cfg.report.format = OutputFormat::Json;
            }
            if let Some(n) = top {
                cfg.report.top_n = n;
            }
            cfg.validate()?;
            let rows = load_rows(&input, &cfg).await?;
            let report = build_report(&rows, &cfg)?.1;
            match cfg.report.format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => print!("{}", report::render_text(&report)),
            }
        }

        Command::Convert { input } => {
            let text = read_input(input.as_ref()).await?;
            let client = LlmClient::from_config(&cfg.llm)?;
            let (csv, _) = client.convert_to_csv(&text).await?;
            println!("{}", csv);
        }

        Command::Analyze { input } => {
            let rows = load_rows(&input, &cfg).await?;
            let records = parser::validate(&rows)?;
            let client = LlmClient::from_config(&cfg.llm)?;
            let analysis = client
                .analyze_portfolio(&report::ledger_table(&records))
                .await?;
            println!("{}", analysis);
        }

        Command::Chat { input } => {
            let rows = load_rows(&input, &cfg).await?;
            let (records, report) = build_report(&rows, &cfg)?;
            let context = format!(
                "{}\nTransactions:\n{}",
                report::portfolio_context(&report),
                report::ledger_table(&records)
            );
            let client = LlmClient::from_config(&cfg.llm)?;
            match client
                .analyze_portfolio(&report::ledger_table(&records))
                .await
            {
                Ok(analysis) => println!("{}\n", analysis),
                Err(e) => error!("{:#}", e),
            }
            info!("Chat ready; empty line or 'exit' to quit");
            loop {
                let question = prompt_line("You: ").await?;
                if question.is_empty() || question.eq_ignore_ascii_case("exit") {
                    break;
                }
                match client.chat_response(&question, &context).await {
                    Ok(answer) => println!("\n{}\n", answer),
                    Err(e) => error!("{:#}", e),
                }
            }
        }
    }
    Ok(())
}

async fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) if p.as_os_str() != "-" => tokio::fs::read_to_string(p)
            .await
            .with_context(|| format!("read {}", p.display())),
        _ => {
            let mut s = String::new();
            tokio::io::stdin()
                .read_to_string(&mut s)
                .await
                .context("read stdin")?;
            Ok(s)
        }
    }
}

async fn load_rows(input: &InputArgs, cfg: &AppConfig) -> Result<Vec<RawRecord>> {
    let text = read_input(input.input.as_ref()).await?;
    let rows = if input.model {
        let client = LlmClient::from_config(&cfg.llm)?;
        client.convert_to_csv(&text).await?.1
    } else {
        parser::parse_text(&text)?
    };
    info!("Loaded {} rows", rows.len());
    Ok(rows)
}

/// Metrics validate their own fields first; matching needs every field.
fn build_report(rows: &[RawRecord], cfg: &AppConfig) -> Result<(Vec<Transaction>, Report)> {
    let metrics = PortfolioMetrics::compute(rows)?;
    let records = parser::validate(rows)?;
    let profits = ProfitReport::compute(&records, cfg.matching.unmatched_sell)?;
    info!(
        "{} securities matched (policy={}), realized {:.2}",
        profits.by_security.len(),
        cfg.matching.unmatched_sell,
        profits.total_realized()
    );
    let report = Report::build(&records, metrics, &profits, &cfg.report);
    Ok((records, report))
}

/// Read one line from stdin on a blocking thread.
async fn prompt_line(prompt: &str) -> Result<String> {
    use std::io::{self, Write};
    let prompt = prompt.to_string();
    let line = tokio::task::spawn_blocking(move || -> Result<String> {
        print!("{}", prompt);
        let _ = io::stdout().flush();
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_string())
    })
    .await
    .context("spawn_blocking join error")??;
    Ok(line)
}
