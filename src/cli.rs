//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_executor::PaperExecutor;
use crate::domain::config::EngineConfig;
use crate::domain::error::TradingError;
use crate::domain::metrics::PerformanceSnapshot;
use crate::domain::orchestrator::{BacktestReport, Orchestrator};
use crate::domain::trade::Trade;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "crosstrader", about = "EMA crossover trading engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay CSV bars through the engine with paper execution
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding one <SYMBOL>.csv per symbol
        #[arg(short, long)]
        data: PathBuf,
        /// Symbols to trade; every CSV in the data directory when omitted
        #[arg(short, long)]
        symbol: Vec<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Print every trade after the summary
        #[arg(long)]
        trades: bool,
    },
    /// Validate an engine configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in a data directory
    Symbols {
        #[arg(short, long)]
        data: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            symbol,
            start,
            end,
            trades,
        } => run_backtest(&config, &data, symbol, start, end, trades),
        Command::Validate { config } => run_validate(&config),
        Command::Symbols { data } => run_symbols(&data),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(&err)
        }
    }
}

/// Loads and validates the engine configuration at `path`.
pub fn load_config(path: &Path) -> Result<EngineConfig, TradingError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    EngineConfig::from_port(&adapter)
}

fn run_validate(config_path: &Path) -> Result<(), TradingError> {
    let config = load_config(config_path)?;
    println!("Configuration is valid.");
    println!(
        "  EMA {}/{}  RSI {} (overbought {}, oversold {})",
        config.strategy.fast_ema,
        config.strategy.slow_ema,
        config.strategy.rsi_period,
        config.strategy.rsi_overbought,
        config.strategy.rsi_oversold,
    );
    println!(
        "  capital {:.2}  risk/trade {:.2}%  daily loss limit {:.2}%  max positions {}",
        config.risk.initial_capital,
        config.risk.risk_per_trade * 100.0,
        config.risk.daily_loss_limit * 100.0,
        config.risk.max_open_positions,
    );
    Ok(())
}

fn run_symbols(data_dir: &Path) -> Result<(), TradingError> {
    let adapter = CsvAdapter::new(data_dir.to_path_buf());
    for symbol in adapter.list_symbols()? {
        println!("{symbol}");
    }
    Ok(())
}

fn run_backtest(
    config_path: &Path,
    data_dir: &Path,
    symbols: Vec<String>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    print_trades: bool,
) -> Result<(), TradingError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;

    let data = CsvAdapter::new(data_dir.to_path_buf());
    let symbols = if symbols.is_empty() {
        data.list_symbols()?
    } else {
        symbols
    };
    if symbols.is_empty() {
        return Err(TradingError::Data {
            reason: format!("no symbols found in {}", data_dir.display()),
        });
    }

    let mut bars = Vec::new();
    for symbol in &symbols {
        let loaded = data.fetch_bars(symbol, start, end)?;
        eprintln!("Loaded {} bars for {symbol}", loaded.len());
        bars.extend(loaded);
    }

    let executor = PaperExecutor::new(config.execution.slippage_pct);
    let mut orchestrator = Orchestrator::new(config, Box::new(executor))?;
    let report = orchestrator.run_backtest(bars)?;

    print_summary(&report, &orchestrator);
    if print_trades {
        print_trade_list(&report.trades);
    }
    Ok(())
}

fn print_summary(report: &BacktestReport, orchestrator: &Orchestrator) {
    let p: &PerformanceSnapshot = &report.performance;
    println!("=== Backtest Summary ===");
    println!(
        "Bars: {} processed, {} rejected",
        report.bars_processed, report.bars_rejected
    );
    for (status, count) in orchestrator.status_counts() {
        println!("Trades {status}: {count}");
    }
    println!("Initial capital: {:.2}", p.initial_capital);
    println!("Final equity:    {:.2}", p.final_equity);
    println!("Total P&L:       {:.2}", p.total_pnl);
    println!("Total return:    {:.2}%", p.total_return * 100.0);
    println!(
        "Closed trades:   {} ({} wins, {} losses, {} breakeven)",
        p.total_trades, p.wins, p.losses, p.breakeven
    );
    println!("Win rate:        {:.2}%", p.win_rate * 100.0);
    println!("Profit factor:   {:.2}", p.profit_factor);
    println!("Expectancy:      {:.2}", p.expectancy);
    println!("Max drawdown:    {:.2}%", p.max_drawdown * 100.0);
    println!("Sharpe ratio:    {:.2}", p.sharpe_ratio);
}

fn print_trade_list(trades: &[Trade]) {
    println!();
    println!("=== Trades ===");
    for t in trades {
        let exit = match (t.exit_time, t.exit_price, t.exit_reason) {
            (Some(time), Some(price), Some(reason)) => format!("{time} @ {price:.2} {reason}"),
            _ => "-".to_string(),
        };
        println!(
            "{} {} {} {} x{} @ {:.2} -> {} pnl {}",
            t.id,
            t.status,
            t.side,
            t.entry_time,
            t.quantity,
            t.entry_price,
            exit,
            t.pnl.map_or_else(|| "-".to_string(), |v| format!("{v:.2}")),
        );
    }
}
