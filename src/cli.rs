//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::backtest::{BacktestConfig, CapitalMode};
use crate::domain::config_validation::{parse_date, validate_config};
use crate::domain::error::TraderError;
use crate::domain::execution::{
    PositionSizing, DEFAULT_INVESTMENT_FRACTION, DEFAULT_INVESTMENT_PER_TRADE,
};
use crate::domain::indicator::{compute_snapshots, IndicatorSettings, RsiSmoothing};
use crate::domain::live::{LiveConfig, LiveTrader, OrderKind, TickOutcome};
use crate::domain::metrics::Metrics;
use crate::domain::orchestrator::{run_multi, MultiSymbolResult};
use crate::domain::strategy::Strategy;
use crate::domain::universe::{load_universe, parse_symbols, LoadedUniverse, SkipReason};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "rsitrader", about = "RSI signal backtester and paper trader")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest the configured symbols over the configured date range
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated symbols, replacing [backtest] symbols
        #[arg(long)]
        symbol: Option<String>,
        /// independent or shared
        #[arg(long)]
        mode: Option<String>,
        /// Directory for CSV reports, replacing [report] output_dir
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Classify the latest bar of each symbol (one live tick)
    Scan {
        #[arg(short, long)]
        config: PathBuf,
        /// Send orders to the in-memory paper broker
        #[arg(long)]
        paper: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            symbol,
            mode,
            output,
        } => run_backtest(&config, symbol.as_deref(), mode.as_deref(), output.as_deref()),
        Command::Scan { config, paper } => run_scan(&config, paper),
        Command::Validate { config } => run_validate(&config),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn init_tracing(level: &str, format: &str, ansi: bool) -> Result<(), String> {
    let filter = std::env::var("RSITRADER_LOG").unwrap_or_else(|_| level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    let result = if format.trim().eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.with_ansi(ansi).try_init()
    };
    result.map_err(|err| format!("failed to install subscriber: {err}"))
}

/// Loads and validates a config file, then starts logging from its
/// `[logging]` section.
fn load_config(path: &Path) -> Result<FileConfigAdapter, TraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)?;

    let level = adapter
        .get_string("logging", "level")
        .unwrap_or_else(|| "info".to_string());
    let format = adapter
        .get_string("logging", "format")
        .unwrap_or_else(|| "text".to_string());
    let ansi = adapter.get_bool("logging", "ansi", true);
    if let Err(e) = init_tracing(&level.to_lowercase(), &format, ansi) {
        eprintln!("warning: {e}");
    }

    info!(path = %path.display(), "config loaded");
    Ok(adapter)
}

fn lower(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_lowercase())
}

fn get_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    usize::try_from(config.get_int(section, key, default as i64)).unwrap_or(default)
}

pub fn parse_capital_mode(value: &str) -> Option<CapitalMode> {
    match value.trim().to_lowercase().as_str() {
        "independent" => Some(CapitalMode::Independent),
        "shared" => Some(CapitalMode::SharedPool),
        _ => None,
    }
}

pub fn build_indicator_settings(config: &dyn ConfigPort) -> IndicatorSettings {
    let d = IndicatorSettings::default();
    IndicatorSettings {
        rsi_period: get_usize(config, "strategy", "rsi_period", d.rsi_period),
        rsi_smoothing: match lower(config, "strategy", "rsi_smoothing").as_deref() {
            Some("simple") => RsiSmoothing::Simple,
            _ => RsiSmoothing::Exponential,
        },
        macd_fast: get_usize(config, "strategy", "macd_fast", d.macd_fast),
        macd_slow: get_usize(config, "strategy", "macd_slow", d.macd_slow),
        macd_signal: get_usize(config, "strategy", "macd_signal", d.macd_signal),
        trend_period: get_usize(config, "strategy", "trend_period", d.trend_period),
        bollinger_period: get_usize(config, "strategy", "bollinger_period", d.bollinger_period),
        bollinger_multiplier: config.get_double(
            "strategy",
            "bollinger_stddev",
            d.bollinger_multiplier,
        ),
    }
}

pub fn build_strategy(config: &dyn ConfigPort) -> Strategy {
    let oversold = config.get_double("strategy", "rsi_oversold", 30.0);
    let overbought = config.get_double("strategy", "rsi_overbought", 70.0);
    match lower(config, "strategy", "kind").as_deref() {
        Some("rsi_only") => Strategy::RsiOnly {
            oversold,
            overbought,
        },
        _ => Strategy::Composite {
            oversold,
            overbought,
        },
    }
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> BacktestConfig {
    let d = BacktestConfig::default();
    let sizing = match lower(config, "backtest", "sizing").as_deref() {
        Some("fraction") => PositionSizing::FractionOfInitial(config.get_double(
            "backtest",
            "investment_fraction",
            DEFAULT_INVESTMENT_FRACTION,
        )),
        Some("all_cash") => PositionSizing::AllCash,
        _ => PositionSizing::Fixed(config.get_double(
            "backtest",
            "investment_per_trade",
            DEFAULT_INVESTMENT_PER_TRADE,
        )),
    };

    BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", d.initial_capital),
        max_active_positions: get_usize(
            config,
            "backtest",
            "max_active_positions",
            d.max_active_positions,
        ),
        sizing,
        capital_mode: lower(config, "backtest", "capital_mode")
            .and_then(|m| parse_capital_mode(&m))
            .unwrap_or_default(),
        strategy: build_strategy(config),
        indicators: build_indicator_settings(config),
    }
}

pub fn build_live_config(config: &dyn ConfigPort) -> LiveConfig {
    let d = LiveConfig::default();
    LiveConfig {
        order_quantity: config.get_double("live", "order_quantity", d.order_quantity),
        order_kind: match lower(config, "live", "order_type").as_deref() {
            Some("limit") => OrderKind::Limit,
            _ => OrderKind::Market,
        },
        limit_offset_pct: config.get_double("live", "limit_offset_pct", d.limit_offset_pct),
    }
}

pub fn resolve_symbols(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, TraderError> {
    let (key, raw) = match symbol_override {
        Some(s) => ("symbols", Some(s.to_string())),
        None => match config.get_string("backtest", "symbols") {
            Some(s) => ("symbols", Some(s)),
            None => ("symbol", config.get_string("backtest", "symbol")),
        },
    };
    let raw = raw.ok_or_else(|| TraderError::missing("backtest", "symbol"))?;
    parse_symbols(&raw).map_err(|e| TraderError::invalid("backtest", key, e.to_string()))
}

fn date_range(config: &dyn ConfigPort) -> Result<(NaiveDate, NaiveDate), TraderError> {
    let start = parse_date(
        config.get_string("backtest", "start_date").as_deref(),
        "start_date",
    )?;
    let end = parse_date(
        config.get_string("backtest", "end_date").as_deref(),
        "end_date",
    )?;
    Ok((start, end))
}

fn data_adapter(config: &dyn ConfigPort) -> Result<CsvAdapter, TraderError> {
    config
        .get_string("data", "csv_dir")
        .map(CsvAdapter::new)
        .ok_or_else(|| TraderError::missing("data", "csv_dir"))
}

fn run_backtest(
    config_path: &Path,
    symbol_override: Option<&str>,
    mode_override: Option<&str>,
    output_override: Option<&Path>,
) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;

    let mut bt_config = build_backtest_config(&adapter);
    if let Some(mode) = mode_override {
        bt_config.capital_mode = parse_capital_mode(mode).ok_or_else(|| {
            TraderError::invalid("backtest", "capital_mode", "expected independent or shared")
        })?;
    }
    let symbols = resolve_symbols(symbol_override, &adapter)?;
    let (start, end) = date_range(&adapter)?;
    let data = data_adapter(&adapter)?;

    info!(
        symbols = symbols.len(),
        %start,
        %end,
        mode = ?bt_config.capital_mode,
        strategy = bt_config.strategy.name(),
        "running backtest"
    );

    let universe = load_universe(&data, &symbols, start, end);
    if universe.is_empty() {
        return Err(TraderError::NoData {
            symbol: symbols.join(","),
        });
    }

    let result = run_multi(&universe.data, &bt_config);
    print!(
        "{}",
        Summary {
            result: &result,
            universe: &universe,
        }
    );

    let output_dir = output_override
        .map(Path::to_path_buf)
        .or_else(|| adapter.get_string("report", "output_dir").map(PathBuf::from));
    if let Some(dir) = output_dir {
        CsvReportAdapter::new().write(&result, &dir)?;
        println!("\nReport written to: {}", dir.display());
    }
    Ok(())
}

/// Per-symbol table, skipped symbols, aggregate figures and ledger metrics.
pub struct Summary<'a> {
    pub result: &'a MultiSymbolResult,
    pub universe: &'a LoadedUniverse,
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = self.result;

        writeln!(f, "=== Per-Symbol Results ({:?}) ===", result.capital_mode)?;
        writeln!(
            f,
            "{:<12} {:>6} {:>7} {:>9} {:>14} {:>14} {:>9}",
            "symbol", "bars", "trades", "rejected", "realized", "unrealized", "return"
        )?;
        for s in &result.symbols {
            writeln!(
                f,
                "{:<12} {:>6} {:>7} {:>9} {:>14.2} {:>14.2} {:>8.2}%",
                s.symbol,
                s.bars,
                s.trades,
                s.rejected_orders,
                s.realized_pnl,
                s.unrealized_pnl,
                s.percentage_return
            )?;
        }

        for skipped in &self.universe.skipped {
            let reason = match &skipped.reason {
                SkipReason::NoData => "no data",
                SkipReason::FetchFailed(e) => e.as_str(),
            };
            writeln!(f, "{:<12} skipped: {}", skipped.symbol, reason)?;
        }

        writeln!(f, "\n=== Aggregate ===")?;
        writeln!(f, "Initial Capital:  {:.2}", result.initial_capital)?;
        writeln!(f, "Final Value:      {:.2}", result.final_value)?;
        writeln!(f, "Realized P&L:     {:.2}", result.total_realized_pnl())?;
        writeln!(f, "Unrealized P&L:   {:.2}", result.total_unrealized_pnl())?;
        writeln!(f, "Return:           {:.2}%", result.percentage_return())?;

        let labels: Vec<&str> = match result.capital_mode {
            CapitalMode::Independent => result.symbols.iter().map(|s| s.symbol.as_str()).collect(),
            CapitalMode::SharedPool => vec!["POOL"],
        };
        writeln!(f, "\n=== Metrics ===")?;
        for (label, ledger) in labels.iter().zip(&result.ledgers) {
            let m = Metrics::compute(ledger);
            writeln!(
                f,
                "{:<12} drawdown -{:.1}%  win rate {:.1}% ({}W/{}L)  profit factor {:.2}",
                label,
                m.max_drawdown * 100.0,
                m.win_rate * 100.0,
                m.trades_won,
                m.trades_lost,
                m.profit_factor
            )?;
        }
        Ok(())
    }
}

fn run_scan(config_path: &Path, paper: bool) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;

    let bt_config = build_backtest_config(&adapter);
    let symbols = resolve_symbols(None, &adapter)?;
    let (start, end) = date_range(&adapter)?;
    let data = data_adapter(&adapter)?;

    if !paper {
        for symbol in &symbols {
            println!("{}", scan_line(&data, &bt_config, symbol, start, end));
        }
        return Ok(());
    }

    let broker = PaperBroker::new();
    let mut trader = LiveTrader::new(bt_config, build_live_config(&adapter));
    for outcome in trader.tick(&data, &broker, &symbols, start, end) {
        println!("{}", format_outcome(&outcome));
    }
    for body in broker.placed() {
        println!("{body}");
    }
    println!("Paper cash: {:.2}", trader.ledger().cash());
    Ok(())
}

fn scan_line(
    data: &dyn MarketDataPort,
    config: &BacktestConfig,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> String {
    let bars = match data.fetch_bars(symbol, start, end) {
        Ok(bars) => bars,
        Err(e) => {
            warn!(symbol, error = %e, "fetch failed");
            return format!("{symbol:<12} skipped: {e}");
        }
    };
    let snapshots = compute_snapshots(&bars, &config.indicators);
    match (bars.last(), snapshots.last()) {
        (Some(bar), Some(snapshot)) => {
            let signal = config.strategy.classify(snapshot, bar.close);
            let rsi = snapshot
                .rsi
                .map_or_else(|| "-".to_string(), |r| format!("{r:.2}"));
            format!(
                "{:<12} {} close {:.4} rsi {:>6} {} ({})",
                symbol, bar.timestamp, bar.close, rsi, signal.action, signal.reason
            )
        }
        _ => format!("{symbol:<12} skipped: no data"),
    }
}

pub fn format_outcome(outcome: &TickOutcome) -> String {
    match outcome {
        TickOutcome::Skipped { symbol, reason } => format!("{symbol:<12} skipped: {reason}"),
        TickOutcome::NoAction { symbol, signal } => {
            format!("{symbol:<12} {} ({}), no order", signal.action, signal.reason)
        }
        TickOutcome::Rejected { symbol, rejection } => {
            format!("{symbol:<12} not sent: {rejection}")
        }
        TickOutcome::OrderFailed {
            symbol,
            side,
            reason,
        } => format!("{symbol:<12} {side} failed: {reason}"),
        TickOutcome::Placed {
            symbol,
            side,
            receipt,
        } => format!(
            "{symbol:<12} {side} placed: {} ({})",
            receipt.order_id, receipt.client_order_id
        ),
    }
}

fn run_validate(config_path: &Path) -> Result<(), TraderError> {
    let adapter = load_config(config_path)?;

    let bt_config = build_backtest_config(&adapter);
    let symbols = resolve_symbols(None, &adapter)?;
    let (start, end) = date_range(&adapter)?;

    println!("Configuration is valid");
    println!("  strategy:   {}", bt_config.strategy.name());
    println!("  symbols:    {}", symbols.join(", "));
    println!("  range:      {} to {}", start, end);
    println!("  mode:       {:?}", bt_config.capital_mode);
    println!("  capital:    {:.2}", bt_config.initial_capital);
    Ok(())
}
