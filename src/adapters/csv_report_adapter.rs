//! CSV report adapter implementing ReportPort.
//!
//! Writes three files into the output directory:
//! `summary.csv` (one row per symbol plus a `TOTAL` row),
//! `valuations.csv` (every valuation snapshot, in ledger order) and
//! `trades.csv` (the trade log).

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::domain::error::TraderError;
use crate::domain::orchestrator::MultiSymbolResult;
use crate::domain::position::Side;
use crate::ports::report_port::ReportPort;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Serialize)]
struct SummaryRow<'a> {
    symbol: &'a str,
    bars: usize,
    trades: usize,
    rejected_orders: usize,
    realized_pnl: f64,
    unrealized_pnl: f64,
    open_quantity: f64,
    return_pct: f64,
}

#[derive(Serialize)]
struct ValuationRow<'a> {
    timestamp: String,
    symbol: &'a str,
    cash: f64,
    position_quantity: f64,
    portfolio_value: f64,
}

#[derive(Serialize)]
struct TradeRow<'a> {
    timestamp: String,
    symbol: &'a str,
    side: Side,
    price: f64,
    quantity: f64,
    cash_delta: f64,
    realized_pnl: Option<f64>,
}

pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn report_err(path: &Path, e: impl std::fmt::Display) -> TraderError {
    TraderError::Report {
        reason: format!("{}: {}", path.display(), e),
    }
}

fn write_rows<T: Serialize>(
    path: &Path,
    rows: impl IntoIterator<Item = T>,
) -> Result<usize, TraderError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| report_err(path, e))?;
    let mut count = 0;
    for row in rows {
        wtr.serialize(row).map_err(|e| report_err(path, e))?;
        count += 1;
    }
    wtr.flush().map_err(|e| report_err(path, e))?;
    Ok(count)
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, result: &MultiSymbolResult, output_dir: &Path) -> Result<(), TraderError> {
        fs::create_dir_all(output_dir).map_err(|e| report_err(output_dir, e))?;

        let summary = result
            .symbols
            .iter()
            .map(|s| SummaryRow {
                symbol: &s.symbol,
                bars: s.bars,
                trades: s.trades,
                rejected_orders: s.rejected_orders,
                realized_pnl: s.realized_pnl,
                unrealized_pnl: s.unrealized_pnl,
                open_quantity: s.open_quantity,
                return_pct: s.percentage_return,
            })
            .chain(std::iter::once(SummaryRow {
                symbol: "TOTAL",
                bars: result.symbols.iter().map(|s| s.bars).sum(),
                trades: result.symbols.iter().map(|s| s.trades).sum(),
                rejected_orders: result.symbols.iter().map(|s| s.rejected_orders).sum(),
                realized_pnl: result.total_realized_pnl(),
                unrealized_pnl: result.total_unrealized_pnl(),
                open_quantity: result.symbols.iter().map(|s| s.open_quantity).sum(),
                return_pct: result.percentage_return(),
            }));
        write_rows(&output_dir.join("summary.csv"), summary)?;

        let valuations = result.valuations().map(|v| ValuationRow {
            timestamp: v.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            symbol: &v.symbol,
            cash: v.cash,
            position_quantity: v.position_quantity,
            portfolio_value: v.portfolio_value,
        });
        let valuation_count = write_rows(&output_dir.join("valuations.csv"), valuations)?;

        let trades = result.trades().map(|t| TradeRow {
            timestamp: t.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            symbol: &t.symbol,
            side: t.side,
            price: t.price,
            quantity: t.quantity,
            cash_delta: t.cash_delta,
            realized_pnl: t.realized_pnl,
        });
        let trade_count = write_rows(&output_dir.join("trades.csv"), trades)?;

        info!(
            dir = %output_dir.display(),
            valuations = valuation_count,
            trades = trade_count,
            "report written"
        );
        Ok(())
    }
}
