//! Multi-symbol orchestration.
//!
//! `Independent` runs every symbol through its own ledger. `SharedPool`
//! walks all symbols on one unified timeline against a single ledger, so
//! cash and the position cap are shared; within a timestamp symbols are
//! processed in the order given.

use std::collections::HashMap;

use tracing::info;

use super::backtest::{
    percentage_return, process_bar, run_backtest, BacktestConfig, BacktestResult, CapitalMode,
};
use super::code_data::{build_unified_timeline, SymbolData};
use super::indicator::compute_snapshots;
use super::portfolio::{Portfolio, ValuationSnapshot};
use super::position::TradeEvent;

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolResult {
    pub symbol: String,
    pub bars: usize,
    pub trades: usize,
    pub rejected_orders: usize,
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    /// Quantity held at the end of the run, zero when flat.
    pub open_quantity: f64,
    /// Total P&L relative to the capital backing this symbol's ledger.
    pub percentage_return: f64,
}

impl SymbolResult {
    fn from_backtest(result: &BacktestResult) -> Self {
        SymbolResult {
            symbol: result.symbol.clone(),
            bars: result.outcomes.len(),
            trades: result.trade_count(),
            rejected_orders: result.rejected_orders(),
            realized_pnl: result.realized_pnl(),
            unrealized_pnl: result.unrealized_pnl(),
            open_quantity: result
                .portfolio
                .position(&result.symbol)
                .map_or(0.0, |p| p.quantity),
            percentage_return: result.percentage_return(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultiSymbolResult {
    pub capital_mode: CapitalMode,
    /// Capital committed across all ledgers.
    pub initial_capital: f64,
    pub final_value: f64,
    pub symbols: Vec<SymbolResult>,
    /// One ledger per symbol when independent, a single ledger when shared.
    pub ledgers: Vec<Portfolio>,
}

impl MultiSymbolResult {
    pub fn total_realized_pnl(&self) -> f64 {
        self.symbols.iter().map(|s| s.realized_pnl).sum()
    }

    pub fn total_unrealized_pnl(&self) -> f64 {
        self.symbols.iter().map(|s| s.unrealized_pnl).sum()
    }

    pub fn percentage_return(&self) -> f64 {
        percentage_return(self.initial_capital, self.final_value)
    }

    pub fn symbol(&self, symbol: &str) -> Option<&SymbolResult> {
        self.symbols.iter().find(|s| s.symbol == symbol)
    }

    pub fn valuations(&self) -> impl Iterator<Item = &ValuationSnapshot> {
        self.ledgers.iter().flat_map(|l| l.valuation_history())
    }

    pub fn trades(&self) -> impl Iterator<Item = &TradeEvent> {
        self.ledgers.iter().flat_map(|l| l.trade_log())
    }
}

pub fn run_multi(universe: &[SymbolData], config: &BacktestConfig) -> MultiSymbolResult {
    let result = match config.capital_mode {
        CapitalMode::Independent => run_independent(universe, config),
        CapitalMode::SharedPool => run_shared(universe, config),
    };

    info!(
        mode = ?result.capital_mode,
        symbols = result.symbols.len(),
        realized_pnl = result.total_realized_pnl(),
        final_value = result.final_value,
        return_pct = result.percentage_return(),
        "multi-symbol run complete"
    );

    result
}

fn run_independent(universe: &[SymbolData], config: &BacktestConfig) -> MultiSymbolResult {
    let runs: Vec<BacktestResult> = universe
        .iter()
        .map(|sd| run_backtest(&sd.symbol, &sd.bars, config))
        .collect();

    MultiSymbolResult {
        capital_mode: CapitalMode::Independent,
        initial_capital: config.initial_capital * runs.len() as f64,
        final_value: runs.iter().map(BacktestResult::final_value).sum(),
        symbols: runs.iter().map(SymbolResult::from_backtest).collect(),
        ledgers: runs.into_iter().map(|r| r.portfolio).collect(),
    }
}

fn run_shared(universe: &[SymbolData], config: &BacktestConfig) -> MultiSymbolResult {
    let snapshots: Vec<_> = universe
        .iter()
        .map(|sd| compute_snapshots(&sd.bars, &config.indicators))
        .collect();
    let timeline = build_unified_timeline(universe);

    let mut ledger = Portfolio::new(config.initial_capital, config.max_active_positions);
    let mut prices: HashMap<String, f64> = HashMap::new();
    let mut bars_seen = vec![0usize; universe.len()];
    let mut rejected = vec![0usize; universe.len()];

    for timestamp in timeline {
        let active: Vec<(usize, usize)> = universe
            .iter()
            .enumerate()
            .filter_map(|(i, sd)| sd.get_bar_index(timestamp).map(|idx| (i, idx)))
            .collect();

        // value the whole pool at this timestamp's closes
        for &(i, idx) in &active {
            prices.insert(universe[i].symbol.clone(), universe[i].bars[idx].close);
        }

        for (i, idx) in active {
            let sd = &universe[i];
            let outcome = process_bar(
                &mut ledger,
                config,
                &sd.symbol,
                &sd.bars[idx],
                &snapshots[i][idx],
                &prices,
            );
            bars_seen[i] += 1;
            if outcome.execution.is_rejected() {
                rejected[i] += 1;
            }
        }
    }

    let symbols = universe
        .iter()
        .enumerate()
        .map(|(i, sd)| {
            let position = ledger.position(&sd.symbol);
            let realized = ledger.realized_pnl_for(&sd.symbol);
            let unrealized = match (position, sd.last_close()) {
                (Some(p), Some(close)) => p.unrealized_pnl(close),
                _ => 0.0,
            };
            SymbolResult {
                symbol: sd.symbol.clone(),
                bars: bars_seen[i],
                trades: ledger
                    .trade_log()
                    .iter()
                    .filter(|t| t.symbol == sd.symbol)
                    .count(),
                rejected_orders: rejected[i],
                realized_pnl: realized,
                unrealized_pnl: unrealized,
                open_quantity: position.map_or(0.0, |p| p.quantity),
                percentage_return: percentage_return(
                    config.initial_capital,
                    config.initial_capital + realized + unrealized,
                ),
            }
        })
        .collect();

    MultiSymbolResult {
        capital_mode: CapitalMode::SharedPool,
        initial_capital: config.initial_capital,
        final_value: ledger.mark_to_market(&prices),
        symbols,
        ledgers: vec![ledger],
    }
}
