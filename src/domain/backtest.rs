//! Single-instrument backtest simulator.
//!
//! Indicators are computed once over the whole bar sequence; bars are then
//! walked in order, each classified, applied to the ledger and valued.
//! An open position is never force-closed at the end of the run.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use super::execution::{apply_action, ExecutionOutcome, PositionSizing};
use super::indicator::{compute_snapshots, IndicatorSettings, IndicatorSnapshot};
use super::ohlcv::{is_strictly_ascending, OhlcvBar};
use super::portfolio::{Portfolio, DEFAULT_MAX_ACTIVE_POSITIONS};
use super::strategy::{Signal, Strategy};

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

/// Whether symbols share one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapitalMode {
    /// A fresh ledger with the full initial capital per symbol.
    #[default]
    Independent,
    /// One ledger and one position cap across all symbols.
    SharedPool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub max_active_positions: usize,
    pub sizing: PositionSizing,
    pub capital_mode: CapitalMode,
    pub strategy: Strategy,
    pub indicators: IndicatorSettings,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            max_active_positions: DEFAULT_MAX_ACTIVE_POSITIONS,
            sizing: PositionSizing::default(),
            capital_mode: CapitalMode::default(),
            strategy: Strategy::default(),
            indicators: IndicatorSettings::default(),
        }
    }
}

/// What happened on one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarOutcome {
    pub timestamp: NaiveDateTime,
    pub signal: Signal,
    pub execution: ExecutionOutcome,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub symbol: String,
    pub portfolio: Portfolio,
    pub outcomes: Vec<BarOutcome>,
    pub last_close: Option<f64>,
}

impl BacktestResult {
    pub fn rejected_orders(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.execution.is_rejected())
            .count()
    }

    pub fn trade_count(&self) -> usize {
        self.portfolio.trade_log().len()
    }

    fn last_prices(&self) -> HashMap<String, f64> {
        self.last_close
            .map(|close| HashMap::from([(self.symbol.clone(), close)]))
            .unwrap_or_default()
    }

    /// Cash plus the open position at the last close.
    pub fn final_value(&self) -> f64 {
        self.portfolio.mark_to_market(&self.last_prices())
    }

    pub fn realized_pnl(&self) -> f64 {
        self.portfolio.realized_pnl()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.portfolio.unrealized_pnl(&self.last_prices())
    }

    pub fn percentage_return(&self) -> f64 {
        percentage_return(self.portfolio.initial_capital(), self.final_value())
    }
}

pub fn percentage_return(initial: f64, final_value: f64) -> f64 {
    if initial > 0.0 {
        (final_value - initial) / initial * 100.0
    } else {
        0.0
    }
}

/// Classifies one bar, applies the action and records a valuation.
/// `prices` must already carry this bar's close for `symbol`.
pub(crate) fn process_bar(
    ledger: &mut Portfolio,
    config: &BacktestConfig,
    symbol: &str,
    bar: &OhlcvBar,
    snapshot: &IndicatorSnapshot,
    prices: &HashMap<String, f64>,
) -> BarOutcome {
    let signal = config.strategy.classify(snapshot, bar.close);
    let execution = apply_action(
        ledger,
        signal.action,
        symbol,
        bar.close,
        bar.timestamp,
        config.sizing,
    );

    match &execution {
        ExecutionOutcome::Opened(t) | ExecutionOutcome::Closed(t) => debug!(
            symbol,
            timestamp = %bar.timestamp,
            side = %t.side,
            price = t.price,
            quantity = t.quantity,
            reason = %signal.reason,
            "trade"
        ),
        ExecutionOutcome::Rejected(rejection) => debug!(
            symbol,
            timestamp = %bar.timestamp,
            action = %signal.action,
            %rejection,
            "order rejected"
        ),
        ExecutionOutcome::NoOp => {}
    }

    ledger.record_valuation(bar.timestamp, symbol, prices);

    BarOutcome {
        timestamp: bar.timestamp,
        signal,
        execution,
    }
}

/// Runs one instrument through a fresh ledger.
pub fn run_backtest(symbol: &str, bars: &[OhlcvBar], config: &BacktestConfig) -> BacktestResult {
    if !is_strictly_ascending(bars) {
        warn!(symbol, "bars are not in strictly ascending timestamp order");
    }

    let snapshots = compute_snapshots(bars, &config.indicators);
    let mut ledger = Portfolio::new(config.initial_capital, config.max_active_positions);
    let mut prices = HashMap::new();
    let mut outcomes = Vec::with_capacity(bars.len());

    for (bar, snapshot) in bars.iter().zip(&snapshots) {
        prices.insert(symbol.to_string(), bar.close);
        outcomes.push(process_bar(
            &mut ledger,
            config,
            symbol,
            bar,
            snapshot,
            &prices,
        ));
    }

    let result = BacktestResult {
        symbol: symbol.to_string(),
        portfolio: ledger,
        outcomes,
        last_close: bars.last().map(|b| b.close),
    };

    info!(
        symbol,
        bars = bars.len(),
        trades = result.trade_count(),
        realized_pnl = result.realized_pnl(),
        final_value = result.final_value(),
        "backtest complete"
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::RsiSmoothing;
    use crate::domain::position::Side;
    use crate::domain::strategy::{Action, SignalReason};
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn make_bars(prices: &[f64]) -> Vec<OhlcvBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                OhlcvBar::daily(
                    "TEST",
                    start + chrono::Duration::days(i as i64),
                    close,
                    close,
                    close,
                    close,
                    1000.0,
                )
            })
            .collect()
    }

    /// RSI-only strategy with a short simple RSI so scenarios stay small.
    fn rsi_config() -> BacktestConfig {
        BacktestConfig {
            strategy: Strategy::rsi_only(),
            indicators: IndicatorSettings {
                rsi_period: 3,
                rsi_smoothing: RsiSmoothing::Simple,
                ..IndicatorSettings::default()
            },
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn one_valuation_per_bar() {
        let bars = make_bars(&[100.0, 101.0, 99.0, 102.0, 98.0]);
        let result = run_backtest("TEST", &bars, &BacktestConfig::default());
        assert_eq!(result.portfolio.valuation_history().len(), 5);
        assert_eq!(result.outcomes.len(), 5);
        for (v, bar) in result.portfolio.valuation_history().iter().zip(&bars) {
            assert_eq!(v.timestamp, bar.timestamp);
            assert_eq!(v.symbol, "TEST");
        }
    }

    #[test]
    fn buy_at_50_sell_at_60() {
        // three falls drive RSI to 0 (buy at 50), three rises to 100 (sell at 60)
        let bars = make_bars(&[80.0, 70.0, 60.0, 50.0, 52.0, 56.0, 60.0]);
        let result = run_backtest("TEST", &bars, &rsi_config());

        let trades = result.portfolio.trade_log();
        assert_eq!(trades.len(), 2);

        assert_eq!(trades[0].side, Side::Buy);
        assert_abs_diff_eq!(trades[0].price, 50.0);
        assert_abs_diff_eq!(trades[0].quantity, 20.0);
        assert_abs_diff_eq!(result.portfolio.valuation_history()[3].cash, 9000.0);

        assert_eq!(trades[1].side, Side::Sell);
        assert_abs_diff_eq!(trades[1].price, 60.0);
        assert_eq!(trades[1].realized_pnl, Some(200.0));
        assert_abs_diff_eq!(result.portfolio.cash(), 10200.0);
        assert_abs_diff_eq!(result.realized_pnl(), 200.0);
        assert_abs_diff_eq!(result.percentage_return(), 2.0);
    }

    #[test]
    fn flat_run_then_drop_never_sells() {
        let mut closes = vec![100.0; 20];
        closes.push(70.0);
        let bars = make_bars(&closes);
        let result = run_backtest("TEST", &bars, &BacktestConfig::default());

        for outcome in &result.outcomes[..20] {
            assert_eq!(outcome.signal.action, Action::Hold);
            assert_eq!(outcome.signal.reason, SignalReason::Warmup);
            assert_eq!(outcome.execution, ExecutionOutcome::NoOp);
        }
        assert!(
            result
                .portfolio
                .trade_log()
                .iter()
                .all(|t| t.side == Side::Buy)
        );
        assert!(result.realized_pnl().abs() < f64::EPSILON);
    }

    #[test]
    fn open_position_is_marked_not_closed() {
        let bars = make_bars(&[80.0, 70.0, 60.0, 50.0, 45.0]);
        let result = run_backtest("TEST", &bars, &rsi_config());

        assert!(result.portfolio.has_position("TEST"));
        assert_abs_diff_eq!(result.realized_pnl(), 0.0);
        // 9000 cash + 20 units at 45
        assert_abs_diff_eq!(result.final_value(), 9900.0);
        assert_abs_diff_eq!(result.unrealized_pnl(), -100.0);
        let last = result.portfolio.valuation_history().last().unwrap();
        assert_abs_diff_eq!(last.portfolio_value, 9900.0);
        assert_abs_diff_eq!(last.position_quantity, 20.0);
    }

    #[test]
    fn valuation_equals_cash_plus_holdings() {
        let bars = make_bars(&[80.0, 70.0, 60.0, 50.0, 55.0, 52.0, 58.0, 61.0]);
        let result = run_backtest("TEST", &bars, &rsi_config());
        for (v, bar) in result.portfolio.valuation_history().iter().zip(&bars) {
            assert_abs_diff_eq!(
                v.portfolio_value,
                v.cash + v.position_quantity * bar.close,
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn all_cash_sizing() {
        let bars = make_bars(&[80.0, 70.0, 60.0, 50.0, 52.0, 56.0, 60.0]);
        let config = BacktestConfig {
            sizing: PositionSizing::AllCash,
            ..rsi_config()
        };
        let result = run_backtest("TEST", &bars, &config);
        assert_abs_diff_eq!(result.portfolio.trade_log()[0].quantity, 200.0);
        assert_abs_diff_eq!(result.portfolio.cash(), 12000.0);
        assert_abs_diff_eq!(result.percentage_return(), 20.0);
    }

    #[test]
    fn insufficient_cash_counts_as_rejection() {
        let bars = make_bars(&[80.0, 70.0, 60.0, 50.0, 45.0]);
        let config = BacktestConfig {
            initial_capital: 500.0,
            ..rsi_config()
        };
        let result = run_backtest("TEST", &bars, &config);
        assert!(result.portfolio.trade_log().is_empty());
        assert!(result.rejected_orders() >= 1);
        assert_abs_diff_eq!(result.final_value(), 500.0);
    }

    #[test]
    fn empty_bars() {
        let result = run_backtest("TEST", &[], &BacktestConfig::default());
        assert!(result.outcomes.is_empty());
        assert_eq!(result.last_close, None);
        assert_abs_diff_eq!(result.final_value(), DEFAULT_INITIAL_CAPITAL);
        assert_abs_diff_eq!(result.percentage_return(), 0.0);
    }

    #[test]
    fn deterministic() {
        let bars = make_bars(&[80.0, 70.0, 60.0, 50.0, 55.0, 52.0, 58.0, 61.0]);
        let a = run_backtest("TEST", &bars, &rsi_config());
        let b = run_backtest("TEST", &bars, &rsi_config());
        assert_eq!(a.portfolio, b.portfolio);
        assert_eq!(a.outcomes, b.outcomes);
    }

    #[test]
    fn default_config() {
        let c = BacktestConfig::default();
        assert_abs_diff_eq!(c.initial_capital, 10_000.0);
        assert_eq!(c.max_active_positions, 5);
        assert_eq!(c.capital_mode, CapitalMode::Independent);
        assert_eq!(c.sizing, PositionSizing::Fixed(1000.0));
    }
}
