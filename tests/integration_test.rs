//! End-to-end tests across the domain, ports and adapters.

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use rsitrader::domain::backtest::{run_backtest, BacktestConfig, CapitalMode};
use rsitrader::domain::orchestrator::run_multi;
use rsitrader::domain::universe::{load_universe, SkipReason};

mod multi_symbol_backtest {
    use super::*;

    #[test]
    fn independent_ledgers_aggregate_pnl() {
        let universe = vec![
            symbol_data("AAA", &CYCLE_CLOSES),
            symbol_data("BBB", &CYCLE_CLOSES),
            symbol_data("CCC", &[100.0; 7]),
        ];
        let result = run_multi(&universe, &rsi_config());

        assert_eq!(result.capital_mode, CapitalMode::Independent);
        assert_eq!(result.ledgers.len(), 3);
        assert_abs_diff_eq!(result.initial_capital, 30_000.0);
        assert_abs_diff_eq!(result.final_value, 30_400.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.total_realized_pnl(), 400.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.percentage_return(), 400.0 / 300.0, epsilon = 1e-9);

        let aaa = result.symbol("AAA").unwrap();
        assert_eq!(aaa.trades, 2);
        assert_abs_diff_eq!(aaa.percentage_return, 2.0, epsilon = 1e-9);

        let ccc = result.symbol("CCC").unwrap();
        assert_eq!(ccc.trades, 0);
        assert_abs_diff_eq!(ccc.percentage_return, 0.0);
    }

    #[test]
    fn shared_pool_uses_one_ledger() {
        let universe = vec![
            symbol_data("AAA", &CYCLE_CLOSES),
            symbol_data("BBB", &CYCLE_CLOSES),
        ];
        let config = BacktestConfig {
            capital_mode: CapitalMode::SharedPool,
            ..rsi_config()
        };
        let result = run_multi(&universe, &config);

        assert_eq!(result.ledgers.len(), 1);
        assert_abs_diff_eq!(result.initial_capital, 10_000.0);
        assert_abs_diff_eq!(result.final_value, 10_400.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.percentage_return(), 4.0, epsilon = 1e-9);
        for s in &result.symbols {
            assert_abs_diff_eq!(s.realized_pnl, 200.0, epsilon = 1e-9);
            assert_abs_diff_eq!(s.percentage_return, 2.0, epsilon = 1e-9);
        }

        // lowest point: both positions open, 2000 out of cash
        let min_cash = result
            .valuations()
            .map(|v| v.cash)
            .fold(f64::INFINITY, f64::min);
        assert_abs_diff_eq!(min_cash, 8_000.0, epsilon = 1e-9);
    }

    #[test]
    fn shared_pool_respects_position_cap() {
        let universe = vec![
            symbol_data("AAA", &CYCLE_CLOSES),
            symbol_data("BBB", &CYCLE_CLOSES),
            symbol_data("CCC", &CYCLE_CLOSES),
        ];
        let config = BacktestConfig {
            capital_mode: CapitalMode::SharedPool,
            max_active_positions: 2,
            ..rsi_config()
        };
        let result = run_multi(&universe, &config);

        let ccc = result.symbol("CCC").unwrap();
        assert_eq!(ccc.trades, 0);
        assert!(ccc.rejected_orders >= 1);
        assert_eq!(result.symbol("AAA").unwrap().trades, 2);
        assert_eq!(result.symbol("BBB").unwrap().trades, 2);
        assert_abs_diff_eq!(result.final_value, 10_400.0, epsilon = 1e-9);
    }

    #[test]
    fn symbol_order_decides_who_gets_the_last_slot() {
        let universe = vec![
            symbol_data("ZZZ", &CYCLE_CLOSES),
            symbol_data("AAA", &CYCLE_CLOSES),
        ];
        let config = BacktestConfig {
            capital_mode: CapitalMode::SharedPool,
            max_active_positions: 1,
            ..rsi_config()
        };
        let result = run_multi(&universe, &config);

        assert_eq!(result.symbol("ZZZ").unwrap().trades, 2);
        assert_eq!(result.symbol("AAA").unwrap().trades, 0);
    }
}

mod valuation_invariants {
    use super::*;

    #[test]
    fn value_equals_cash_plus_marked_position() {
        let bars = generate_bars("WAVE", 320, 100.0);
        let config = BacktestConfig::default();
        let result = run_backtest("WAVE", &bars, &config);

        let history = result.portfolio.valuation_history();
        assert_eq!(history.len(), bars.len());
        for (v, bar) in history.iter().zip(&bars) {
            assert!(v.cash >= 0.0);
            assert_abs_diff_eq!(
                v.cash + v.position_quantity * bar.close,
                v.portfolio_value,
                epsilon = 1e-6
            );
        }
    }

    #[test]
    fn no_trades_during_warmup() {
        let bars = bars_from_closes("WAVE", &breakout_closes());
        let result = run_backtest("WAVE", &bars, &BacktestConfig::default());

        // bands need 20 closes before the composite strategy can act
        let trades = result.portfolio.trade_log();
        assert!(!trades.is_empty());
        assert!(trades.iter().all(|t| t.timestamp >= bars[19].timestamp));
    }

    #[test]
    fn rsi_only_all_cash_round_trip() {
        let config = BacktestConfig {
            sizing: rsitrader::domain::execution::PositionSizing::AllCash,
            ..rsi_config()
        };
        let bars = bars_from_closes("AAA", &CYCLE_CLOSES);
        let result = run_backtest("AAA", &bars, &config);

        // 10000 at 50 -> 200 units, sold at 60
        assert_abs_diff_eq!(result.final_value(), 12_000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.percentage_return(), 20.0, epsilon = 1e-9);
    }
}

mod composite_strategy {
    use super::*;
    use rsitrader::domain::execution::ExecutionOutcome;
    use rsitrader::domain::position::Side;
    use rsitrader::domain::strategy::{Action, SignalReason};

    #[test]
    fn band_breakouts_open_and_close_a_position() {
        let closes = breakout_closes();
        let bars = bars_from_closes("AAA", &closes);
        let result = run_backtest("AAA", &bars, &BacktestConfig::default());

        assert_eq!(result.outcomes.len(), 27);
        for outcome in &result.outcomes[..19] {
            assert_eq!(outcome.signal.reason, SignalReason::Warmup);
        }
        for outcome in &result.outcomes[19..25] {
            assert_eq!(outcome.signal.action, Action::Hold);
        }

        let buy = &result.outcomes[25];
        assert_eq!(buy.signal.action, Action::Buy);
        assert_eq!(buy.signal.reason, SignalReason::LowerBandBreakout);
        assert!(matches!(buy.execution, ExecutionOutcome::Opened(_)));

        let sell = &result.outcomes[26];
        assert_eq!(sell.signal.action, Action::Sell);
        assert_eq!(sell.signal.reason, SignalReason::UpperBandBreakout);
        assert!(matches!(sell.execution, ExecutionOutcome::Closed(_)));

        let trades = result.portfolio.trade_log();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, Side::Buy);
        assert_abs_diff_eq!(trades[0].price, 90.0);
        assert_eq!(trades[1].side, Side::Sell);
        assert_abs_diff_eq!(trades[1].price, 120.0);

        // 1000 at 90, sold at 120
        let expected = 1000.0 / 90.0 * 30.0;
        assert_abs_diff_eq!(result.realized_pnl(), expected, epsilon = 1e-9);
        assert_abs_diff_eq!(result.portfolio.cash(), 10_000.0 + expected, epsilon = 1e-9);
        assert_eq!(result.portfolio.active_position_count(), 0);
    }

    #[test]
    fn shared_pool_trades_composite_signals() {
        let closes = breakout_closes();
        let universe = vec![symbol_data("AAA", &closes), symbol_data("BBB", &closes)];
        let config = BacktestConfig {
            capital_mode: CapitalMode::SharedPool,
            ..BacktestConfig::default()
        };
        let result = run_multi(&universe, &config);

        assert_eq!(result.trades().count(), 4);
        let expected = 1000.0 / 90.0 * 30.0;
        for s in &result.symbols {
            assert_eq!(s.trades, 2);
            assert_abs_diff_eq!(s.realized_pnl, expected, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(result.final_value, 10_000.0 + 2.0 * expected, epsilon = 1e-9);
    }
}

mod partial_universe {
    use super::*;

    #[test]
    fn failures_and_empty_results_are_skipped() {
        let port = MockDataPort::new()
            .with_bars("AAA", bars_from_closes("AAA", &CYCLE_CLOSES))
            .with_bars("CCC", vec![])
            .with_error("BBB", "connection refused");
        let symbols = vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()];
        let (start, end) = full_range();

        let universe = load_universe(&port, &symbols, start, end);

        assert_eq!(universe.symbols(), vec!["AAA"]);
        assert_eq!(universe.skipped.len(), 2);
        assert_eq!(universe.skipped[0].symbol, "BBB");
        assert!(matches!(
            universe.skipped[0].reason,
            SkipReason::FetchFailed(ref e) if e.contains("connection refused")
        ));
        assert_eq!(universe.skipped[1].reason, SkipReason::NoData);

        let result = run_multi(&universe.data, &rsi_config());
        assert_eq!(result.symbols.len(), 1);
    }

    #[test]
    fn date_range_outside_data_skips_everything() {
        let port = MockDataPort::new().with_bars("AAA", bars_from_closes("AAA", &CYCLE_CLOSES));
        let universe = load_universe(
            &port,
            &["AAA".to_string()],
            date(2023, 1, 1),
            date(2023, 12, 31),
        );
        assert!(universe.is_empty());
    }
}

mod live_tick {
    use super::*;
    use rsitrader::adapters::paper_broker::PaperBroker;
    use rsitrader::domain::live::{LiveConfig, LiveTrader, OrderKind, TickOutcome};
    use rsitrader::domain::position::Side;

    fn port(closes: &[f64]) -> MockDataPort {
        MockDataPort::new().with_bars("BTC-USD", bars_from_closes("BTC-USD", closes))
    }

    fn symbols() -> Vec<String> {
        vec!["BTC-USD".to_string()]
    }

    #[test]
    fn buy_then_sell_across_ticks() {
        let (start, end) = full_range();
        let broker = PaperBroker::new();
        let mut trader = LiveTrader::new(rsi_config(), LiveConfig::default());

        let first = trader.tick(&port(&CYCLE_CLOSES[..4]), &broker, &symbols(), start, end);
        assert!(matches!(
            first[0],
            TickOutcome::Placed { side: Side::Buy, .. }
        ));
        assert_abs_diff_eq!(trader.ledger().cash(), 9_950.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            trader.ledger().position("BTC-USD").unwrap().quantity,
            1.0,
            epsilon = 1e-12
        );

        let second = trader.tick(&port(&CYCLE_CLOSES), &broker, &symbols(), start, end);
        assert!(matches!(
            second[0],
            TickOutcome::Placed { side: Side::Sell, .. }
        ));
        assert!(!trader.ledger().has_position("BTC-USD"));
        assert_abs_diff_eq!(trader.ledger().realized_pnl(), 10.0, epsilon = 1e-9);

        let placed = broker.placed();
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0]["side"], "buy");
        assert_eq!(placed[0]["type"], "market");
        assert_eq!(placed[0]["market_order_config"]["asset_quantity"], "1");
        assert_eq!(placed[1]["side"], "sell");
        assert_ne!(placed[0]["client_order_id"], placed[1]["client_order_id"]);
    }

    #[test]
    fn buy_records_the_order_quantity_exactly() {
        let (start, end) = full_range();
        let broker = PaperBroker::new();
        let live = LiveConfig {
            order_quantity: 0.1,
            ..LiveConfig::default()
        };
        let mut trader = LiveTrader::new(rsi_config(), live);

        let outcomes = trader.tick(
            &port(&[131.0, 121.0, 111.0, 101.0]),
            &broker,
            &symbols(),
            start,
            end,
        );

        assert!(matches!(
            outcomes[0],
            TickOutcome::Placed { side: Side::Buy, .. }
        ));
        assert_eq!(trader.ledger().position("BTC-USD").unwrap().quantity, 0.1);
        assert_eq!(trader.ledger().trade_log()[0].quantity, 0.1);
        assert_eq!(broker.placed()[0]["market_order_config"]["asset_quantity"], "0.1");
    }

    #[test]
    fn sell_signal_while_flat_does_nothing() {
        let (start, end) = full_range();
        let broker = PaperBroker::new();
        let mut trader = LiveTrader::new(rsi_config(), LiveConfig::default());

        let outcomes = trader.tick(&port(&CYCLE_CLOSES), &broker, &symbols(), start, end);

        assert!(matches!(outcomes[0], TickOutcome::NoAction { .. }));
        assert!(broker.placed().is_empty());
    }

    #[test]
    fn failed_order_leaves_ledger_untouched() {
        let (start, end) = full_range();
        let broker = PaperBroker::rejecting("market closed");
        let mut trader = LiveTrader::new(rsi_config(), LiveConfig::default());

        let outcomes = trader.tick(&port(&CYCLE_CLOSES[..4]), &broker, &symbols(), start, end);

        assert!(matches!(
            outcomes[0],
            TickOutcome::OrderFailed { side: Side::Buy, ref reason, .. } if reason.contains("market closed")
        ));
        assert_abs_diff_eq!(trader.ledger().cash(), 10_000.0);
        assert_eq!(trader.ledger().active_position_count(), 0);
        assert!(trader.ledger().trade_log().is_empty());
    }

    #[test]
    fn limit_orders_sit_below_the_close() {
        let (start, end) = full_range();
        let broker = PaperBroker::new();
        let live = LiveConfig {
            order_kind: OrderKind::Limit,
            limit_offset_pct: 1.0,
            ..LiveConfig::default()
        };
        let mut trader = LiveTrader::new(rsi_config(), live);

        trader.tick(&port(&CYCLE_CLOSES[..4]), &broker, &symbols(), start, end);

        let placed = broker.placed();
        assert_eq!(placed[0]["type"], "limit");
        let limit: f64 = placed[0]["limit_order_config"]["limit_price"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        assert_abs_diff_eq!(limit, 49.5, epsilon = 1e-9);
        assert_abs_diff_eq!(
            trader.ledger().position("BTC-USD").unwrap().entry_price,
            49.5,
            epsilon = 1e-9
        );
    }

    #[test]
    fn missing_symbol_is_skipped() {
        let (start, end) = full_range();
        let broker = PaperBroker::new();
        let mut trader = LiveTrader::new(rsi_config(), LiveConfig::default());
        let data = MockDataPort::new().with_error("ETH-USD", "timeout");

        let outcomes = trader.tick(
            &data,
            &broker,
            &["ETH-USD".to_string(), "SOL-USD".to_string()],
            start,
            end,
        );

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, TickOutcome::Skipped { .. })));
        assert_eq!(outcomes[1].symbol(), "SOL-USD");
    }

    #[test]
    fn position_cap_blocks_order_before_sending() {
        let (start, end) = full_range();
        let broker = PaperBroker::new();
        let config = BacktestConfig {
            max_active_positions: 1,
            ..rsi_config()
        };
        let mut trader = LiveTrader::new(config, LiveConfig::default());
        let data = MockDataPort::new()
            .with_bars("AAA", bars_from_closes("AAA", &CYCLE_CLOSES[..4]))
            .with_bars("BBB", bars_from_closes("BBB", &CYCLE_CLOSES[..4]));

        let outcomes = trader.tick(
            &data,
            &broker,
            &["AAA".to_string(), "BBB".to_string()],
            start,
            end,
        );

        assert!(matches!(outcomes[0], TickOutcome::Placed { .. }));
        assert!(matches!(outcomes[1], TickOutcome::Rejected { .. }));
        assert_eq!(broker.placed().len(), 1);
    }
}

mod csv_round_trip {
    use super::*;
    use rsitrader::adapters::csv_adapter::CsvAdapter;
    use rsitrader::adapters::csv_report_adapter::CsvReportAdapter;
    use rsitrader::ports::report_port::ReportPort;
    use std::fmt::Write as _;
    use std::fs;
    use tempfile::TempDir;

    fn write_bar_file(dir: &std::path::Path, symbol: &str, closes: &[f64]) {
        let mut content = String::from("timestamp,open,high,low,close,volume\n");
        for bar in bars_from_closes(symbol, closes) {
            let _ = writeln!(
                content,
                "{},{},{},{},{},{}",
                bar.timestamp.format("%Y-%m-%d"),
                bar.open,
                bar.high,
                bar.low,
                bar.close,
                bar.volume
            );
        }
        fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
    }

    #[test]
    fn csv_data_to_csv_report() {
        let data_dir = TempDir::new().unwrap();
        write_bar_file(data_dir.path(), "AAA", &CYCLE_CLOSES);
        write_bar_file(data_dir.path(), "BBB", &[100.0; 7]);

        let adapter = CsvAdapter::new(data_dir.path());
        let symbols = vec!["AAA".to_string(), "BBB".to_string(), "MISSING".to_string()];
        let (start, end) = full_range();
        let universe = load_universe(&adapter, &symbols, start, end);
        assert_eq!(universe.symbols(), vec!["AAA", "BBB"]);

        let result = run_multi(&universe.data, &rsi_config());
        assert_abs_diff_eq!(result.total_realized_pnl(), 200.0, epsilon = 1e-9);

        let out = TempDir::new().unwrap();
        CsvReportAdapter::new().write(&result, out.path()).unwrap();

        let valuations = fs::read_to_string(out.path().join("valuations.csv")).unwrap();
        assert_eq!(valuations.lines().count(), 1 + 14);
        let trades = fs::read_to_string(out.path().join("trades.csv")).unwrap();
        assert_eq!(trades.lines().count(), 1 + 2);
        let summary = fs::read_to_string(out.path().join("summary.csv")).unwrap();
        assert!(summary.lines().any(|l| l.starts_with("TOTAL,")));
    }
}
