//! One tick of live trading.
//!
//! A tick fetches fresh bars for each symbol, classifies the latest bar and,
//! for a Buy while flat or a Sell while open, sends an order. The paper
//! ledger is only touched after the sink accepts the order. Scheduling
//! ticks is the caller's job.

use chrono::NaiveDate;
use tracing::{info, warn};

use super::backtest::BacktestConfig;
use super::execution::PositionState;
use super::indicator::compute_snapshots;
use super::order::{client_order_id, OrderReceipt, OrderRequest, OrderType};
use super::portfolio::{LedgerRejection, Portfolio};
use super::position::Side;
use super::strategy::{Action, Signal};
use crate::ports::data_port::MarketDataPort;
use crate::ports::order_port::OrderPort;

pub const DEFAULT_ORDER_QUANTITY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderKind {
    #[default]
    Market,
    Limit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    /// Units bought per Buy signal.
    pub order_quantity: f64,
    pub order_kind: OrderKind,
    /// Limit distance from the last close, in percent. Buys sit below the
    /// close, sells above.
    pub limit_offset_pct: f64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        LiveConfig {
            order_quantity: DEFAULT_ORDER_QUANTITY,
            order_kind: OrderKind::Market,
            limit_offset_pct: 0.0,
        }
    }
}

impl LiveConfig {
    /// Order type and reference price for an order at `close`.
    fn order_type(&self, side: Side, quantity: f64, close: f64) -> (OrderType, f64) {
        match self.order_kind {
            OrderKind::Market => (OrderType::Market { quantity }, close),
            OrderKind::Limit => {
                let offset = self.limit_offset_pct / 100.0;
                let limit_price = match side {
                    Side::Buy => close * (1.0 - offset),
                    Side::Sell => close * (1.0 + offset),
                };
                (
                    OrderType::Limit {
                        quantity,
                        limit_price,
                    },
                    limit_price,
                )
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Fetch failed or returned nothing.
    Skipped { symbol: String, reason: String },
    /// Nothing to do for this signal in the current position state.
    NoAction { symbol: String, signal: Signal },
    /// The paper ledger refused the trade, so no order was sent.
    Rejected {
        symbol: String,
        rejection: LedgerRejection,
    },
    /// The sink refused the order; the ledger is unchanged.
    OrderFailed {
        symbol: String,
        side: Side,
        reason: String,
    },
    Placed {
        symbol: String,
        side: Side,
        receipt: OrderReceipt,
    },
}

impl TickOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            TickOutcome::Skipped { symbol, .. }
            | TickOutcome::NoAction { symbol, .. }
            | TickOutcome::Rejected { symbol, .. }
            | TickOutcome::OrderFailed { symbol, .. }
            | TickOutcome::Placed { symbol, .. } => symbol,
        }
    }
}

pub struct LiveTrader {
    config: BacktestConfig,
    live: LiveConfig,
    ledger: Portfolio,
    seq: u64,
}

impl LiveTrader {
    pub fn new(config: BacktestConfig, live: LiveConfig) -> Self {
        let ledger = Portfolio::new(config.initial_capital, config.max_active_positions);
        LiveTrader {
            config,
            live,
            ledger,
            seq: 0,
        }
    }

    pub fn ledger(&self) -> &Portfolio {
        &self.ledger
    }

    pub fn tick(
        &mut self,
        data: &dyn MarketDataPort,
        orders: &dyn OrderPort,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<TickOutcome> {
        symbols
            .iter()
            .map(|symbol| self.tick_symbol(data, orders, symbol, start, end))
            .collect()
    }

    fn tick_symbol(
        &mut self,
        data: &dyn MarketDataPort,
        orders: &dyn OrderPort,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> TickOutcome {
        let bars = match data.fetch_bars(symbol, start, end) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol, error = %e, "fetch failed");
                return TickOutcome::Skipped {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                };
            }
        };
        let snapshots = compute_snapshots(&bars, &self.config.indicators);
        let (Some(bar), Some(snapshot)) = (bars.last(), snapshots.last()) else {
            warn!(symbol, "no data");
            return TickOutcome::Skipped {
                symbol: symbol.to_string(),
                reason: "no data".to_string(),
            };
        };

        let signal = self.config.strategy.classify(snapshot, bar.close);
        info!(
            symbol,
            close = bar.close,
            rsi = ?snapshot.rsi,
            action = %signal.action,
            reason = %signal.reason,
            "signal"
        );

        let side = match (PositionState::of(&self.ledger, symbol), signal.action) {
            (PositionState::Flat, Action::Buy) => Side::Buy,
            (PositionState::Open, Action::Sell) => Side::Sell,
            _ => {
                return TickOutcome::NoAction {
                    symbol: symbol.to_string(),
                    signal,
                };
            }
        };

        let quantity = match side {
            Side::Buy => self.live.order_quantity,
            Side::Sell => self.ledger.position(symbol).map_or(0.0, |p| p.quantity),
        };
        let (order_type, price) = self.live.order_type(side, quantity, bar.close);

        if side == Side::Buy {
            if let Err(rejection) = self.ledger.check_open(symbol, price, quantity * price) {
                info!(symbol, %rejection, "buy skipped");
                return TickOutcome::Rejected {
                    symbol: symbol.to_string(),
                    rejection,
                };
            }
        }

        self.seq += 1;
        let request = OrderRequest {
            client_order_id: client_order_id(symbol, bar.timestamp, self.seq),
            side,
            symbol: symbol.to_string(),
            order_type,
        };

        let receipt = match orders.place_order(&request) {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(symbol, order = %request, error = %e, "order failed");
                return TickOutcome::OrderFailed {
                    symbol: symbol.to_string(),
                    side,
                    reason: e.to_string(),
                };
            }
        };

        let applied = match side {
            Side::Buy => self
                .ledger
                .open_quantity(symbol, price, quantity, bar.timestamp),
            Side::Sell => self.ledger.close_position(symbol, price, bar.timestamp),
        };
        if let Err(rejection) = applied {
            // the sink accepted an order the ledger then refused
            warn!(symbol, %rejection, order_id = %receipt.order_id, "ledger out of sync");
            return TickOutcome::Rejected {
                symbol: symbol.to_string(),
                rejection,
            };
        }

        info!(symbol, order = %request, order_id = %receipt.order_id, "order placed");
        TickOutcome::Placed {
            symbol: symbol.to_string(),
            side,
            receipt,
        }
    }
}
