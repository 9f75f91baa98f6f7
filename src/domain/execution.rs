//! Applying classifier actions to a ledger.
//!
//! Per symbol the simulator is a two-state machine, Flat or Open, read off
//! the ledger. Buy while Flat opens a position, Sell while Open closes it,
//! every other combination is a no-op.

use chrono::NaiveDateTime;

use super::portfolio::{LedgerRejection, Portfolio};
use super::position::TradeEvent;
use super::strategy::Action;

pub const DEFAULT_INVESTMENT_PER_TRADE: f64 = 1000.0;
pub const DEFAULT_INVESTMENT_FRACTION: f64 = 0.2;

/// How much cash a Buy commits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionSizing {
    /// A fixed cash amount per trade.
    Fixed(f64),
    /// A fraction of the ledger's initial capital.
    FractionOfInitial(f64),
    /// Everything currently in cash.
    AllCash,
}

impl Default for PositionSizing {
    fn default() -> Self {
        PositionSizing::Fixed(DEFAULT_INVESTMENT_PER_TRADE)
    }
}

impl PositionSizing {
    pub fn amount(&self, ledger: &Portfolio) -> f64 {
        match *self {
            PositionSizing::Fixed(amount) => amount,
            PositionSizing::FractionOfInitial(fraction) => ledger.initial_capital() * fraction,
            PositionSizing::AllCash => ledger.cash(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionState {
    Flat,
    Open,
}

impl PositionState {
    pub fn of(ledger: &Portfolio, symbol: &str) -> Self {
        if ledger.has_position(symbol) {
            PositionState::Open
        } else {
            PositionState::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Opened(TradeEvent),
    Closed(TradeEvent),
    /// The ledger refused a Buy or Sell; treated like a Hold.
    Rejected(LedgerRejection),
    NoOp,
}

impl ExecutionOutcome {
    pub fn trade(&self) -> Option<&TradeEvent> {
        match self {
            ExecutionOutcome::Opened(t) | ExecutionOutcome::Closed(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, ExecutionOutcome::Rejected(_))
    }
}

pub fn apply_action(
    ledger: &mut Portfolio,
    action: Action,
    symbol: &str,
    price: f64,
    timestamp: NaiveDateTime,
    sizing: PositionSizing,
) -> ExecutionOutcome {
    match (PositionState::of(ledger, symbol), action) {
        (PositionState::Flat, Action::Buy) => {
            let amount = sizing.amount(ledger);
            match ledger.open_position(symbol, price, amount, timestamp) {
                Ok(event) => ExecutionOutcome::Opened(event),
                Err(rejection) => ExecutionOutcome::Rejected(rejection),
            }
        }
        (PositionState::Open, Action::Sell) => {
            match ledger.close_position(symbol, price, timestamp) {
                Ok(event) => ExecutionOutcome::Closed(event),
                Err(rejection) => ExecutionOutcome::Rejected(rejection),
            }
        }
        _ => ExecutionOutcome::NoOp,
    }
}
