//! Performance metrics computed from a finished ledger.

use super::portfolio::{Portfolio, ValuationSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    /// Fractional return from the last recorded valuation.
    pub total_return: f64,
    /// Largest peak-to-trough fall of portfolio value, as a fraction.
    pub max_drawdown: f64,
    /// Longest run of valuation points spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl Metrics {
    pub fn compute(portfolio: &Portfolio) -> Self {
        let curve = value_curve(portfolio.valuation_history());
        let initial_capital = portfolio.initial_capital();

        let final_value = curve.last().copied().unwrap_or(initial_capital);
        let total_return = if initial_capital > 0.0 {
            (final_value - initial_capital) / initial_capital
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&curve);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for pnl in portfolio.trade_log().iter().filter_map(|t| t.realized_pnl) {
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let total_trades = trades_won + trades_lost + trades_breakeven;
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            max_drawdown,
            max_drawdown_duration,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
        }
    }
}

/// Portfolio value per timestamp. A shared ledger records one valuation per
/// symbol per timestamp; the last one at each timestamp wins.
fn value_curve(history: &[ValuationSnapshot]) -> Vec<f64> {
    let mut curve: Vec<f64> = Vec::with_capacity(history.len());
    let mut last_ts = None;
    for v in history {
        if last_ts == Some(v.timestamp) {
            if let Some(last) = curve.last_mut() {
                *last = v.portfolio_value;
            }
        } else {
            curve.push(v.portfolio_value);
            last_ts = Some(v.timestamp);
        }
    }
    curve
}

fn compute_drawdown(curve: &[f64]) -> (f64, usize) {
    let Some(&first) = curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for &value in curve {
        if value >= peak {
            peak = value;
            duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}
