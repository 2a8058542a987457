//! Signal-driven long-only portfolio simulation.
//!
//! Unlike [`Backtester`](super::backtest::Backtester) this path applies fees and
//! slippage: every entry goes all-in at `close * (1 + slippage)` and pays
//! `equity * fees`; every exit fills at `close * (1 - slippage)` and pays
//! `exit_value * fees` out of the trade's profit.

use rust_decimal::Decimal;
use tracing::{debug, info};

use super::backtest::{BacktestResult, calculate_results};
use super::num::DecimalExt;
use super::position::{Position, Trade};
use super::series::PriceSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl From<i32> for Signal {
    /// `1` buys, `-1` sells, anything else holds.
    fn from(code: i32) -> Self {
        match code {
            1 => Signal::Buy,
            -1 => Signal::Sell,
            _ => Signal::Hold,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSimulator {
    pub initial_capital: Decimal,
    pub fees: Decimal,
    pub slippage: Decimal,
}

impl PortfolioSimulator {
    pub fn new(initial_capital: Decimal, fees: Decimal, slippage: Decimal) -> Self {
        PortfolioSimulator {
            initial_capital,
            fees,
            slippage,
        }
    }

    /// Replays `signals` against the series. Bars past the end of `signals` hold, and
    /// missing bars carry equity forward without acting.
    pub fn simulate_long_only(&self, series: &PriceSeries, signals: &[Signal]) -> BacktestResult {
        let mut equity = self.initial_capital;
        let mut open: Option<Position> = None;
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_values = Vec::with_capacity(series.len());

        for i in 0..series.len() {
            let Some(price) = series.close(i) else {
                equity_values.push(equity_values.last().copied().unwrap_or(equity));
                continue;
            };
            let signal = signals.get(i).copied().unwrap_or(Signal::Hold);

            match (open.take(), signal) {
                (None, Signal::Buy) => {
                    let entry_price = price * (Decimal::ONE + self.slippage);
                    let quantity = equity.div_or_zero(entry_price);
                    equity -= equity * self.fees;
                    debug!(index = i, price = %entry_price, quantity = %quantity, "buy");
                    if quantity > Decimal::ZERO {
                        open = Some(Position::long(i, entry_price, quantity));
                    }
                }
                (Some(position), Signal::Sell) => {
                    let exit_price = price * (Decimal::ONE - self.slippage);
                    let fee = exit_price * position.quantity * self.fees;
                    let cost_basis = position.cost_basis();
                    let mut trade = position.close(i, exit_price);
                    trade.profit -= fee;
                    trade.profit_percent = trade.profit.div_or_zero(cost_basis);
                    debug!(index = i, price = %exit_price, profit = %trade.profit, "sell");
                    equity += trade.profit;
                    trades.push(trade);
                }
                (still_open, _) => open = still_open,
            }

            let marked = match &open {
                Some(position) => equity + position.profit_at(price),
                None => equity,
            };
            equity_values.push(marked);
        }

        info!(trades = trades.len(), final_equity = %equity, "portfolio simulation complete");
        calculate_results(trades, &equity_values, self.initial_capital, equity)
    }
}
