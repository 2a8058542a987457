//! Performance metrics over a trade ledger and equity curve.
//!
//! [`PerformanceMetrics::calculate`] is a single aggregation pass. Risk-adjusted ratios
//! are gated on `trading_days > 0`. Insufficient samples leave a ratio at zero.
//!
//! The free functions at the bottom operate on a plain return series.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::num::{
    DecimalExt, from_count, from_f64_saturating, mean, sample_std_dev, to_f64_or_zero,
};
use super::position::Trade;

const TRADING_DAYS_PER_YEAR: Decimal = dec!(252);
const CALENDAR_DAYS_PER_YEAR: Decimal = dec!(365);
const DOWNSIDE_FLOOR: Decimal = dec!(0.0001);
const STERLING_ADJUSTMENT: Decimal = dec!(1.5);

/// The slice of a closed trade that metrics consume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeSample {
    pub profit: Decimal,
    pub profit_pct: Decimal,
    pub duration: usize,
    pub is_win: bool,
}

impl From<&Trade> for TradeSample {
    fn from(trade: &Trade) -> Self {
        TradeSample {
            profit: trade.profit,
            profit_pct: trade.profit_percent,
            duration: trade.duration,
            is_win: trade.is_win(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquityPoint {
    pub index: usize,
    pub equity: Decimal,
    pub drawdown: Decimal,
    pub drawdown_pct: Decimal,
}

/// Builds an equity curve with running-peak drawdowns. `initial_peak` seeds the peak.
pub fn build_equity_curve(equity_values: &[Decimal], initial_peak: Decimal) -> Vec<EquityPoint> {
    let mut peak = initial_peak;
    equity_values
        .iter()
        .enumerate()
        .map(|(index, &equity)| {
            if equity > peak {
                peak = equity;
            }
            let drawdown = peak - equity;
            EquityPoint {
                index,
                equity,
                drawdown,
                drawdown_pct: drawdown.div_or_zero(peak),
            }
        })
        .collect()
}

/// Largest peak-to-trough decline and its fraction of the peak at that point.
///
/// The percentage only moves when the absolute drawdown strictly increases.
pub fn max_drawdown(equity: impl IntoIterator<Item = Decimal>, initial_peak: Decimal) -> (Decimal, Decimal) {
    let mut peak = initial_peak;
    let mut max_dd = Decimal::ZERO;
    let mut max_dd_pct = Decimal::ZERO;
    for value in equity {
        if value > peak {
            peak = value;
        }
        let drawdown = peak - value;
        if drawdown > max_dd {
            max_dd = drawdown;
            if !peak.is_zero() {
                max_dd_pct = drawdown / peak;
            }
        }
    }
    (max_dd, max_dd_pct)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: Decimal,
    pub total_profit: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub average_trade: Decimal,
    pub average_win_pct: Decimal,
    pub average_loss_pct: Decimal,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
    pub avg_drawdown: Decimal,
    pub avg_drawdown_pct: Decimal,
    pub recovery_factor: Decimal,
    pub risk_reward_ratio: Decimal,
    pub cagr: Decimal,
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub calmar_ratio: Decimal,
    pub sterling_ratio: Decimal,
    pub burke_ratio: Decimal,
    pub skewness: Decimal,
    pub kurtosis: Decimal,
    pub initial_equity: Decimal,
    pub final_equity: Decimal,
    pub total_return: Decimal,
    pub total_return_pct: Decimal,
    pub risk_free_rate: Decimal,
    pub trading_days: usize,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self::with_risk_free_rate(dec!(0.02))
    }
}

impl PerformanceMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_risk_free_rate(risk_free_rate: Decimal) -> Self {
        PerformanceMetrics {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: Decimal::ZERO,
            total_profit: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            average_win: Decimal::ZERO,
            average_loss: Decimal::ZERO,
            average_trade: Decimal::ZERO,
            average_win_pct: Decimal::ZERO,
            average_loss_pct: Decimal::ZERO,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            max_drawdown: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            avg_drawdown: Decimal::ZERO,
            avg_drawdown_pct: Decimal::ZERO,
            recovery_factor: Decimal::ZERO,
            risk_reward_ratio: Decimal::ZERO,
            cagr: Decimal::ZERO,
            sharpe_ratio: Decimal::ZERO,
            sortino_ratio: Decimal::ZERO,
            calmar_ratio: Decimal::ZERO,
            sterling_ratio: Decimal::ZERO,
            burke_ratio: Decimal::ZERO,
            skewness: Decimal::ZERO,
            kurtosis: Decimal::ZERO,
            initial_equity: Decimal::ZERO,
            final_equity: Decimal::ZERO,
            total_return: Decimal::ZERO,
            total_return_pct: Decimal::ZERO,
            risk_free_rate,
            trading_days: 0,
        }
    }

    /// Runs the full aggregation. With no trades only the equity bounds are recorded.
    pub fn calculate(
        &mut self,
        trades: &[TradeSample],
        equity_curve: &[EquityPoint],
        initial_equity: Decimal,
        final_equity: Decimal,
        trading_days: usize,
    ) {
        self.initial_equity = initial_equity;
        self.final_equity = final_equity;
        self.trading_days = trading_days;

        if trades.is_empty() {
            return;
        }
        self.total_trades = trades.len();

        let mut consecutive_wins = 0;
        let mut consecutive_losses = 0;
        let mut total_win_pct = Decimal::ZERO;
        let mut total_loss_pct = Decimal::ZERO;

        for trade in trades {
            if trade.is_win {
                self.winning_trades += 1;
                self.gross_profit += trade.profit;
                total_win_pct += trade.profit_pct;
                consecutive_wins += 1;
                consecutive_losses = 0;
                self.max_consecutive_wins = self.max_consecutive_wins.max(consecutive_wins);
            } else {
                self.losing_trades += 1;
                self.gross_loss -= trade.profit;
                total_loss_pct += trade.profit_pct;
                consecutive_losses += 1;
                consecutive_wins = 0;
                self.max_consecutive_losses = self.max_consecutive_losses.max(consecutive_losses);
            }
            self.total_profit += trade.profit;
        }

        if self.winning_trades > 0 {
            let n = from_count(self.winning_trades);
            self.average_win = self.gross_profit / n;
            self.average_win_pct = total_win_pct / n;
        }
        if self.losing_trades > 0 {
            let n = from_count(self.losing_trades);
            self.average_loss = self.gross_loss / n;
            self.average_loss_pct = total_loss_pct / n;
        }

        let total = from_count(self.total_trades);
        self.average_trade = self.total_profit / total;
        self.win_rate = from_count(self.winning_trades) / total;
        self.profit_factor = self.gross_profit.div_or_zero(self.gross_loss);

        self.total_return = final_equity - initial_equity;
        self.total_return_pct = self.total_return.div_or_zero(initial_equity);

        self.calculate_drawdown_metrics(equity_curve);
        self.calculate_risk_adjusted_metrics(trades);
    }

    fn calculate_drawdown_metrics(&mut self, equity_curve: &[EquityPoint]) {
        let (max_dd, max_dd_pct) = max_drawdown(equity_curve.iter().map(|p| p.equity), Decimal::ZERO);
        self.max_drawdown = max_dd;
        self.max_drawdown_pct = max_dd_pct;

        if !equity_curve.is_empty() {
            let n = from_count(equity_curve.len());
            let total_dd: Decimal = equity_curve.iter().map(|p| p.drawdown).sum();
            let total_dd_pct: Decimal = equity_curve.iter().map(|p| p.drawdown_pct).sum();
            self.avg_drawdown = total_dd / n;
            self.avg_drawdown_pct = total_dd_pct / n;
        }

        self.recovery_factor = self.total_profit.div_or_zero(self.max_drawdown);

        if !self.average_loss.is_zero() && self.average_win > self.average_loss {
            self.risk_reward_ratio = self.average_win / self.average_loss;
        }
    }

    fn calculate_risk_adjusted_metrics(&mut self, trades: &[TradeSample]) {
        if self.trading_days == 0 {
            return;
        }
        let annualization = TRADING_DAYS_PER_YEAR / from_count(self.trading_days);
        let returns: Vec<Decimal> = trades.iter().map(|t| t.profit_pct).collect();

        self.cagr = self.compound_annual_growth();
        self.sharpe_ratio = self.trade_sharpe(&returns, annualization);
        self.sortino_ratio = self.trade_sortino(&returns, annualization);

        if !self.max_drawdown.is_zero() {
            self.calmar_ratio = self.cagr.div_or_zero(self.max_drawdown_pct);
            self.burke_ratio = self.total_profit.div_or_zero(self.max_drawdown.powi_or_zero(2));
        }
        self.sterling_ratio = self
            .cagr
            .div_or_zero(self.avg_drawdown_pct * STERLING_ADJUSTMENT);

        self.calculate_higher_moments(&returns);
    }

    fn compound_annual_growth(&self) -> Decimal {
        if self.initial_equity.is_zero() || self.final_equity <= self.initial_equity {
            return Decimal::ZERO;
        }
        let years = from_count(self.trading_days) / CALENDAR_DAYS_PER_YEAR;
        let ratio = to_f64_or_zero(self.final_equity.div_or_zero(self.initial_equity));
        let exponent = 1.0 / to_f64_or_zero(years);
        // very short, very profitable runs overflow Decimal; pin them at the ceiling
        from_f64_saturating(ratio.powf(exponent)) - Decimal::ONE
    }

    fn excess_per_trade(&self, mean_return: Decimal) -> Decimal {
        mean_return - self.risk_free_rate / CALENDAR_DAYS_PER_YEAR
    }

    fn trade_sharpe(&self, returns: &[Decimal], annualization: Decimal) -> Decimal {
        if returns.len() < 2 {
            return Decimal::ZERO;
        }
        let m = mean(returns);
        let std_dev = sample_std_dev(returns, m);
        if std_dev.is_zero() {
            return Decimal::ZERO;
        }
        self.excess_per_trade(m) / std_dev * annualization.sqrt_or_zero()
    }

    fn trade_sortino(&self, returns: &[Decimal], annualization: Decimal) -> Decimal {
        if returns.len() < 2 {
            return Decimal::ZERO;
        }
        let m = mean(returns);
        let downside = trade_downside_deviation(returns, m);
        if downside.is_zero() {
            return Decimal::ZERO;
        }
        self.excess_per_trade(m).div_or_zero(downside) * annualization.sqrt_or_zero()
    }

    fn calculate_higher_moments(&mut self, returns: &[Decimal]) {
        if returns.len() < 3 {
            return;
        }
        let m = mean(returns);
        let std_dev = sample_std_dev(returns, m);
        if std_dev.is_zero() {
            return;
        }
        let mut sum_cubes = Decimal::ZERO;
        let mut sum_fourths = Decimal::ZERO;
        for r in returns {
            let z = (*r - m) / std_dev;
            let z2 = z * z;
            sum_cubes += z2 * z;
            sum_fourths += z2 * z2;
        }
        let n = from_count(returns.len());
        self.skewness = sum_cubes / n;
        self.kurtosis = sum_fourths / n - dec!(3);
    }
}

/// Squared shortfalls below the mean, divided by one less than the number of losing
/// trades. Fewer than two losing trades yields a small floor instead of zero.
fn trade_downside_deviation(returns: &[Decimal], mean: Decimal) -> Decimal {
    let sum_squares: Decimal = returns
        .iter()
        .filter(|r| **r < mean)
        .map(|r| {
            let diff = mean - *r;
            diff * diff
        })
        .sum();
    let losing = returns.iter().filter(|r| **r < Decimal::ZERO).count();
    if losing < 2 {
        return DOWNSIDE_FLOOR;
    }
    (sum_squares / from_count(losing - 1)).sqrt_or_zero()
}

impl fmt::Display for PerformanceMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Performance Metrics:")?;
        writeln!(f, "═══════════════════════════════════════")?;
        writeln!(f, "Total Trades: {}", self.total_trades)?;
        writeln!(f, "Win Rate: {}%", (self.win_rate * Decimal::ONE_HUNDRED).round_dp(2))?;
        writeln!(f, "Profit Factor: {}", self.profit_factor)?;
        writeln!(f, "Net Profit: {}", self.total_profit)?;
        writeln!(f, "CAGR: {}", self.cagr)?;
        writeln!(f, "Sharpe Ratio: {}", self.sharpe_ratio)?;
        writeln!(f, "Sortino Ratio: {}", self.sortino_ratio)?;
        writeln!(f, "Calmar Ratio: {}", self.calmar_ratio)?;
        writeln!(f, "Max Drawdown: {}", self.max_drawdown)?;
        writeln!(f, "Recovery Factor: {}", self.recovery_factor)?;
        writeln!(f, "Average Win: {}", self.average_win)?;
        writeln!(f, "Average Loss: {}", self.average_loss)?;
        writeln!(f, "Total Return: {}", self.total_return_pct)
    }
}

/// Annualized Sharpe ratio of a per-period return series (sample std dev, × sqrt 252).
pub fn sharpe_ratio(returns: &[Decimal], risk_free_rate: Decimal) -> Decimal {
    if returns.len() < 2 {
        return Decimal::ZERO;
    }
    let m = mean(returns);
    let std_dev = sample_std_dev(returns, m);
    if std_dev.is_zero() {
        return Decimal::ZERO;
    }
    (m - risk_free_rate) / std_dev * TRADING_DAYS_PER_YEAR.sqrt_or_zero()
}

/// Annualized Sortino ratio. The downside deviation counts returns below the mean and
/// floors at 0.0001 below two such returns.
pub fn sortino_ratio(returns: &[Decimal], risk_free_rate: Decimal) -> Decimal {
    if returns.len() < 2 {
        return Decimal::ZERO;
    }
    let m = mean(returns);
    let below: Vec<Decimal> = returns.iter().copied().filter(|r| *r < m).collect();
    let downside = if below.len() < 2 {
        DOWNSIDE_FLOOR
    } else {
        let sum_squares: Decimal = below.iter().map(|r| (m - *r) * (m - *r)).sum();
        (sum_squares / from_count(below.len() - 1)).sqrt_or_zero()
    };
    (m - risk_free_rate).div_or_zero(downside) * TRADING_DAYS_PER_YEAR.sqrt_or_zero()
}

pub fn calmar_ratio(cagr: Decimal, max_drawdown: Decimal) -> Decimal {
    cagr.div_or_zero(max_drawdown)
}

/// Compound annual growth over whole years; zero for non-positive `years`.
pub fn cagr(initial_equity: Decimal, final_equity: Decimal, years: u32) -> Decimal {
    if initial_equity.is_zero() || years == 0 {
        return Decimal::ZERO;
    }
    let ratio = to_f64_or_zero(final_equity.div_or_zero(initial_equity));
    from_f64_saturating(ratio.powf(1.0 / f64::from(years))) - Decimal::ONE
}

/// Average return over the sum of squared drawdowns.
pub fn burke_ratio(average_return: Decimal, drawdowns: &[Decimal]) -> Decimal {
    if average_return.is_zero() || drawdowns.is_empty() {
        return Decimal::ZERO;
    }
    let sum_squares: Decimal = drawdowns.iter().map(|d| d * d).sum();
    average_return.div_or_zero(sum_squares)
}
