//! Single-asset backtest loop.
//!
//! Each bar, in order:
//! 1. snapshot equity into the curve (missing bars carry the previous value forward),
//! 2. close positions whose stop-loss or take-profit triggers at the close,
//! 3. on an entry signal open a long position, otherwise on an exit signal close every
//!    open position.
//!
//! Positions still open after the last bar are closed at its close.
//!
//! Commission and slippage are carried on [`BacktestConfig`] but never applied to P&L
//! here, and `allow_short` opens nothing: the loop only enters long.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use super::analyzer::{AnalysisResult, Analyzer, AnalyzerRegistry};
use super::metrics::{EquityPoint, PerformanceMetrics, TradeSample, build_equity_curve, max_drawdown};
use super::num::{DecimalExt, from_count};
use super::position::{Position, Trade};
use super::record::{OrderSide, TradingRecord};
use super::series::PriceSeries;
use super::sizing::{PositionSizer, SizingInput};
use super::strategy::Strategy;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: Decimal,
    /// Fixed quantity per entry. Zero sizes each entry as equity / price.
    /// Ignored when the backtester has a sizer attached.
    pub position_size: Decimal,
    pub risk_per_trade: Decimal,
    pub commission: Decimal,
    pub slippage: Decimal,
    pub allow_long: bool,
    pub allow_short: bool,
    /// Fraction of entry price below which a long is stopped out.
    pub stop_loss_pct: Option<Decimal>,
    /// Fraction of entry price above which a long takes profit.
    pub take_profit_pct: Option<Decimal>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: dec!(10000),
            position_size: Decimal::ZERO,
            risk_per_trade: dec!(0.02),
            commission: Decimal::ZERO,
            slippage: Decimal::ZERO,
            allow_long: true,
            allow_short: false,
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: Decimal,
    pub total_profit: Decimal,
    pub net_profit: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    pub profit_factor: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub average_trade: Decimal,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub max_drawdown: Decimal,
    pub max_drawdown_percent: Decimal,
    pub recovery_factor: Decimal,
    pub initial_capital: Decimal,
    pub final_equity: Decimal,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub analysis: AnalysisResult,
}

impl BacktestResult {
    pub fn trade_samples(&self) -> Vec<TradeSample> {
        self.trades.iter().map(TradeSample::from).collect()
    }

    /// Full performance report over this run. `trading_days` of zero leaves the
    /// risk-adjusted ratios at zero.
    pub fn performance(&self, trading_days: usize, risk_free_rate: Decimal) -> PerformanceMetrics {
        let mut metrics = PerformanceMetrics::with_risk_free_rate(risk_free_rate);
        metrics.calculate(
            &self.trade_samples(),
            &self.equity_curve,
            self.initial_capital,
            self.final_equity,
            trading_days,
        );
        metrics
    }
}

/// Summary statistics over a finished run.
///
/// Zero-profit trades count as neither winning nor losing, and a break-even trade ends
/// both streaks. Net profit is `final_equity - initial_capital`. Drawdown is measured
/// with the running peak seeded at `initial_capital`.
pub fn calculate_results(
    trades: Vec<Trade>,
    equity_values: &[Decimal],
    initial_capital: Decimal,
    final_equity: Decimal,
) -> BacktestResult {
    let mut result = BacktestResult {
        total_trades: trades.len(),
        winning_trades: 0,
        losing_trades: 0,
        win_rate: Decimal::ZERO,
        total_profit: Decimal::ZERO,
        net_profit: final_equity - initial_capital,
        gross_profit: Decimal::ZERO,
        gross_loss: Decimal::ZERO,
        profit_factor: Decimal::ZERO,
        average_win: Decimal::ZERO,
        average_loss: Decimal::ZERO,
        average_trade: Decimal::ZERO,
        max_consecutive_wins: 0,
        max_consecutive_losses: 0,
        max_drawdown: Decimal::ZERO,
        max_drawdown_percent: Decimal::ZERO,
        recovery_factor: Decimal::ZERO,
        initial_capital,
        final_equity,
        trades: Vec::new(),
        equity_curve: build_equity_curve(equity_values, initial_capital),
        analysis: AnalysisResult::new(),
    };

    let (mut wins, mut losses) = (0, 0);
    for trade in &trades {
        if trade.profit > Decimal::ZERO {
            result.winning_trades += 1;
            result.gross_profit += trade.profit;
            wins += 1;
            losses = 0;
        } else if trade.profit < Decimal::ZERO {
            result.losing_trades += 1;
            result.gross_loss += trade.profit.abs();
            losses += 1;
            wins = 0;
        } else {
            wins = 0;
            losses = 0;
        }
        result.max_consecutive_wins = result.max_consecutive_wins.max(wins);
        result.max_consecutive_losses = result.max_consecutive_losses.max(losses);
        result.total_profit += trade.profit;
    }

    if !trades.is_empty() {
        let total = from_count(trades.len());
        result.win_rate = from_count(result.winning_trades) / total;
        result.average_trade = result.total_profit / total;
    }
    result.average_win = result
        .gross_profit
        .div_or_zero(from_count(result.winning_trades));
    result.average_loss = result
        .gross_loss
        .div_or_zero(from_count(result.losing_trades));
    result.profit_factor = result.gross_profit.div_or_zero(result.gross_loss);

    let (dd, dd_pct) = max_drawdown(equity_values.iter().copied(), initial_capital);
    result.max_drawdown = dd;
    result.max_drawdown_percent = dd_pct;
    result.recovery_factor = result.net_profit.div_or_zero(dd);

    result.trades = trades;
    result
}

pub struct Backtester {
    series: Arc<PriceSeries>,
    strategy: Arc<dyn Strategy>,
    analyzers: AnalyzerRegistry,
    sizer: Option<Arc<dyn PositionSizer>>,
}

impl Backtester {
    pub fn new(series: Arc<PriceSeries>, strategy: Arc<dyn Strategy>) -> Self {
        Backtester {
            series,
            strategy,
            analyzers: AnalyzerRegistry::new(),
            sizer: None,
        }
    }

    /// Sizes each entry from current equity, the entry price and the configured stop.
    /// A zero size skips the entry.
    pub fn with_sizer(mut self, sizer: Arc<dyn PositionSizer>) -> Self {
        self.sizer = Some(sizer);
        self
    }

    pub fn with_analyzers(mut self, analyzers: AnalyzerRegistry) -> Self {
        self.analyzers = analyzers;
        self
    }

    pub fn add_analyzer(&mut self, analyzer: Arc<dyn Analyzer>) {
        self.analyzers.add(analyzer);
    }

    pub fn series(&self) -> &Arc<PriceSeries> {
        &self.series
    }

    /// Replays the whole series. The backtester keeps no state from the run.
    pub fn run(&self, config: &BacktestConfig) -> BacktestResult {
        let bar_count = self.series.len();
        let mut state = RunState::new(config.initial_capital, bar_count);

        for index in 0..bar_count {
            self.step(index, &mut state, config);
        }
        self.finalize_open_positions(&mut state);

        let RunState {
            trades,
            equity_values,
            equity,
            ..
        } = state;
        let mut result = calculate_results(trades, &equity_values, config.initial_capital, equity);
        result.analysis = self
            .analyzers
            .run(&result.trade_samples(), &result.equity_curve);

        info!(
            bars = bar_count,
            trades = result.total_trades,
            net_profit = %result.net_profit,
            final_equity = %result.final_equity,
            "backtest complete"
        );
        result
    }

    fn step(&self, index: usize, state: &mut RunState, config: &BacktestConfig) {
        state.equity_values.push(state.equity);

        let Some(bar) = self.series.get(index) else {
            return;
        };
        let price = bar.close;

        state.close_triggered(index, price);

        if self.strategy.should_enter(index, &state.record) {
            if config.allow_long {
                state.open_long(index, price, config, self.sizer.as_deref());
            }
            return;
        }
        if self.strategy.should_exit(index, &state.record) && !state.positions.is_empty() {
            state.close_all(index, price);
        }
    }

    fn finalize_open_positions(&self, state: &mut RunState) {
        if state.positions.is_empty() {
            return;
        }
        let Some(last_index) = self.series.last_index() else {
            return;
        };
        let Some(last_bar) = self.series.get(last_index) else {
            return;
        };
        for position in std::mem::take(&mut state.positions) {
            let trade = position.close(last_index, last_bar.close);
            debug!(index = last_index, profit = %trade.profit, "closed at series end");
            state.equity += trade.profit;
            state.trades.push(trade);
        }
    }
}

struct RunState {
    positions: Vec<Position>,
    trades: Vec<Trade>,
    equity_values: Vec<Decimal>,
    equity: Decimal,
    record: TradingRecord,
}

impl RunState {
    fn new(initial_capital: Decimal, bar_count: usize) -> Self {
        RunState {
            positions: Vec::new(),
            trades: Vec::new(),
            equity_values: Vec::with_capacity(bar_count),
            equity: initial_capital,
            record: TradingRecord::new(),
        }
    }

    fn close_triggered(&mut self, index: usize, price: Decimal) {
        for j in (0..self.positions.len()).rev() {
            if self.positions[j].exit_triggered(price) {
                let position = self.positions.remove(j);
                debug!(index, price = %price, "stop/target triggered");
                self.close(position, index, price);
            }
        }
    }

    fn close_all(&mut self, index: usize, price: Decimal) {
        while let Some(position) = self.positions.pop() {
            self.close(position, index, price);
        }
    }

    fn close(&mut self, position: Position, index: usize, price: Decimal) {
        let quantity = position.quantity;
        let trade = position.close(index, price);
        debug!(index, price = %price, profit = %trade.profit, "position closed");
        self.equity += trade.profit;
        self.trades.push(trade);
        self.record.operate(OrderSide::Sell, index, price, quantity);
    }

    fn open_long(
        &mut self,
        index: usize,
        price: Decimal,
        config: &BacktestConfig,
        sizer: Option<&dyn PositionSizer>,
    ) {
        let stop_loss = config.stop_loss_pct.map(|pct| price * (Decimal::ONE - pct));
        let quantity = match sizer {
            Some(sizer) => {
                let sized = sizer.size(&SizingInput {
                    capital: self.equity,
                    price,
                    stop_loss: stop_loss.unwrap_or_default(),
                    risk_per_trade: config.risk_per_trade,
                    ..SizingInput::default()
                });
                if sized <= Decimal::ZERO {
                    debug!(index, price = %price, "entry skipped, sizer returned zero");
                    return;
                }
                sized
            }
            None if config.position_size.is_zero() => self.equity.div_or_zero(price),
            None => config.position_size,
        };
        let position = Position {
            stop_loss,
            take_profit: config.take_profit_pct.map(|pct| price * (Decimal::ONE + pct)),
            ..Position::long(index, price, quantity)
        };
        debug!(index, price = %price, quantity = %quantity, "long opened");
        self.positions.push(position);
        self.record.operate(OrderSide::Buy, index, price, quantity);
    }
}
