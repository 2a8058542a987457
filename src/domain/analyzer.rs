//! Pluggable analyzers over a finished run's trades and equity curve.
//!
//! Every analyzer has a stable name and produces one [`AnalysisValue`]. In this module
//! a trade is a win only when its profit is strictly positive; a zero-profit trade
//! counts as a loss.

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::metrics::{EquityPoint, TradeSample, max_drawdown};
use super::num::{DecimalExt, from_count, mean, sample_std_dev};

/// Sentinel reported when a ratio has a zero denominator but a positive numerator.
pub const UNBOUNDED_RATIO: Decimal = dec!(999);

const SQN_MIN_TRADES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeStats {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
    pub expectancy: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub total_net_profit: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawdownStats {
    pub max_drawdown: Decimal,
    pub max_drawdown_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisValue {
    Scalar(Decimal),
    TradeStats(TradeStats),
    Drawdown(DrawdownStats),
    EquityCurve(Vec<EquityPoint>),
    CountMap(BTreeMap<String, usize>),
}

impl AnalysisValue {
    pub fn as_scalar(&self) -> Option<Decimal> {
        match self {
            AnalysisValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

pub type AnalysisResult = BTreeMap<String, AnalysisValue>;

pub trait Analyzer: Send + Sync {
    fn name(&self) -> &str;
    fn analyze(&self, trades: &[TradeSample], equity_curve: &[EquityPoint]) -> AnalysisValue;
}

#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in analyzer.
    pub fn with_builtins(risk_free_rate: Decimal) -> Self {
        let mut registry = Self::new();
        registry.add(Arc::new(TradeStatsAnalyzer));
        registry.add(Arc::new(DrawdownAnalyzer));
        registry.add(Arc::new(EquityCurveAnalyzer));
        registry.add(Arc::new(SharpeRatioAnalyzer { risk_free_rate }));
        registry.add(Arc::new(ExpectancyAnalyzer));
        registry.add(Arc::new(ProfitFactorAnalyzer));
        registry.add(Arc::new(AverageTradeDurationAnalyzer));
        registry.add(Arc::new(MaxConsecutiveAnalyzer));
        registry.add(Arc::new(ExpectancyPerTradeAnalyzer));
        registry.add(Arc::new(SystemQualityNumberAnalyzer));
        registry.add(Arc::new(WinLossRatioAnalyzer));
        registry.add(Arc::new(RExpectancyAnalyzer));
        registry
    }

    pub fn add(&mut self, analyzer: Arc<dyn Analyzer>) {
        self.analyzers.push(analyzer);
    }

    pub fn len(&self) -> usize {
        self.analyzers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyzers.is_empty()
    }

    /// Runs every analyzer in registration order. A later analyzer with a duplicate name
    /// replaces the earlier result.
    pub fn run(&self, trades: &[TradeSample], equity_curve: &[EquityPoint]) -> AnalysisResult {
        let mut results = AnalysisResult::new();
        for analyzer in &self.analyzers {
            debug!(analyzer = analyzer.name(), trades = trades.len(), "running analyzer");
            results.insert(
                analyzer.name().to_string(),
                analyzer.analyze(trades, equity_curve),
            );
        }
        results
    }
}

pub struct TradeStatsAnalyzer;

impl Analyzer for TradeStatsAnalyzer {
    fn name(&self) -> &str {
        "TradeStats"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        let mut stats = TradeStats::default();
        if trades.is_empty() {
            return AnalysisValue::TradeStats(stats);
        }
        stats.total_trades = trades.len();

        let mut gross_profit = Decimal::ZERO;
        let mut gross_loss = Decimal::ZERO;
        for trade in trades {
            if trade.is_win {
                stats.winning_trades += 1;
                gross_profit += trade.profit;
            } else {
                stats.losing_trades += 1;
                gross_loss -= trade.profit;
            }
            stats.total_net_profit += trade.profit;
        }

        stats.win_rate = from_count(stats.winning_trades) / from_count(stats.total_trades);
        stats.profit_factor = gross_profit.div_or_zero(gross_loss);
        stats.average_win = gross_profit.div_or_zero(from_count(stats.winning_trades));
        stats.average_loss = gross_loss.div_or_zero(from_count(stats.losing_trades));

        let loss_rate = Decimal::ONE - stats.win_rate;
        stats.expectancy = stats.win_rate * stats.average_win - loss_rate * stats.average_loss;
        AnalysisValue::TradeStats(stats)
    }
}

/// Drawdown over the equity curve alone, with the running peak seeded at zero.
pub struct DrawdownAnalyzer;

impl Analyzer for DrawdownAnalyzer {
    fn name(&self) -> &str {
        "Drawdown"
    }

    fn analyze(&self, _trades: &[TradeSample], equity_curve: &[EquityPoint]) -> AnalysisValue {
        let (max_drawdown, max_drawdown_pct) =
            max_drawdown(equity_curve.iter().map(|p| p.equity), Decimal::ZERO);
        AnalysisValue::Drawdown(DrawdownStats {
            max_drawdown,
            max_drawdown_pct,
        })
    }
}

pub struct EquityCurveAnalyzer;

impl Analyzer for EquityCurveAnalyzer {
    fn name(&self) -> &str {
        "EquityCurve"
    }

    fn analyze(&self, _trades: &[TradeSample], equity_curve: &[EquityPoint]) -> AnalysisValue {
        AnalysisValue::EquityCurve(equity_curve.to_vec())
    }
}

/// Per-trade Sharpe ratio, annualized as if every trade were one trading day.
pub struct SharpeRatioAnalyzer {
    pub risk_free_rate: Decimal,
}

impl Analyzer for SharpeRatioAnalyzer {
    fn name(&self) -> &str {
        "SharpeRatio"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        if trades.len() < 2 {
            return AnalysisValue::Scalar(Decimal::ZERO);
        }
        let returns: Vec<Decimal> = trades.iter().map(|t| t.profit_pct).collect();
        let m = mean(&returns);
        let std_dev = sample_std_dev(&returns, m);
        if std_dev.is_zero() {
            return AnalysisValue::Scalar(Decimal::ZERO);
        }
        let excess = m - self.risk_free_rate / dec!(365);
        AnalysisValue::Scalar(excess / std_dev * dec!(252).sqrt_or_zero())
    }
}

/// Percentage expectancy: win rate × average win % − loss rate × average |loss %|.
/// Zero when there are no winning trades.
pub struct ExpectancyAnalyzer;

impl ExpectancyAnalyzer {
    fn expectancy(trades: &[TradeSample]) -> Decimal {
        let winners: Vec<&TradeSample> = trades.iter().filter(|t| t.is_win).collect();
        if winners.is_empty() {
            return Decimal::ZERO;
        }
        let losers = trades.len() - winners.len();

        let total_win_pct: Decimal = winners.iter().map(|t| t.profit_pct).sum();
        let total_loss_pct: Decimal = trades
            .iter()
            .filter(|t| !t.is_win)
            .map(|t| t.profit_pct.abs())
            .sum();

        let win_rate = from_count(winners.len()) / from_count(trades.len());
        let avg_win_pct = total_win_pct / from_count(winners.len());
        let avg_loss_pct = total_loss_pct.div_or_zero(from_count(losers));
        win_rate * avg_win_pct - (Decimal::ONE - win_rate) * avg_loss_pct
    }
}

impl Analyzer for ExpectancyAnalyzer {
    fn name(&self) -> &str {
        "expectancy"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        AnalysisValue::Scalar(Self::expectancy(trades))
    }
}

/// Gross profit over gross loss. Loss-free ledgers report [`UNBOUNDED_RATIO`] when
/// there is any profit, zero otherwise.
pub struct ProfitFactorAnalyzer;

impl Analyzer for ProfitFactorAnalyzer {
    fn name(&self) -> &str {
        "profit_factor"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        let (gross_profit, gross_loss) =
            trades
                .iter()
                .fold((Decimal::ZERO, Decimal::ZERO), |(gp, gl), t| {
                    if t.profit > Decimal::ZERO {
                        (gp + t.profit, gl)
                    } else {
                        (gp, gl + t.profit.abs())
                    }
                });
        let value = if gross_loss.is_zero() {
            if gross_profit.is_zero() {
                Decimal::ZERO
            } else {
                UNBOUNDED_RATIO
            }
        } else {
            gross_profit / gross_loss
        };
        AnalysisValue::Scalar(value)
    }
}

/// Whole bars; the average is truncated.
pub struct AverageTradeDurationAnalyzer;

impl Analyzer for AverageTradeDurationAnalyzer {
    fn name(&self) -> &str {
        "avg_trade_duration"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        if trades.is_empty() {
            return AnalysisValue::Scalar(Decimal::ZERO);
        }
        let total: usize = trades.iter().map(|t| t.duration).sum();
        AnalysisValue::Scalar(from_count(total / trades.len()))
    }
}

/// Longest win and loss streaks under the keys `wins` and `losses`.
pub struct MaxConsecutiveAnalyzer;

impl Analyzer for MaxConsecutiveAnalyzer {
    fn name(&self) -> &str {
        "max_consecutive"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        let (max_wins, max_losses) = consecutive_streaks(trades);
        let mut counts = BTreeMap::new();
        counts.insert("wins".to_string(), max_wins);
        counts.insert("losses".to_string(), max_losses);
        AnalysisValue::CountMap(counts)
    }
}

pub(crate) fn consecutive_streaks(trades: &[TradeSample]) -> (usize, usize) {
    let (mut max_wins, mut max_losses) = (0, 0);
    let (mut wins, mut losses) = (0, 0);
    for trade in trades {
        if trade.is_win {
            wins += 1;
            losses = 0;
            max_wins = max_wins.max(wins);
        } else {
            losses += 1;
            wins = 0;
            max_losses = max_losses.max(losses);
        }
    }
    (max_wins, max_losses)
}

/// Mean absolute profit per trade.
pub struct ExpectancyPerTradeAnalyzer;

impl Analyzer for ExpectancyPerTradeAnalyzer {
    fn name(&self) -> &str {
        "expectancy_per_trade"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        let profits: Vec<Decimal> = trades.iter().map(|t| t.profit).collect();
        AnalysisValue::Scalar(mean(&profits))
    }
}

/// System Quality Number: percentage expectancy over the sample std dev of absolute
/// profits, scaled by sqrt(n). Needs at least ten trades.
pub struct SystemQualityNumberAnalyzer;

impl Analyzer for SystemQualityNumberAnalyzer {
    fn name(&self) -> &str {
        "sqn"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        if trades.len() < SQN_MIN_TRADES {
            return AnalysisValue::Scalar(Decimal::ZERO);
        }
        let expectancy = ExpectancyAnalyzer::expectancy(trades);
        let profits: Vec<Decimal> = trades.iter().map(|t| t.profit).collect();
        let std_dev = sample_std_dev(&profits, mean(&profits));
        if std_dev.is_zero() {
            return AnalysisValue::Scalar(Decimal::ZERO);
        }
        let n = from_count(trades.len()).sqrt_or_zero();
        AnalysisValue::Scalar(expectancy / std_dev * n)
    }
}

/// Average win over average |loss|. Zero without wins, [`UNBOUNDED_RATIO`] without losses.
pub struct WinLossRatioAnalyzer;

impl Analyzer for WinLossRatioAnalyzer {
    fn name(&self) -> &str {
        "win_loss_ratio"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        let (mut wins, mut losses) = (0usize, 0usize);
        let (mut total_win, mut total_loss) = (Decimal::ZERO, Decimal::ZERO);
        for trade in trades {
            if trade.is_win {
                wins += 1;
                total_win += trade.profit;
            } else {
                losses += 1;
                total_loss += trade.profit.abs();
            }
        }
        if wins == 0 || total_win.is_zero() {
            return AnalysisValue::Scalar(Decimal::ZERO);
        }
        let avg_win = total_win / from_count(wins);
        let avg_loss = total_loss.div_or_zero(from_count(losses));
        if avg_loss.is_zero() {
            return AnalysisValue::Scalar(UNBOUNDED_RATIO);
        }
        AnalysisValue::Scalar(avg_win / avg_loss)
    }
}

/// Mean of `profit_pct / k` where `k` is the 1-indexed trade number.
///
/// The divisor is unusual: later trades are weighted down by their position in the
/// ledger rather than by an initial-risk unit. Divisors run 1, 2, 3, ...; a 0-based
/// index with 0 mapped to 1 would give 1, 1, 2, 3 instead, and the two disagree from
/// the second trade on.
pub struct RExpectancyAnalyzer;

impl Analyzer for RExpectancyAnalyzer {
    fn name(&self) -> &str {
        "r_expectancy"
    }

    fn analyze(&self, trades: &[TradeSample], _equity_curve: &[EquityPoint]) -> AnalysisValue {
        let normalized: Vec<Decimal> = trades
            .iter()
            .enumerate()
            .map(|(i, t)| t.profit_pct / from_count(i + 1))
            .collect();
        AnalysisValue::Scalar(mean(&normalized))
    }
}
