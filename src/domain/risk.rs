//! Value-at-Risk, position sizing and return-series risk statistics.
//!
//! VaR and CVaR are reported as positive numbers for losses. All three VaR methods
//! share one percentile rule: sort ascending, take index `floor((1 - confidence) * N)`
//! clamped to `[0, N - 1]`, and average `[0..=index]` for CVaR.

use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use tracing::debug;

use super::num::{
    DecimalExt, from_count, from_f64_or_zero, mean, sample_std_dev, to_f64_or_zero,
};

pub const DEFAULT_SIMULATIONS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarMethod {
    Historical,
    Parametric,
    MonteCarlo,
}

impl FromStr for VarMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "historical" => Ok(VarMethod::Historical),
            "parametric" => Ok(VarMethod::Parametric),
            "monte_carlo" | "montecarlo" => Ok(VarMethod::MonteCarlo),
            other => Err(format!(
                "unknown VaR method {other:?}; expected historical, parametric or monte_carlo"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VarResult {
    pub var: Decimal,
    pub cvar: Decimal,
    pub confidence: Decimal,
    pub period: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarCalculator {
    method: VarMethod,
    confidence: Decimal,
    period: usize,
    simulations: usize,
    seed: Option<u64>,
}

impl VarCalculator {
    pub fn new(method: VarMethod, confidence: Decimal, period: usize) -> Self {
        VarCalculator {
            method,
            confidence,
            period,
            simulations: DEFAULT_SIMULATIONS,
            seed: None,
        }
    }

    /// Monte Carlo sample count; zero falls back to the default.
    pub fn with_simulations(mut self, simulations: usize) -> Self {
        self.simulations = if simulations == 0 {
            DEFAULT_SIMULATIONS
        } else {
            simulations
        };
        self
    }

    /// Fixes the Monte Carlo seed. Unseeded calculators seed from the system clock.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn method(&self) -> VarMethod {
        self.method
    }

    pub fn confidence(&self) -> Decimal {
        self.confidence
    }

    pub fn simulations(&self) -> usize {
        self.simulations
    }

    pub fn calculate(&self, returns: &[Decimal]) -> VarResult {
        if returns.is_empty() {
            return self.result(Decimal::ZERO, Decimal::ZERO);
        }
        debug!(method = ?self.method, observations = returns.len(), "calculating VaR");
        match self.method {
            VarMethod::Historical => self.historical(returns),
            VarMethod::Parametric => self.parametric(returns),
            VarMethod::MonteCarlo => self.monte_carlo(returns),
        }
    }

    fn result(&self, var: Decimal, cvar: Decimal) -> VarResult {
        VarResult {
            var,
            cvar,
            confidence: self.confidence,
            period: self.period,
        }
    }

    fn historical(&self, returns: &[Decimal]) -> VarResult {
        let mut sorted = returns.to_vec();
        sorted.sort();
        let index = confidence_index(self.confidence, sorted.len());
        let tail = mean(&sorted[..=index]);
        self.result(-sorted[index], -tail)
    }

    fn parametric(&self, returns: &[Decimal]) -> VarResult {
        let m = mean(returns);
        let std_dev = sample_std_dev(returns, m);
        let z = z_score(self.confidence);

        let var = m - std_dev * z;

        let z_f = to_f64_or_zero(z);
        let alpha = to_f64_or_zero(self.confidence);
        let shortfall = from_f64_or_zero(z_f + normal_pdf(z_f) / (1.0 - alpha));
        let cvar = m - std_dev * shortfall;

        self.result(-var, -cvar)
    }

    fn monte_carlo(&self, returns: &[Decimal]) -> VarResult {
        let mean_return = mean(returns);
        let m = to_f64_or_zero(mean_return);
        let std_dev = to_f64_or_zero(sample_std_dev(returns, mean_return));

        let mut rng = StdRng::seed_from_u64(self.seed.unwrap_or_else(clock_seed));
        let mut samples: Vec<f64> = (0..self.simulations)
            .map(|_| m + std_dev * standard_normal(&mut rng))
            .collect();
        samples.sort_by(f64::total_cmp);

        let index = confidence_index(self.confidence, samples.len());
        let tail = samples[..=index].iter().sum::<f64>() / (index + 1) as f64;
        self.result(from_f64_or_zero(-samples[index]), from_f64_or_zero(-tail))
    }
}

/// `floor((1 - confidence) * n)` clamped to `[0, n - 1]`. `n` must be non-zero.
fn confidence_index(confidence: Decimal, n: usize) -> usize {
    let raw = ((Decimal::ONE - confidence) * from_count(n)).floor();
    raw.to_i64()
        .map(|i| i.clamp(0, n as i64 - 1) as usize)
        .unwrap_or(0)
}

/// One-sided z-score lookup for common confidence levels; 1.0 below 0.75.
pub fn z_score(confidence: Decimal) -> Decimal {
    match confidence {
        c if c >= dec!(0.99) => dec!(2.326),
        c if c >= dec!(0.975) => dec!(1.96),
        c if c >= dec!(0.95) => dec!(1.645),
        c if c >= dec!(0.90) => dec!(1.282),
        c if c >= dec!(0.80) => dec!(0.842),
        c if c >= dec!(0.75) => dec!(0.674),
        _ => Decimal::ONE,
    }
}

fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

/// Box–Muller transform over two uniforms.
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Simple returns `(p[i] - p[i-1]) / p[i-1]`; empty below two prices.
pub fn calculate_returns(prices: &[Decimal]) -> Vec<Decimal> {
    prices
        .windows(2)
        .map(|w| (w[1] - w[0]).div_or_zero(w[0]))
        .collect()
}

/// Natural-log returns. A non-positive price ratio yields zero for that step.
pub fn calculate_log_returns(prices: &[Decimal]) -> Vec<Decimal> {
    prices
        .windows(2)
        .map(|w| {
            let ratio = to_f64_or_zero(w[1].div_or_zero(w[0]));
            if ratio > 0.0 {
                from_f64_or_zero(ratio.ln())
            } else {
                Decimal::ZERO
            }
        })
        .collect()
}

/// Historical VaR of a return series already weighted by portfolio allocation.
/// Zero when either input is empty.
pub fn portfolio_var(returns: &[Decimal], weights: &[Decimal], confidence: Decimal) -> VarResult {
    let calculator = VarCalculator::new(VarMethod::Historical, confidence, 1);
    if weights.is_empty() {
        return calculator.calculate(&[]);
    }
    calculator.calculate(returns)
}

/// VaR over each `window + 1` price slice ending at every index from `window` on.
/// Empty when there are fewer than `window + 1` prices.
pub fn rolling_var(
    prices: &[Decimal],
    window: usize,
    confidence: Decimal,
    method: VarMethod,
) -> Vec<VarResult> {
    rolling_var_with(prices, window, &VarCalculator::new(method, confidence, window))
}

/// As [`rolling_var`], with a preconfigured calculator (seed, simulation count).
pub fn rolling_var_with(
    prices: &[Decimal],
    window: usize,
    calculator: &VarCalculator,
) -> Vec<VarResult> {
    if prices.len() < window + 1 {
        return Vec::new();
    }
    (window..prices.len())
        .map(|i| calculate_returns(&prices[i - window..=i]))
        .filter(|returns| !returns.is_empty())
        .map(|returns| calculator.calculate(&returns))
        .collect()
}

/// Largest absolute decline, with the peak seeded at the first value.
pub fn maximum_drawdown(equity_curve: &[Decimal]) -> Decimal {
    let Some(&first) = equity_curve.first() else {
        return Decimal::ZERO;
    };
    let mut peak = first;
    let mut max_dd = Decimal::ZERO;
    for &value in equity_curve {
        if value > peak {
            peak = value;
        }
        max_dd = max_dd.max(peak - value);
    }
    max_dd
}

pub fn calmar_ratio(annualized_return: Decimal, max_drawdown: Decimal) -> Decimal {
    annualized_return.div_or_zero(max_drawdown)
}

/// `(mean - target) / downside deviation`, where the deviation is the population root
/// mean square of shortfalls below `target`. Reports 100 when nothing falls below.
pub fn sortino_ratio(returns: &[Decimal], target_return: Decimal) -> Decimal {
    if returns.is_empty() {
        return Decimal::ZERO;
    }
    let m = mean(returns);
    let downside_sq: Decimal = returns
        .iter()
        .filter(|r| **r < target_return)
        .map(|r| (target_return - *r) * (target_return - *r))
        .sum();
    let downside = (downside_sq / from_count(returns.len())).sqrt_or_zero();
    if downside.is_zero() {
        return Decimal::ONE_HUNDRED;
    }
    (m - target_return) / downside
}

/// Covariance over market variance on the common prefix of both series.
/// Neutral 1 for empty input or a flat market.
pub fn beta(stock_returns: &[Decimal], market_returns: &[Decimal]) -> Decimal {
    let n = stock_returns.len().min(market_returns.len());
    if n == 0 {
        return Decimal::ONE;
    }
    let (stock, market) = (&stock_returns[..n], &market_returns[..n]);
    let (stock_mean, market_mean) = (mean(stock), mean(market));

    let mut covariance = Decimal::ZERO;
    let mut market_variance = Decimal::ZERO;
    for (s, m) in stock.iter().zip(market) {
        let market_diff = *m - market_mean;
        covariance += (*s - stock_mean) * market_diff;
        market_variance += market_diff * market_diff;
    }
    if market_variance.is_zero() {
        return Decimal::ONE;
    }
    covariance / market_variance
}

/// Pearson correlation on the common prefix of both series; 0 for empty or flat input.
pub fn correlation(series1: &[Decimal], series2: &[Decimal]) -> Decimal {
    let n = series1.len().min(series2.len());
    if n == 0 {
        return Decimal::ZERO;
    }
    let (a, b) = (&series1[..n], &series2[..n]);
    let (mean_a, mean_b) = (mean(a), mean(b));

    let mut covariance = Decimal::ZERO;
    let mut sum_sq_a = Decimal::ZERO;
    let mut sum_sq_b = Decimal::ZERO;
    for (x, y) in a.iter().zip(b) {
        let (dx, dy) = (*x - mean_a, *y - mean_b);
        covariance += dx * dy;
        sum_sq_a += dx * dx;
        sum_sq_b += dy * dy;
    }
    covariance.div_or_zero(sum_sq_a.sqrt_or_zero() * sum_sq_b.sqrt_or_zero())
}

/// Kelly fraction `W - (1 - W) / R`; zero for a non-positive win/loss ratio.
pub fn kelly_criterion(win_rate: Decimal, win_loss_ratio: Decimal) -> Decimal {
    if win_loss_ratio <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    win_rate - (Decimal::ONE - win_rate) / win_loss_ratio
}
