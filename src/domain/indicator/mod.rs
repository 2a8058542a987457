//! Indicators consumed by strategy rules.
//!
//! An indicator is a function from bar index to a decimal. Warm-up indices, gaps and
//! out-of-range indices evaluate to zero.

pub mod ema;
pub mod parallel;
pub mod rsi;

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;

use super::num::{DecimalExt, from_count};
use super::series::PriceSeries;

pub use ema::Ema;
pub use rsi::Rsi;

pub trait Indicator: Send + Sync + fmt::Debug {
    fn calculate(&self, index: usize) -> Decimal;
}

#[derive(Debug, Clone)]
pub struct ClosePrice {
    series: Arc<PriceSeries>,
}

impl ClosePrice {
    pub fn new(series: Arc<PriceSeries>) -> Self {
        ClosePrice { series }
    }
}

impl Indicator for ClosePrice {
    fn calculate(&self, index: usize) -> Decimal {
        self.series.close(index).unwrap_or(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Constant(pub Decimal);

impl Indicator for Constant {
    fn calculate(&self, _index: usize) -> Decimal {
        self.0
    }
}

/// Simple moving average over the last `period` values, inclusive of `index`.
#[derive(Debug, Clone)]
pub struct Sma {
    source: Arc<dyn Indicator>,
    period: usize,
}

impl Sma {
    pub fn new(source: Arc<dyn Indicator>, period: usize) -> Self {
        Sma { source, period }
    }
}

impl Indicator for Sma {
    fn calculate(&self, index: usize) -> Decimal {
        if self.period == 0 || index + 1 < self.period {
            return Decimal::ZERO;
        }
        let sum: Decimal = (index + 1 - self.period..=index)
            .map(|i| self.source.calculate(i))
            .sum();
        sum.div_or_zero(from_count(self.period))
    }
}
