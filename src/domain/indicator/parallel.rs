//! Parallel evaluation of indicator batches.
//!
//! Both helpers fan out on the rayon pool and return once every task has joined.
//! Stateless indicators can be batched freely. Cached recursive indicators such as
//! [`Ema`](super::Ema) must be warmed up through the highest requested index first,
//! otherwise the tasks serialize on the cache's write lock.

use std::sync::Arc;

use rayon::prelude::*;
use rust_decimal::Decimal;

use super::Indicator;

/// Evaluates several independent indicators at one bar index. Output order follows input order.
pub fn multi_calculate(index: usize, indicators: &[Arc<dyn Indicator>]) -> Vec<Decimal> {
    indicators
        .par_iter()
        .map(|indicator| indicator.calculate(index))
        .collect()
}

/// Evaluates one indicator across many indices. Output order follows `indices`.
pub fn batch_calculate(indicator: &dyn Indicator, indices: &[usize]) -> Vec<Decimal> {
    indices
        .par_iter()
        .map(|&index| indicator.calculate(index))
        .collect()
}
