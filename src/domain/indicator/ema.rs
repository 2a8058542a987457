//! Exponential Moving Average with an append-only result cache.
//!
//! k = 2/(n+1), seeded with the SMA of the first n values, then
//! EMA[i] = V[i]*k + EMA[i-1]*(1-k). Indices before the seed evaluate to zero.
//!
//! The cache is owned by the instance and guarded by one `RwLock`. Reads of populated
//! indices take the read side only. Extending the cache takes the write side, so
//! concurrent callers asking for unpopulated indices serialize behind each other;
//! call [`Ema::warm_up`] before fanning out a batch evaluation.

use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;

use super::Indicator;
use crate::domain::num::{DecimalExt, from_count};

#[derive(Debug)]
pub struct Ema {
    source: Arc<dyn Indicator>,
    period: usize,
    cache: RwLock<Vec<Decimal>>,
}

impl Ema {
    pub fn new(source: Arc<dyn Indicator>, period: usize) -> Self {
        Ema {
            source,
            period,
            cache: RwLock::new(Vec::new()),
        }
    }

    pub fn smoothing(&self) -> Decimal {
        Decimal::TWO.div_or_zero(from_count(self.period + 1))
    }

    /// Populates the cache through `last_index`.
    pub fn warm_up(&self, last_index: usize) {
        self.calculate(last_index);
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn value_at(&self, index: usize, previous: Option<Decimal>) -> Decimal {
        let n = self.period;
        if n == 0 || index + 1 < n {
            return Decimal::ZERO;
        }
        if index + 1 == n {
            let sum: Decimal = (0..n).map(|i| self.source.calculate(i)).sum();
            return sum.div_or_zero(from_count(n));
        }
        let k = self.smoothing();
        let prev = previous.unwrap_or(Decimal::ZERO);
        self.source.calculate(index) * k + prev * (Decimal::ONE - k)
    }
}

impl Indicator for Ema {
    fn calculate(&self, index: usize) -> Decimal {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(v) = cache.get(index) {
                return *v;
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        while cache.len() <= index {
            let i = cache.len();
            let prev = cache.last().copied();
            let value = self.value_at(i, prev);
            cache.push(value);
        }
        cache[index]
    }
}
