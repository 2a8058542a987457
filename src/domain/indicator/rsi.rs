//! Relative Strength Index with Wilder smoothing.
//!
//! Seed: average gain and loss over the first `period` changes.
//! Then avg = (prev_avg*(n-1) + current)/n. RSI = 100 - 100/(1 + avg_gain/avg_loss),
//! or 100 when there are no losses in the window.
//!
//! Smoothed averages are cached append-only behind one `RwLock`, the same way
//! [`super::Ema`] caches its values. Entry `k` holds the averages at index `period + k`.

use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::Indicator;
use crate::domain::num::{DecimalExt, from_count};

#[derive(Debug)]
pub struct Rsi {
    source: Arc<dyn Indicator>,
    period: usize,
    cache: RwLock<Vec<(Decimal, Decimal)>>,
}

impl Rsi {
    pub fn new(source: Arc<dyn Indicator>, period: usize) -> Self {
        Rsi {
            source,
            period,
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Populates the cache through `last_index`.
    pub fn warm_up(&self, last_index: usize) {
        self.calculate(last_index);
    }

    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn change(&self, i: usize) -> (Decimal, Decimal) {
        let diff = self.source.calculate(i) - self.source.calculate(i - 1);
        if diff > Decimal::ZERO {
            (diff, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -diff)
        }
    }

    fn seed(&self) -> (Decimal, Decimal) {
        let period = from_count(self.period);
        let (gain, loss) = (1..=self.period)
            .map(|i| self.change(i))
            .fold((Decimal::ZERO, Decimal::ZERO), |(g, l), (cg, cl)| {
                (g + cg, l + cl)
            });
        (gain.div_or_zero(period), loss.div_or_zero(period))
    }

    fn smooth(&self, index: usize, (avg_gain, avg_loss): (Decimal, Decimal)) -> (Decimal, Decimal) {
        let period = from_count(self.period);
        let (gain, loss) = self.change(index);
        (
            (avg_gain * (period - Decimal::ONE) + gain).div_or_zero(period),
            (avg_loss * (period - Decimal::ONE) + loss).div_or_zero(period),
        )
    }

    fn averages(&self, index: usize) -> (Decimal, Decimal) {
        let slot = index - self.period;
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(v) = cache.get(slot) {
                return *v;
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        while cache.len() <= slot {
            let next = match cache.last() {
                Some(&prev) => self.smooth(self.period + cache.len(), prev),
                None => self.seed(),
            };
            cache.push(next);
        }
        cache[slot]
    }
}

impl Indicator for Rsi {
    fn calculate(&self, index: usize) -> Decimal {
        if self.period == 0 || index < self.period {
            return Decimal::ZERO;
        }

        let (avg_gain, avg_loss) = self.averages(index);
        if avg_loss.is_zero() {
            return dec!(100);
        }
        let rs = avg_gain.div_or_zero(avg_loss);
        dec!(100) - dec!(100).div_or_zero(Decimal::ONE + rs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::ClosePrice;
    use crate::domain::indicator::test_support::series_from_closes;

    fn rsi_over(closes: &[Decimal], period: usize) -> Rsi {
        Rsi::new(Arc::new(ClosePrice::new(series_from_closes(closes))), period)
    }

    #[test]
    fn warmup_is_zero() {
        let rsi = rsi_over(&[dec!(1), dec!(2), dec!(3)], 3);
        assert_eq!(rsi.calculate(2), Decimal::ZERO);
    }

    #[test]
    fn only_gains_is_100() {
        let rsi = rsi_over(&[dec!(1), dec!(2), dec!(3), dec!(4)], 3);
        assert_eq!(rsi.calculate(3), dec!(100));
    }

    #[test]
    fn balanced_moves_is_50() {
        // changes: +2, -2 → avg gain 1, avg loss 1
        let rsi = rsi_over(&[dec!(10), dec!(12), dec!(10)], 2);
        assert_eq!(rsi.calculate(2), dec!(50));
    }

    #[test]
    fn wilder_smoothing_step() {
        // seed over +2, -2 (n=2): gain 1, loss 1; next change -2:
        // gain = (1*1 + 0)/2 = 0.5, loss = (1*1 + 2)/2 = 1.5 → rs = 1/3 → rsi = 25
        let rsi = rsi_over(&[dec!(10), dec!(12), dec!(10), dec!(8)], 2);
        assert_eq!(rsi.calculate(3), dec!(25));
    }

    #[test]
    fn cache_matches_fresh_evaluation_in_any_order() {
        let closes: Vec<Decimal> = [44, 46, 45, 47, 49, 48, 46, 45, 47, 50, 52, 51, 49, 53]
            .into_iter()
            .map(Decimal::from)
            .collect();
        let rsi = rsi_over(&closes, 3);
        assert_eq!(rsi.cached_len(), 0);
        rsi.calculate(2);
        assert_eq!(rsi.cached_len(), 0);

        let late = rsi.calculate(12);
        assert_eq!(rsi.cached_len(), 10);
        let early = rsi.calculate(5);
        assert_eq!(rsi.cached_len(), 10);
        rsi.warm_up(13);
        assert_eq!(rsi.cached_len(), 11);

        assert_eq!(late, rsi_over(&closes, 3).calculate(12));
        assert_eq!(early, rsi_over(&closes, 3).calculate(5));
        for i in 0..closes.len() {
            assert_eq!(rsi.calculate(i), rsi_over(&closes, 3).calculate(i), "bar {i}");
        }
    }

    #[test]
    fn only_losses_is_0() {
        let rsi = rsi_over(&[dec!(5), dec!(4), dec!(3)], 2);
        assert_eq!(rsi.calculate(2), Decimal::ZERO);
    }
}
