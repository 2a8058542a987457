//! Append-only price series shared between one writer and many readers.
//!
//! Slots are `Option<OhlcvBar>` so a feed can record a missing bar without breaking
//! the index alignment the strategy and the simulation loop rely on.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use rust_decimal::Decimal;
use tracing::warn;

use super::error::TradesimError;
use super::ohlcv::OhlcvBar;

#[derive(Debug, Default)]
pub struct PriceSeries {
    bars: RwLock<Vec<Option<OhlcvBar>>>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a series from bars already known to be ordered; out-of-order bars are dropped.
    pub fn from_bars(bars: impl IntoIterator<Item = OhlcvBar>) -> Self {
        let series = Self::new();
        for bar in bars {
            series.add_bar(bar);
        }
        series
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Option<OhlcvBar>>> {
        self.bars.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Option<OhlcvBar>>> {
        self.bars.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends `bar` if its period starts at or after the last bar's period end.
    /// Returns whether the bar was accepted.
    pub fn add_bar(&self, bar: OhlcvBar) -> bool {
        match self.try_add_bar(bar) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "rejected bar");
                false
            }
        }
    }

    pub fn try_add_bar(&self, bar: OhlcvBar) -> Result<(), TradesimError> {
        let mut bars = self.write();
        if let Some(last) = bars.iter().rev().flatten().next() {
            if !bar.period.follows(&last.period) {
                return Err(TradesimError::OutOfOrderBar {
                    start: bar.period.start.to_string(),
                    last_end: last.period.end.to_string(),
                });
            }
        }
        bars.push(Some(bar));
        Ok(())
    }

    /// Appends an empty slot for a bar the feed did not deliver.
    pub fn add_gap(&self) {
        self.write().push(None);
    }

    pub fn get(&self, index: usize) -> Option<OhlcvBar> {
        self.read().get(index).cloned().flatten()
    }

    pub fn close(&self, index: usize) -> Option<Decimal> {
        self.read()
            .get(index)
            .and_then(|slot| slot.as_ref().map(|b| b.close))
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.len().checked_sub(1)
    }

    /// The final slot, which is `None` if it is a gap.
    pub fn last_bar(&self) -> Option<OhlcvBar> {
        self.read().last().cloned().flatten()
    }

    /// Close prices of every present bar, gaps skipped.
    pub fn close_prices(&self) -> Vec<Decimal> {
        self.read().iter().flatten().map(|b| b.close).collect()
    }
}
