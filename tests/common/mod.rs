#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tradesim::domain::backtest::BacktestConfig;
use tradesim::domain::ohlcv::{OhlcvBar, TimePeriod};
use tradesim::domain::record::TradingRecord;
use tradesim::domain::series::PriceSeries;
use tradesim::domain::strategy::Strategy;

/// Enters and exits on fixed bar indices, ignoring the ledger.
pub struct ScriptedStrategy {
    pub entries: BTreeSet<usize>,
    pub exits: BTreeSet<usize>,
}

impl Strategy for ScriptedStrategy {
    fn should_enter(&self, index: usize, _record: &TradingRecord) -> bool {
        self.entries.contains(&index)
    }

    fn should_exit(&self, index: usize, _record: &TradingRecord) -> bool {
        self.exits.contains(&index)
    }
}

pub fn scripted(entries: &[usize], exits: &[usize]) -> Arc<dyn Strategy> {
    Arc::new(ScriptedStrategy {
        entries: entries.iter().copied().collect(),
        exits: exits.iter().copied().collect(),
    })
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn make_bar(day: i64, close: Decimal) -> OhlcvBar {
    let start = start_time() + Duration::days(day);
    OhlcvBar {
        period: TimePeriod::new(start, start + Duration::days(1)),
        open: close,
        high: close + Decimal::ONE,
        low: close - Decimal::ONE,
        close,
        volume: Decimal::ONE_THOUSAND,
    }
}

pub fn series_from_closes(closes: &[Decimal]) -> Arc<PriceSeries> {
    Arc::new(PriceSeries::from_bars(
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| make_bar(i as i64, close)),
    ))
}

/// Slow sine-like oscillation around `base`, enough to trigger crossovers.
pub fn oscillating_closes(count: usize, base: Decimal) -> Vec<Decimal> {
    (0..count)
        .map(|i| {
            let phase = (i % 20) as i64;
            let offset = if phase < 10 { phase } else { 20 - phase };
            base + Decimal::from(offset)
        })
        .collect()
}

pub fn config_with_capital(initial_capital: Decimal) -> BacktestConfig {
    BacktestConfig {
        initial_capital,
        ..BacktestConfig::default()
    }
}
