//! Accounting invariants over randomly generated price paths and signal schedules.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use common::series_from_closes;
use proptest::prelude::*;
use rust_decimal::Decimal;
use tradesim::domain::analyzer::{AnalysisValue, AnalyzerRegistry};
use tradesim::domain::backtest::{BacktestConfig, Backtester};
use tradesim::domain::metrics::max_drawdown;
use tradesim::domain::record::TradingRecord;
use tradesim::domain::strategy::Strategy as TradingStrategy;

/// One position at a time: enters only while the ledger is flat.
struct SingleShot {
    entries: BTreeSet<usize>,
    exits: BTreeSet<usize>,
}

impl TradingStrategy for SingleShot {
    fn should_enter(&self, index: usize, record: &TradingRecord) -> bool {
        record.current_position().is_new() && self.entries.contains(&index)
    }

    fn should_exit(&self, index: usize, record: &TradingRecord) -> bool {
        record.current_position().is_open() && self.exits.contains(&index)
    }
}

fn equity_path() -> impl Strategy<Value = (Vec<u32>, u32)> {
    (prop::collection::vec(1u32..10_000, 1..80), 1u32..10_000)
}

fn scenario() -> impl Strategy<Value = (Vec<u32>, BTreeSet<usize>, BTreeSet<usize>, u32)> {
    (2usize..60).prop_flat_map(|len| {
        (
            prop::collection::vec(1u32..1_000, len),
            prop::collection::btree_set(0..len, 0..=len / 2),
            prop::collection::btree_set(0..len, 0..=len / 2),
            1u32..20,
        )
    })
}

proptest! {
    #[test]
    fn equity_reconciles_with_trades((closes, entries, exits, size) in scenario()) {
        let closes: Vec<Decimal> = closes.into_iter().map(Decimal::from).collect();
        let series = series_from_closes(&closes);
        let config = BacktestConfig {
            initial_capital: Decimal::from(10_000_000),
            position_size: Decimal::from(size),
            ..BacktestConfig::default()
        };
        let strategy = Arc::new(SingleShot { entries, exits });
        let result = Backtester::new(series, strategy)
            .with_analyzers(AnalyzerRegistry::with_builtins(Decimal::ZERO))
            .run(&config);

        let trade_sum: Decimal = result.trades.iter().map(|t| t.profit).sum();
        prop_assert_eq!(result.final_equity - result.initial_capital, result.net_profit);
        prop_assert_eq!(result.net_profit, trade_sum);
        prop_assert_eq!(result.total_profit, trade_sum);
        prop_assert_eq!(result.equity_curve.len(), closes.len());
        prop_assert!(result.winning_trades + result.losing_trades <= result.total_trades);
        prop_assert!(result.max_drawdown >= Decimal::ZERO);
        prop_assert!(result.max_drawdown_percent >= Decimal::ZERO);
        prop_assert!(result.max_drawdown_percent <= Decimal::ONE);

        for trade in &result.trades {
            prop_assert!(trade.exit_index >= trade.entry_index);
            prop_assert_eq!(trade.duration, trade.exit_index - trade.entry_index);
        }

        if let AnalysisValue::Drawdown(stats) = &result.analysis["Drawdown"] {
            prop_assert!(stats.max_drawdown >= Decimal::ZERO);
        }
    }

    #[test]
    fn drawdown_over_growing_history((values, capital) in equity_path()) {
        let curve: Vec<Decimal> = values.into_iter().map(Decimal::from).collect();
        for seed in [Decimal::ZERO, curve[0], Decimal::from(capital)] {
            let mut peak = seed;
            let (mut prev_dd, mut prev_pct) = (Decimal::ZERO, Decimal::ZERO);
            for k in 1..=curve.len() {
                let new_peak = peak.max(curve[k - 1]);
                prop_assert!(new_peak >= peak);
                peak = new_peak;

                let (dd, pct) = max_drawdown(curve[..k].iter().copied(), seed);
                prop_assert!(dd >= prev_dd, "seed {} prefix {}", seed, k);
                prop_assert!(pct >= Decimal::ZERO && pct <= Decimal::ONE);
                if dd > prev_dd {
                    // the new maximum is the latest point, measured against the running peak
                    prop_assert_eq!(dd, peak - curve[k - 1]);
                    prop_assert_eq!(pct, dd / peak);
                } else {
                    prop_assert_eq!(pct, prev_pct);
                }
                prev_dd = dd;
                prev_pct = pct;
            }
        }
    }
}
