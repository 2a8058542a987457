//! The two-predicate strategy contract and its rule-based implementation.

use super::record::TradingRecord;
use super::rule::Rule;

/// Entry/exit decisions consumed by the simulation loops.
///
/// Implementations must be shareable across threads: the multi-asset runner may hand
/// one instance to several concurrent runs.
pub trait Strategy: Send + Sync {
    fn should_enter(&self, index: usize, record: &TradingRecord) -> bool;
    fn should_exit(&self, index: usize, record: &TradingRecord) -> bool;
}

#[derive(Debug, Clone)]
pub struct RuleStrategy {
    pub entry: Rule,
    pub exit: Rule,
    /// Bars at or below this index never produce an entry.
    pub unstable_period: usize,
}

impl RuleStrategy {
    pub fn new(entry: Rule, exit: Rule) -> Self {
        RuleStrategy {
            entry,
            exit,
            unstable_period: 0,
        }
    }

    pub fn with_unstable_period(mut self, bars: usize) -> Self {
        self.unstable_period = bars;
        self
    }

    pub fn is_unstable_at(&self, index: usize) -> bool {
        index <= self.unstable_period
    }
}

impl Strategy for RuleStrategy {
    fn should_enter(&self, index: usize, record: &TradingRecord) -> bool {
        !self.is_unstable_at(index)
            && record.current_position().is_new()
            && self.entry.is_satisfied(index, record)
    }

    fn should_exit(&self, index: usize, record: &TradingRecord) -> bool {
        record.current_position().is_open() && self.exit.is_satisfied(index, record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::series_from_closes;
    use crate::domain::indicator::{ClosePrice, Constant, Indicator};
    use crate::domain::record::OrderSide;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn threshold_strategy() -> RuleStrategy {
        let close: Arc<dyn Indicator> = Arc::new(ClosePrice::new(series_from_closes(&[
            dec!(110),
            dec!(110),
            dec!(90),
        ])));
        let level: Arc<dyn Indicator> = Arc::new(Constant(dec!(100)));
        RuleStrategy::new(
            Rule::above(close.clone(), level.clone()),
            Rule::below(close, level),
        )
    }

    #[test]
    fn unstable_period_blocks_entry() {
        let strategy = threshold_strategy();
        let record = TradingRecord::new();
        assert!(!strategy.should_enter(0, &record));
        assert!(strategy.should_enter(1, &record));

        let strategy = threshold_strategy().with_unstable_period(1);
        assert!(!strategy.should_enter(1, &record));
    }

    #[test]
    fn entry_requires_flat_ledger() {
        let strategy = threshold_strategy();
        let mut record = TradingRecord::new();
        record.operate(OrderSide::Buy, 1, dec!(110), dec!(1));
        assert!(!strategy.should_enter(1, &record));
    }

    #[test]
    fn exit_requires_open_ledger() {
        let strategy = threshold_strategy();
        let mut record = TradingRecord::new();
        assert!(!strategy.should_exit(2, &record));
        record.operate(OrderSide::Buy, 1, dec!(110), dec!(1));
        assert!(strategy.should_exit(2, &record));
        assert!(!strategy.should_exit(1, &record));
    }
}
