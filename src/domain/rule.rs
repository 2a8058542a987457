//! Composable entry/exit rules.
//!
//! Comparison variants evaluate indicator pairs at a bar index. Cross variants need
//! `index >= 1` and return `false` at index 0. `PositionNew` and `PositionOpen` read
//! the trading ledger, which is how a strategy learns what the simulation did.

use std::sync::Arc;

use super::indicator::Indicator;
use super::record::TradingRecord;

#[derive(Debug, Clone)]
pub enum Rule {
    Above {
        left: Arc<dyn Indicator>,
        right: Arc<dyn Indicator>,
    },
    Below {
        left: Arc<dyn Indicator>,
        right: Arc<dyn Indicator>,
    },
    CrossAbove {
        left: Arc<dyn Indicator>,
        right: Arc<dyn Indicator>,
    },
    CrossBelow {
        left: Arc<dyn Indicator>,
        right: Arc<dyn Indicator>,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
    PositionNew,
    PositionOpen,
}

impl Rule {
    pub fn above(left: Arc<dyn Indicator>, right: Arc<dyn Indicator>) -> Self {
        Rule::Above { left, right }
    }

    pub fn below(left: Arc<dyn Indicator>, right: Arc<dyn Indicator>) -> Self {
        Rule::Below { left, right }
    }

    pub fn cross_above(left: Arc<dyn Indicator>, right: Arc<dyn Indicator>) -> Self {
        Rule::CrossAbove { left, right }
    }

    pub fn cross_below(left: Arc<dyn Indicator>, right: Arc<dyn Indicator>) -> Self {
        Rule::CrossBelow { left, right }
    }

    pub fn is_satisfied(&self, index: usize, record: &TradingRecord) -> bool {
        match self {
            Rule::Above { left, right } => left.calculate(index) > right.calculate(index),
            Rule::Below { left, right } => left.calculate(index) < right.calculate(index),
            Rule::CrossAbove { left, right } => {
                if index == 0 {
                    return false;
                }
                let (curr_l, curr_r) = (left.calculate(index), right.calculate(index));
                let (prev_l, prev_r) = (left.calculate(index - 1), right.calculate(index - 1));
                curr_l > curr_r && prev_l <= prev_r
            }
            Rule::CrossBelow { left, right } => {
                if index == 0 {
                    return false;
                }
                let (curr_l, curr_r) = (left.calculate(index), right.calculate(index));
                let (prev_l, prev_r) = (left.calculate(index - 1), right.calculate(index - 1));
                curr_l < curr_r && prev_l >= prev_r
            }
            Rule::And(rules) => rules.iter().all(|r| r.is_satisfied(index, record)),
            Rule::Or(rules) => rules.iter().any(|r| r.is_satisfied(index, record)),
            Rule::Not(rule) => !rule.is_satisfied(index, record),
            Rule::PositionNew => record.current_position().is_new(),
            Rule::PositionOpen => record.current_position().is_open(),
        }
    }
}
