//! Open positions and the closed trades they turn into.

use rust_decimal::Decimal;

use super::num::DecimalExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_index: usize,
    pub entry_price: Decimal,
    pub direction: Direction,
    pub quantity: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
}

impl Position {
    pub fn long(entry_index: usize, entry_price: Decimal, quantity: Decimal) -> Self {
        Position {
            entry_index,
            entry_price,
            direction: Direction::Long,
            quantity,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn short(entry_index: usize, entry_price: Decimal, quantity: Decimal) -> Self {
        Position {
            direction: Direction::Short,
            ..Position::long(entry_index, entry_price, quantity)
        }
    }

    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    pub fn should_stop_loss(&self, price: Decimal) -> bool {
        let Some(stop) = self.stop_loss else {
            return false;
        };
        match self.direction {
            Direction::Long => price <= stop,
            Direction::Short => price >= stop,
        }
    }

    pub fn should_take_profit(&self, price: Decimal) -> bool {
        let Some(target) = self.take_profit else {
            return false;
        };
        match self.direction {
            Direction::Long => price >= target,
            Direction::Short => price <= target,
        }
    }

    pub fn exit_triggered(&self, price: Decimal) -> bool {
        self.should_stop_loss(price) || self.should_take_profit(price)
    }

    /// Realized profit if closed at `exit_price`.
    pub fn profit_at(&self, exit_price: Decimal) -> Decimal {
        match self.direction {
            Direction::Long => (exit_price - self.entry_price) * self.quantity,
            Direction::Short => (self.entry_price - exit_price) * self.quantity,
        }
    }

    pub fn cost_basis(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    /// Consumes the position into its closed trade.
    pub fn close(self, exit_index: usize, exit_price: Decimal) -> Trade {
        let profit = self.profit_at(exit_price);
        Trade {
            entry_index: self.entry_index,
            entry_price: self.entry_price,
            exit_index,
            exit_price,
            direction: self.direction,
            quantity: self.quantity,
            profit,
            profit_percent: profit.div_or_zero(self.cost_basis()),
            duration: exit_index.saturating_sub(self.entry_index),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_index: usize,
    pub entry_price: Decimal,
    pub exit_index: usize,
    pub exit_price: Decimal,
    pub direction: Direction,
    pub quantity: Decimal,
    pub profit: Decimal,
    /// Profit as a fraction of cost basis.
    pub profit_percent: Decimal,
    /// Bars held.
    pub duration: usize,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.profit > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_long_position() -> Position {
        Position {
            stop_loss: Some(dec!(45)),
            take_profit: Some(dec!(60)),
            ..Position::long(3, dec!(50), dec!(100))
        }
    }

    fn sample_short_position() -> Position {
        Position {
            stop_loss: Some(dec!(110)),
            take_profit: Some(dec!(80)),
            ..Position::short(3, dec!(100), dec!(100))
        }
    }

    #[test]
    fn direction_helpers() {
        assert!(sample_long_position().is_long());
        assert!(sample_short_position().is_short());
    }

    #[test]
    fn stop_loss_long_triggered() {
        let pos = sample_long_position();
        assert!(pos.should_stop_loss(dec!(44)));
        assert!(pos.should_stop_loss(dec!(45)));
        assert!(!pos.should_stop_loss(dec!(46)));
    }

    #[test]
    fn stop_loss_short_triggered() {
        let pos = sample_short_position();
        assert!(pos.should_stop_loss(dec!(111)));
        assert!(pos.should_stop_loss(dec!(110)));
        assert!(!pos.should_stop_loss(dec!(109)));
    }

    #[test]
    fn stop_loss_unset() {
        let mut pos = sample_long_position();
        pos.stop_loss = None;
        assert!(!pos.should_stop_loss(dec!(0)));
        assert!(!pos.should_stop_loss(dec!(1000000)));
    }

    #[test]
    fn take_profit_long_triggered() {
        let pos = sample_long_position();
        assert!(pos.should_take_profit(dec!(61)));
        assert!(pos.should_take_profit(dec!(60)));
        assert!(!pos.should_take_profit(dec!(59)));
    }

    #[test]
    fn take_profit_short_triggered() {
        let pos = sample_short_position();
        assert!(pos.should_take_profit(dec!(79)));
        assert!(pos.should_take_profit(dec!(80)));
        assert!(!pos.should_take_profit(dec!(81)));
    }

    #[test]
    fn exit_triggered_combines_both() {
        let pos = sample_long_position();
        assert!(pos.exit_triggered(dec!(40)));
        assert!(pos.exit_triggered(dec!(65)));
        assert!(!pos.exit_triggered(dec!(50)));
    }

    #[test]
    fn close_long_with_profit() {
        let trade = sample_long_position().close(8, dec!(55));
        assert_eq!(trade.profit, dec!(500));
        assert_eq!(trade.profit_percent, dec!(0.1));
        assert_eq!(trade.duration, 5);
        assert!(trade.is_win());
    }

    #[test]
    fn close_short_flips_sign() {
        let trade = sample_short_position().close(4, dec!(110));
        assert_eq!(trade.profit, dec!(-1000));
        assert_eq!(trade.profit_percent, dec!(-0.1));
        assert!(!trade.is_win());
    }

    #[test]
    fn close_with_zero_cost_basis() {
        let trade = Position::long(0, dec!(0), dec!(10)).close(1, dec!(5));
        assert_eq!(trade.profit, dec!(50));
        assert_eq!(trade.profit_percent, Decimal::ZERO);
    }
}
