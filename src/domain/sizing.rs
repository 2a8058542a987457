//! Position sizing: how many units to buy given capital, price and risk inputs.
//!
//! Every sizer returns a quantity, never a notional. A zero result means "do not trade".

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::num::DecimalExt;
use super::risk::kelly_criterion;

const KELLY_CAP: Decimal = dec!(0.5);
const VOLATILITY_RISK_FRACTION: Decimal = dec!(0.01);
const VOLATILITY_MAX_FRACTION: Decimal = dec!(0.2);
const RISK_BASED_MAX_FRACTION: Decimal = dec!(0.25);
const CANONICAL_ATR_MULTIPLIER: Decimal = dec!(2);
const CANONICAL_FRACTION: Decimal = dec!(0.02);

/// Inputs shared by all sizers. Fields a sizer does not use are ignored; zero means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizingInput {
    pub capital: Decimal,
    pub price: Decimal,
    /// Absolute stop price, zero if none.
    pub stop_loss: Decimal,
    /// Fraction of capital put at risk per trade.
    pub risk_per_trade: Decimal,
    pub atr: Decimal,
    pub volatility: Decimal,
    pub win_rate: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
}

pub trait PositionSizer: Send + Sync {
    fn size(&self, input: &SizingInput) -> Decimal;
}

/// Spends a fixed fraction of capital.
#[derive(Debug, Clone, Copy)]
pub struct FixedFractionalSizer {
    pub fraction: Decimal,
}

impl PositionSizer for FixedFractionalSizer {
    fn size(&self, input: &SizingInput) -> Decimal {
        if input.capital.is_zero() {
            return Decimal::ZERO;
        }
        (input.capital * self.fraction).div_or_zero(input.price)
    }
}

/// Always the same quantity.
#[derive(Debug, Clone, Copy)]
pub struct FixedAmountSizer {
    pub amount: Decimal,
}

impl PositionSizer for FixedAmountSizer {
    fn size(&self, _input: &SizingInput) -> Decimal {
        self.amount
    }
}

/// Kelly fraction of capital, floored at zero and capped at one half.
#[derive(Debug, Clone, Copy, Default)]
pub struct KellySizer;

impl PositionSizer for KellySizer {
    fn size(&self, input: &SizingInput) -> Decimal {
        if input.win_rate.is_zero() || input.avg_loss.is_zero() {
            return Decimal::ZERO;
        }
        let fraction = kelly_criterion(input.win_rate, input.avg_win.div_or_zero(input.avg_loss));
        if fraction.is_sign_negative() {
            return Decimal::ZERO;
        }
        (fraction.min(KELLY_CAP) * input.capital).div_or_zero(input.price)
    }
}

/// Risks 1% of capital against a stop, falling back to `price - atr * multiplier`
/// when no explicit stop is given. Capped at 20% of capital.
#[derive(Debug, Clone, Copy)]
pub struct VolatilitySizer {
    pub multiplier: Decimal,
}

impl PositionSizer for VolatilitySizer {
    fn size(&self, input: &SizingInput) -> Decimal {
        if input.volatility.is_zero() || input.price.is_zero() {
            return Decimal::ZERO;
        }
        let stop = if input.stop_loss.is_zero() {
            input.price - input.atr * self.multiplier
        } else {
            input.stop_loss
        };
        capped_risk_size(
            input,
            input.capital * VOLATILITY_RISK_FRACTION,
            stop,
            VOLATILITY_MAX_FRACTION,
        )
    }
}

/// Risks `risk_per_trade` of capital against an explicit stop. Capped at 25% of capital.
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskBasedSizer;

impl PositionSizer for RiskBasedSizer {
    fn size(&self, input: &SizingInput) -> Decimal {
        if input.risk_per_trade.is_zero() || input.stop_loss.is_zero() || input.price.is_zero() {
            return Decimal::ZERO;
        }
        capped_risk_size(
            input,
            input.capital * input.risk_per_trade,
            input.stop_loss,
            RISK_BASED_MAX_FRACTION,
        )
    }
}

/// Volatility sizing when ATR and volatility are known, then risk-based when a
/// per-trade risk is set, then 2% fixed fractional.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalSizer;

impl PositionSizer for CanonicalSizer {
    fn size(&self, input: &SizingInput) -> Decimal {
        if !input.atr.is_zero() && !input.volatility.is_zero() {
            let size = VolatilitySizer {
                multiplier: CANONICAL_ATR_MULTIPLIER,
            }
            .size(input);
            if !size.is_zero() {
                return size;
            }
        }
        if !input.risk_per_trade.is_zero() {
            let size = RiskBasedSizer.size(input);
            if !size.is_zero() {
                return size;
            }
        }
        FixedFractionalSizer {
            fraction: CANONICAL_FRACTION,
        }
        .size(input)
    }
}

fn capped_risk_size(input: &SizingInput, risk_amount: Decimal, stop: Decimal, max_fraction: Decimal) -> Decimal {
    let per_unit = input.price - stop;
    if per_unit <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let cap = (input.capital * max_fraction).div_or_zero(input.price);
    risk_amount.div_or_zero(per_unit).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> SizingInput {
        SizingInput {
            capital: dec!(10000),
            price: dec!(100),
            ..SizingInput::default()
        }
    }

    #[test]
    fn fixed_fractional_spends_fraction_of_capital() {
        let sizer = FixedFractionalSizer { fraction: dec!(0.1) };
        assert_eq!(sizer.size(&input()), dec!(10));
        let broke = SizingInput {
            capital: Decimal::ZERO,
            ..input()
        };
        assert_eq!(sizer.size(&broke), Decimal::ZERO);
        let no_price = SizingInput {
            price: Decimal::ZERO,
            ..input()
        };
        assert_eq!(sizer.size(&no_price), Decimal::ZERO);
    }

    #[test]
    fn fixed_amount_ignores_inputs() {
        let sizer = FixedAmountSizer { amount: dec!(7) };
        assert_eq!(sizer.size(&input()), dec!(7));
        assert_eq!(sizer.size(&SizingInput::default()), dec!(7));
    }

    #[test]
    fn kelly_uses_edge_and_caps_at_half() {
        // W = 0.6, R = 2: f = 0.6 - 0.4 / 2 = 0.4
        let edge = SizingInput {
            win_rate: dec!(0.6),
            avg_win: dec!(200),
            avg_loss: dec!(100),
            ..input()
        };
        assert_eq!(KellySizer.size(&edge), dec!(40));

        // W = 0.9, R = 9: f = 0.9 - 0.1 / 9 > 0.5
        let huge = SizingInput {
            win_rate: dec!(0.9),
            avg_win: dec!(900),
            avg_loss: dec!(100),
            ..input()
        };
        assert_eq!(KellySizer.size(&huge), dec!(50));
    }

    #[test]
    fn kelly_without_edge_is_flat() {
        let losing = SizingInput {
            win_rate: dec!(0.3),
            avg_win: dec!(100),
            avg_loss: dec!(100),
            ..input()
        };
        assert_eq!(KellySizer.size(&losing), Decimal::ZERO);
        let no_losses = SizingInput {
            win_rate: dec!(0.6),
            avg_win: dec!(100),
            ..input()
        };
        assert_eq!(KellySizer.size(&no_losses), Decimal::ZERO);
        assert_eq!(KellySizer.size(&input()), Decimal::ZERO);
    }

    #[test]
    fn volatility_sizer_risks_one_percent() {
        let sizer = VolatilitySizer { multiplier: dec!(2) };
        // risk 100 over 5 per unit = 20, under the 20-unit cap
        let with_stop = SizingInput {
            stop_loss: dec!(95),
            volatility: dec!(0.2),
            ..input()
        };
        assert_eq!(sizer.size(&with_stop), dec!(20));

        // atr 1 * 2 = stop at 98: 100 / 2 = 50, capped at 20
        let from_atr = SizingInput {
            atr: dec!(1),
            volatility: dec!(0.2),
            ..input()
        };
        assert_eq!(sizer.size(&from_atr), dec!(20));

        let wide = SizingInput {
            atr: dec!(10),
            volatility: dec!(0.2),
            ..input()
        };
        assert_eq!(sizer.size(&wide), dec!(5));
    }

    #[test]
    fn volatility_sizer_needs_volatility_and_a_stop_below_price() {
        let sizer = VolatilitySizer { multiplier: dec!(2) };
        let no_vol = SizingInput {
            stop_loss: dec!(95),
            ..input()
        };
        assert_eq!(sizer.size(&no_vol), Decimal::ZERO);
        let no_stop = SizingInput {
            volatility: dec!(0.2),
            ..input()
        };
        assert_eq!(sizer.size(&no_stop), Decimal::ZERO);
        let stop_above = SizingInput {
            stop_loss: dec!(105),
            volatility: dec!(0.2),
            ..input()
        };
        assert_eq!(sizer.size(&stop_above), Decimal::ZERO);
    }

    #[test]
    fn risk_based_sizer_caps_at_quarter_of_capital() {
        let tight = SizingInput {
            stop_loss: dec!(90),
            risk_per_trade: dec!(0.02),
            ..input()
        };
        // 200 risk over 10 per unit
        assert_eq!(RiskBasedSizer.size(&tight), dec!(20));

        let very_tight = SizingInput {
            stop_loss: dec!(99.5),
            ..tight
        };
        assert_eq!(RiskBasedSizer.size(&very_tight), dec!(25));

        let no_stop = SizingInput {
            stop_loss: Decimal::ZERO,
            ..tight
        };
        assert_eq!(RiskBasedSizer.size(&no_stop), Decimal::ZERO);
    }

    #[test]
    fn canonical_falls_through_in_order() {
        let volatile = SizingInput {
            atr: dec!(10),
            volatility: dec!(0.2),
            stop_loss: dec!(90),
            risk_per_trade: dec!(0.02),
            ..input()
        };
        assert_eq!(CanonicalSizer.size(&volatile), dec!(10));

        let risk_only = SizingInput {
            atr: Decimal::ZERO,
            ..volatile
        };
        assert_eq!(CanonicalSizer.size(&risk_only), dec!(20));

        assert_eq!(CanonicalSizer.size(&input()), dec!(2));
    }
}
