//! Builds run configuration from a [`ConfigPort`], validating every field on the way.
//!
//! Absent keys keep their defaults. Present but malformed or out-of-range values are
//! `ConfigInvalid`.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::TradesimError;
use crate::domain::risk::{VarCalculator, VarMethod};
use crate::ports::config_port::ConfigPort;

const BACKTEST: &str = "backtest";
const RISK: &str = "risk";
const METRICS: &str = "metrics";

pub const DEFAULT_RISK_FREE_RATE: Decimal = dec!(0.02);
pub const DEFAULT_CONFIDENCE: Decimal = dec!(0.95);
pub const DEFAULT_VAR_WINDOW: usize = 20;

fn invalid(section: &str, key: &str, reason: &str) -> TradesimError {
    TradesimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn decimal_or(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Decimal,
) -> Result<Decimal, TradesimError> {
    Ok(config.get_decimal(section, key)?.unwrap_or(default))
}

fn non_negative(section: &str, key: &str, value: Decimal) -> Result<Decimal, TradesimError> {
    if value < Decimal::ZERO {
        return Err(invalid(section, key, &format!("{key} must be non-negative")));
    }
    Ok(value)
}

/// Optional fraction in `(0, 1)`; zero is treated as unset.
fn optional_fraction(
    config: &dyn ConfigPort,
    key: &str,
) -> Result<Option<Decimal>, TradesimError> {
    match config.get_decimal(BACKTEST, key)? {
        None => Ok(None),
        Some(v) if v.is_zero() => Ok(None),
        Some(v) if v < Decimal::ZERO || v >= Decimal::ONE => Err(invalid(
            BACKTEST,
            key,
            &format!("{key} must be between 0 and 1"),
        )),
        Some(v) => Ok(Some(v)),
    }
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, TradesimError> {
    let defaults = BacktestConfig::default();

    let initial_capital = decimal_or(config, BACKTEST, "initial_capital", defaults.initial_capital)?;
    if initial_capital <= Decimal::ZERO {
        return Err(invalid(
            BACKTEST,
            "initial_capital",
            "initial_capital must be positive",
        ));
    }

    let risk_per_trade = decimal_or(config, BACKTEST, "risk_per_trade", defaults.risk_per_trade)?;
    if risk_per_trade < Decimal::ZERO || risk_per_trade > Decimal::ONE {
        return Err(invalid(
            BACKTEST,
            "risk_per_trade",
            "risk_per_trade must be between 0 and 1",
        ));
    }

    let position_size = non_negative(
        BACKTEST,
        "position_size",
        decimal_or(config, BACKTEST, "position_size", defaults.position_size)?,
    )?;
    let commission = non_negative(
        BACKTEST,
        "commission",
        decimal_or(config, BACKTEST, "commission", defaults.commission)?,
    )?;
    let slippage = non_negative(
        BACKTEST,
        "slippage",
        decimal_or(config, BACKTEST, "slippage", defaults.slippage)?,
    )?;

    let allow_long = config.get_bool(BACKTEST, "allow_long", defaults.allow_long);
    let allow_short = config.get_bool(BACKTEST, "allow_short", defaults.allow_short);

    let stop_loss_pct = optional_fraction(config, "stop_loss_pct")?;
    let take_profit_pct = match config.get_decimal(BACKTEST, "take_profit_pct")? {
        Some(v) if v < Decimal::ZERO => {
            return Err(invalid(
                BACKTEST,
                "take_profit_pct",
                "take_profit_pct must be non-negative",
            ));
        }
        Some(v) if v.is_zero() => None,
        other => other,
    };

    Ok(BacktestConfig {
        initial_capital,
        position_size,
        risk_per_trade,
        commission,
        slippage,
        allow_long,
        allow_short,
        stop_loss_pct,
        take_profit_pct,
    })
}

/// Reads `[risk]`. Returns the calculator together with the rolling window length.
pub fn load_var_calculator(
    config: &dyn ConfigPort,
) -> Result<(VarCalculator, usize), TradesimError> {
    let method = match config.get_string(RISK, "method") {
        Some(raw) if !raw.trim().is_empty() => raw
            .parse::<VarMethod>()
            .map_err(|reason| invalid(RISK, "method", &reason))?,
        _ => VarMethod::Historical,
    };

    let confidence = decimal_or(config, RISK, "confidence", DEFAULT_CONFIDENCE)?;
    if confidence <= Decimal::ZERO || confidence >= Decimal::ONE {
        return Err(invalid(
            RISK,
            "confidence",
            "confidence must be between 0 and 1",
        ));
    }

    let window = config.get_int(RISK, "window", DEFAULT_VAR_WINDOW as i64);
    if window < 1 {
        return Err(invalid(RISK, "window", "window must be at least 1"));
    }

    let simulations = config.get_int(RISK, "simulations", 0);
    if simulations < 0 {
        return Err(invalid(
            RISK,
            "simulations",
            "simulations must be non-negative",
        ));
    }

    let calculator = VarCalculator::new(method, confidence, window as usize)
        .with_simulations(simulations as usize);
    Ok((calculator, window as usize))
}

pub fn load_risk_free_rate(config: &dyn ConfigPort) -> Result<Decimal, TradesimError> {
    let value = decimal_or(config, METRICS, "risk_free_rate", DEFAULT_RISK_FREE_RATE)?;
    if value < Decimal::ZERO || value >= Decimal::ONE {
        return Err(invalid(
            METRICS,
            "risk_free_rate",
            "risk_free_rate must be between 0 and 1",
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use crate::domain::risk::DEFAULT_SIMULATIONS;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn invalid_key(err: TradesimError) -> String {
        match err {
            TradesimError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn full_backtest_section() {
        let config = make_config(
            r#"
[backtest]
initial_capital = 50000
position_size = 10
risk_per_trade = 0.01
commission = 0.001
slippage = 0.0005
allow_long = true
allow_short = yes
stop_loss_pct = 0.05
take_profit_pct = 0.1
"#,
        );
        let loaded = load_backtest_config(&config).unwrap();
        assert_eq!(loaded.initial_capital, dec!(50000));
        assert_eq!(loaded.position_size, dec!(10));
        assert_eq!(loaded.risk_per_trade, dec!(0.01));
        assert_eq!(loaded.commission, dec!(0.001));
        assert_eq!(loaded.slippage, dec!(0.0005));
        assert!(loaded.allow_long);
        assert!(loaded.allow_short);
        assert_eq!(loaded.stop_loss_pct, Some(dec!(0.05)));
        assert_eq!(loaded.take_profit_pct, Some(dec!(0.1)));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config = make_config("");
        assert_eq!(load_backtest_config(&config).unwrap(), BacktestConfig::default());
        assert_eq!(load_risk_free_rate(&config).unwrap(), DEFAULT_RISK_FREE_RATE);
        let (calc, window) = load_var_calculator(&config).unwrap();
        assert_eq!(calc.method(), VarMethod::Historical);
        assert_eq!(calc.confidence(), DEFAULT_CONFIDENCE);
        assert_eq!(calc.simulations(), DEFAULT_SIMULATIONS);
        assert_eq!(window, DEFAULT_VAR_WINDOW);
    }

    #[test]
    fn initial_capital_must_be_positive() {
        for value in ["0", "-100"] {
            let config = make_config(&format!("[backtest]\ninitial_capital = {value}\n"));
            let err = load_backtest_config(&config).unwrap_err();
            assert_eq!(invalid_key(err), "initial_capital");
        }
    }

    #[test]
    fn malformed_decimal_is_invalid() {
        let config = make_config("[backtest]\ninitial_capital = lots\n");
        let err = load_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "initial_capital");
    }

    #[test]
    fn negative_costs_fail() {
        for key in ["position_size", "commission", "slippage"] {
            let config = make_config(&format!("[backtest]\n{key} = -1\n"));
            let err = load_backtest_config(&config).unwrap_err();
            assert_eq!(invalid_key(err), key);
        }
    }

    #[test]
    fn risk_per_trade_range() {
        let config = make_config("[backtest]\nrisk_per_trade = 1.5\n");
        let err = load_backtest_config(&config).unwrap_err();
        assert_eq!(invalid_key(err), "risk_per_trade");
    }

    #[test]
    fn stop_and_target_bounds() {
        let config = make_config("[backtest]\nstop_loss_pct = 1.0\n");
        assert_eq!(
            invalid_key(load_backtest_config(&config).unwrap_err()),
            "stop_loss_pct"
        );

        let config = make_config("[backtest]\ntake_profit_pct = -0.1\n");
        assert_eq!(
            invalid_key(load_backtest_config(&config).unwrap_err()),
            "take_profit_pct"
        );

        let config = make_config("[backtest]\nstop_loss_pct = 0\ntake_profit_pct = 0\n");
        let loaded = load_backtest_config(&config).unwrap();
        assert_eq!(loaded.stop_loss_pct, None);
        assert_eq!(loaded.take_profit_pct, None);
    }

    #[test]
    fn risk_section() {
        let config = make_config(
            "[risk]\nmethod = monte_carlo\nconfidence = 0.99\nwindow = 30\nsimulations = 500\n",
        );
        let (calc, window) = load_var_calculator(&config).unwrap();
        assert_eq!(calc.method(), VarMethod::MonteCarlo);
        assert_eq!(calc.confidence(), dec!(0.99));
        assert_eq!(calc.simulations(), 500);
        assert_eq!(window, 30);
    }

    #[test]
    fn risk_section_rejects_bad_values() {
        let cases = [
            ("method = gaussian", "method"),
            ("confidence = 1", "confidence"),
            ("confidence = 0", "confidence"),
            ("window = 0", "window"),
            ("simulations = -5", "simulations"),
        ];
        for (line, key) in cases {
            let config = make_config(&format!("[risk]\n{line}\n"));
            let err = load_var_calculator(&config).unwrap_err();
            assert_eq!(invalid_key(err), key, "{line}");
        }
    }

    #[test]
    fn risk_free_rate_range() {
        let config = make_config("[metrics]\nrisk_free_rate = 0.045\n");
        assert_eq!(load_risk_free_rate(&config).unwrap(), dec!(0.045));

        for value in ["-0.01", "1.5"] {
            let config = make_config(&format!("[metrics]\nrisk_free_rate = {value}\n"));
            assert_eq!(
                invalid_key(load_risk_free_rate(&config).unwrap_err()),
                "risk_free_rate"
            );
        }
    }
}
