//! Configuration access port.

use rust_decimal::Decimal;

use crate::domain::error::TradesimError;
use crate::domain::num::parse_decimal;

/// Sectioned key/value configuration source.
pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;

    /// Reads a decimal without going through `f64`. Absent or blank keys are `Ok(None)`;
    /// malformed values are `ConfigInvalid`.
    fn get_decimal(&self, section: &str, key: &str) -> Result<Option<Decimal>, TradesimError> {
        match self.get_string(section, key) {
            Some(raw) if !raw.trim().is_empty() => parse_decimal(&raw).map(Some).map_err(|e| {
                TradesimError::ConfigInvalid {
                    section: section.to_string(),
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }),
            _ => Ok(None),
        }
    }
}
