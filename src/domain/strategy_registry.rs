//! Named strategy factories and their serialized configuration form.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::error::TradesimError;
use super::indicator::{ClosePrice, Constant, Ema, Indicator, Rsi, Sma};
use super::num::from_f64_or_zero;
use super::rule::Rule;
use super::series::PriceSeries;
use super::strategy::{RuleStrategy, Strategy};

pub type StrategyParams = BTreeMap<String, f64>;

const RSI_FILTER_PERIOD: usize = 14;

pub type StrategyFactory =
    Arc<dyn Fn(Arc<PriceSeries>, &StrategyParams) -> Arc<dyn Strategy> + Send + Sync>;

pub struct StrategyRegistry {
    factories: HashMap<String, StrategyFactory>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyRegistry {
    /// Registry preloaded with `sma_cross_fast`, `ema_cross_fast` and `rsi_overbought_oversold`.
    pub fn new() -> Self {
        let mut registry = StrategyRegistry::empty();
        registry.register("sma_cross_fast", Arc::new(sma_cross_fast));
        registry.register("ema_cross_fast", Arc::new(ema_cross_fast));
        registry.register("rsi_overbought_oversold", Arc::new(rsi_overbought_oversold));
        registry
    }

    pub fn empty() -> Self {
        StrategyRegistry {
            factories: HashMap::new(),
        }
    }

    /// Registers or replaces the factory under `name`.
    pub fn register(&mut self, name: &str, factory: StrategyFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn lookup(&self, name: &str) -> Option<&StrategyFactory> {
        self.factories.get(name)
    }

    pub fn instantiate(
        &self,
        name: &str,
        series: Arc<PriceSeries>,
        params: &StrategyParams,
    ) -> Result<Arc<dyn Strategy>, TradesimError> {
        match self.lookup(name) {
            Some(factory) => Ok(factory(series, params)),
            None => {
                warn!(strategy = name, "unknown strategy");
                Err(TradesimError::UnknownStrategy {
                    name: name.to_string(),
                })
            }
        }
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default)]
    pub params: StrategyParams,
}

impl StrategyConfig {
    pub fn to_strategy(
        &self,
        registry: &StrategyRegistry,
        series: Arc<PriceSeries>,
    ) -> Result<Arc<dyn Strategy>, TradesimError> {
        registry.instantiate(&self.name, series, &self.params)
    }
}

pub fn serialize_strategy(name: &str, params: &StrategyParams) -> Result<String, TradesimError> {
    let config = StrategyConfig {
        name: name.to_string(),
        params: params.clone(),
    };
    Ok(serde_json::to_string(&config)?)
}

pub fn deserialize_strategy(
    data: &str,
    registry: &StrategyRegistry,
    series: Arc<PriceSeries>,
) -> Result<Arc<dyn Strategy>, TradesimError> {
    let config: StrategyConfig = serde_json::from_str(data)?;
    config.to_strategy(registry, series)
}

fn param(params: &StrategyParams, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

fn period_param(params: &StrategyParams, key: &str, default: usize) -> usize {
    // negative and NaN saturate to zero
    param(params, key, default as f64) as usize
}

/// SMA crossover filtered by RSI(14): enter on a cross up while RSI is under `oversold`,
/// exit on a cross down or once RSI is over `overbought`.
fn sma_cross_fast(series: Arc<PriceSeries>, params: &StrategyParams) -> Arc<dyn Strategy> {
    let fast_period = period_param(params, "fast_period", 5);
    let slow_period = period_param(params, "slow_period", 20);
    let overbought = from_f64_or_zero(param(params, "overbought", 70.0));
    let oversold = from_f64_or_zero(param(params, "oversold", 30.0));

    let close: Arc<dyn Indicator> = Arc::new(ClosePrice::new(series));
    let fast: Arc<dyn Indicator> = Arc::new(Sma::new(close.clone(), fast_period));
    let slow: Arc<dyn Indicator> = Arc::new(Sma::new(close.clone(), slow_period));
    let rsi: Arc<dyn Indicator> = Arc::new(Rsi::new(close, RSI_FILTER_PERIOD));

    Arc::new(
        RuleStrategy::new(
            Rule::And(vec![
                Rule::cross_above(fast.clone(), slow.clone()),
                Rule::below(rsi.clone(), Arc::new(Constant(oversold))),
            ]),
            Rule::Or(vec![
                Rule::cross_below(fast, slow),
                Rule::above(rsi, Arc::new(Constant(overbought))),
            ]),
        )
        .with_unstable_period(slow_period),
    )
}

fn ema_cross_fast(series: Arc<PriceSeries>, params: &StrategyParams) -> Arc<dyn Strategy> {
    let fast_period = period_param(params, "fast_period", 12);
    let slow_period = period_param(params, "slow_period", 26);

    let close: Arc<dyn Indicator> = Arc::new(ClosePrice::new(series));
    let fast: Arc<dyn Indicator> = Arc::new(Ema::new(close.clone(), fast_period));
    let slow: Arc<dyn Indicator> = Arc::new(Ema::new(close, slow_period));

    Arc::new(
        RuleStrategy::new(
            Rule::cross_above(fast.clone(), slow.clone()),
            Rule::cross_below(fast, slow),
        )
        .with_unstable_period(slow_period),
    )
}

fn rsi_overbought_oversold(series: Arc<PriceSeries>, params: &StrategyParams) -> Arc<dyn Strategy> {
    let period = period_param(params, "period", 14);
    let overbought = from_f64_or_zero(param(params, "overbought", 70.0));
    let oversold = from_f64_or_zero(param(params, "oversold", 30.0));

    let close: Arc<dyn Indicator> = Arc::new(ClosePrice::new(series));
    let rsi: Arc<dyn Indicator> = Arc::new(Rsi::new(close, period));

    Arc::new(
        RuleStrategy::new(
            Rule::below(rsi.clone(), Arc::new(Constant(oversold))),
            Rule::above(rsi, Arc::new(Constant(overbought))),
        )
        .with_unstable_period(period),
    )
}
