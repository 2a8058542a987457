//! Independent per-asset backtests fanned out across the rayon pool.
//!
//! There is no cross-asset capital sharing, rebalancing or correlation: every symbol
//! gets its own [`Backtester`] over its own series with the same configuration.

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::info;

use super::analyzer::{Analyzer, AnalyzerRegistry};
use super::backtest::{BacktestConfig, BacktestResult, Backtester};
use super::error::TradesimError;
use super::series::PriceSeries;
use super::strategy::Strategy;
use super::strategy_registry::{StrategyConfig, StrategyRegistry};

pub type AssetStrategyFactory =
    Arc<dyn Fn(&str, Arc<PriceSeries>) -> Arc<dyn Strategy> + Send + Sync>;

/// Where each asset's strategy comes from.
///
/// A shared strategy is one instance handed to every run; if its rules read a
/// particular series, every asset trades on that series' signals. A per-asset factory
/// binds a fresh strategy to each asset's own series.
#[derive(Clone)]
pub enum StrategySource {
    Shared(Arc<dyn Strategy>),
    PerAsset(AssetStrategyFactory),
}

impl StrategySource {
    fn strategy_for(&self, symbol: &str, series: &Arc<PriceSeries>) -> Arc<dyn Strategy> {
        match self {
            StrategySource::Shared(strategy) => strategy.clone(),
            StrategySource::PerAsset(factory) => factory(symbol, series.clone()),
        }
    }
}

pub struct MultiAssetBacktester {
    assets: BTreeMap<String, Arc<PriceSeries>>,
    strategy: StrategySource,
    analyzers: AnalyzerRegistry,
}

impl MultiAssetBacktester {
    pub fn new(strategy: StrategySource) -> Self {
        MultiAssetBacktester {
            assets: BTreeMap::new(),
            strategy,
            analyzers: AnalyzerRegistry::new(),
        }
    }

    /// Builds every asset's strategy from a named configuration.
    pub fn from_config(
        registry: &StrategyRegistry,
        config: &StrategyConfig,
    ) -> Result<Self, TradesimError> {
        let factory = registry
            .lookup(&config.name)
            .cloned()
            .ok_or_else(|| TradesimError::UnknownStrategy {
                name: config.name.clone(),
            })?;
        let params = config.params.clone();
        Ok(Self::new(StrategySource::PerAsset(Arc::new(
            move |_symbol: &str, series: Arc<PriceSeries>| factory(series, &params),
        ))))
    }

    /// Adds or replaces the series for `symbol`.
    pub fn add_asset(&mut self, symbol: &str, series: Arc<PriceSeries>) {
        self.assets.insert(symbol.to_string(), series);
    }

    pub fn add_analyzer(&mut self, analyzer: Arc<dyn Analyzer>) {
        self.analyzers.add(analyzer);
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.assets.keys().map(String::as_str).collect()
    }

    pub fn run(&self, config: &BacktestConfig) -> BTreeMap<String, BacktestResult> {
        info!(assets = self.assets.len(), "starting multi-asset run");
        self.assets
            .par_iter()
            .map(|(symbol, series)| {
                let strategy = self.strategy.strategy_for(symbol, series);
                let result = Backtester::new(series.clone(), strategy)
                    .with_analyzers(self.analyzers.clone())
                    .run(config);
                (symbol.clone(), result)
            })
            .collect()
    }

    pub fn run_portfolio(&self, config: &BacktestConfig) -> PortfolioResult {
        PortfolioResult::from_results(self.run(config))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioResult {
    pub asset_results: BTreeMap<String, BacktestResult>,
    pub total_equity: Decimal,
    pub total_net_profit: Decimal,
}

impl PortfolioResult {
    pub fn from_results(asset_results: BTreeMap<String, BacktestResult>) -> Self {
        let total_equity = asset_results.values().map(|r| r.final_equity).sum();
        let total_net_profit = asset_results.values().map(|r| r.net_profit).sum();
        PortfolioResult {
            asset_results,
            total_equity,
            total_net_profit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::series_from_closes;
    use crate::domain::record::TradingRecord;
    use rust_decimal_macros::dec;

    struct EnterFirstExitLast {
        last: usize,
    }

    impl Strategy for EnterFirstExitLast {
        fn should_enter(&self, index: usize, _record: &TradingRecord) -> bool {
            index == 0
        }
        fn should_exit(&self, index: usize, _record: &TradingRecord) -> bool {
            index == self.last
        }
    }

    #[test]
    fn each_asset_runs_independently() {
        let mut runner = MultiAssetBacktester::new(StrategySource::Shared(Arc::new(
            EnterFirstExitLast { last: 2 },
        )));
        runner.add_asset("UP", series_from_closes(&[dec!(10), dec!(15), dec!(20)]));
        runner.add_asset("DOWN", series_from_closes(&[dec!(10), dec!(8), dec!(5)]));

        let config = BacktestConfig {
            initial_capital: dec!(1000),
            ..BacktestConfig::default()
        };
        let results = runner.run(&config);
        assert_eq!(results.len(), 2);
        assert_eq!(results["UP"].final_equity, dec!(2000));
        assert_eq!(results["DOWN"].final_equity, dec!(500));

        let portfolio = PortfolioResult::from_results(results);
        assert_eq!(portfolio.total_equity, dec!(2500));
        assert_eq!(portfolio.total_net_profit, dec!(500));
    }

    #[test]
    fn analyzers_are_inherited() {
        let mut runner = MultiAssetBacktester::new(StrategySource::Shared(Arc::new(
            EnterFirstExitLast { last: 1 },
        )));
        runner.add_asset("A", series_from_closes(&[dec!(1), dec!(2)]));
        runner.add_analyzer(Arc::new(crate::domain::analyzer::ProfitFactorAnalyzer));
        let results = runner.run(&BacktestConfig::default());
        assert!(results["A"].analysis.contains_key("profit_factor"));
    }

    #[test]
    fn per_asset_factory_sees_its_symbol() {
        let factory: AssetStrategyFactory = Arc::new(|symbol: &str, _series: Arc<PriceSeries>| {
            let last = if symbol == "LONG" { 3 } else { 1 };
            Arc::new(EnterFirstExitLast { last }) as Arc<dyn Strategy>
        });
        let mut runner = MultiAssetBacktester::new(StrategySource::PerAsset(factory));
        let closes = [dec!(1), dec!(2), dec!(3), dec!(4)];
        runner.add_asset("LONG", series_from_closes(&closes));
        runner.add_asset("SHORT", series_from_closes(&closes));
        let results = runner.run(&BacktestConfig::default());
        assert_eq!(results["LONG"].trades[0].exit_index, 3);
        assert_eq!(results["SHORT"].trades[0].exit_index, 1);
    }

    #[test]
    fn from_config_rejects_unknown_names() {
        let registry = StrategyRegistry::new();
        let config = StrategyConfig {
            name: "missing".into(),
            params: Default::default(),
        };
        assert!(matches!(
            MultiAssetBacktester::from_config(&registry, &config),
            Err(TradesimError::UnknownStrategy { .. })
        ));
    }

    #[test]
    fn empty_runner() {
        let runner = MultiAssetBacktester::new(StrategySource::Shared(Arc::new(
            EnterFirstExitLast { last: 0 },
        )));
        assert!(runner.symbols().is_empty());
        let portfolio = runner.run_portfolio(&BacktestConfig::default());
        assert!(portfolio.asset_results.is_empty());
        assert_eq!(portfolio.total_equity, Decimal::ZERO);
    }
}
