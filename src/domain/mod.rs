//! Core domain types and logic.

pub mod num;
pub mod ohlcv;
pub mod series;
pub mod record;
pub mod position;
pub mod indicator;
pub mod rule;
pub mod strategy;
pub mod strategy_registry;
pub mod metrics;
pub mod analyzer;
pub mod backtest;
pub mod portfolio;
pub mod multi_asset;
pub mod risk;
pub mod sizing;
pub mod config_validation;
pub mod error;
