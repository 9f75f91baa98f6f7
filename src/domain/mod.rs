//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod portfolio;
pub mod execution;
pub mod indicator;
pub mod strategy;
pub mod backtest;
pub mod orchestrator;
pub mod metrics;
pub mod universe;
pub mod code_data;
pub mod order;
pub mod live;
pub mod config_validation;
pub mod error;
