//! Simulation core: bars, indicators, rules, positions and the bar loop.

pub mod bar;
pub mod position;
pub mod financial;
pub mod position_handler;
pub mod indicator;
pub mod indicator_helpers;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod backtest;
pub mod metrics;
pub mod strategy;
pub mod processor;
pub mod config_validation;
pub mod error;
