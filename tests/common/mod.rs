#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use imatrade::domain::backtest::BacktestConfig;
use imatrade::domain::bar::Bar;
use imatrade::domain::financial::SizingPolicy;
use imatrade::domain::indicator::IndicatorSpec;
use imatrade::domain::position::Direction;
use imatrade::domain::rule::{Phase, RuleSet};
use imatrade::domain::rule_parser::parse_rule;
use imatrade::domain::strategy::Strategy;

pub fn time(day: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(day)
}

pub fn make_bar(day: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: time(day),
        open,
        high,
        low,
        close,
        volume: 1_000.0,
    }
}

/// Flat bars (open = high = low = close), one per day.
pub fn flat_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(i as i64, c, c, c, c))
        .collect()
}

pub fn rule_set(direction: Direction, entry: &[(&str, &str)], exit: &[(&str, &str)]) -> RuleSet {
    RuleSet::new(
        parse_rule(direction, Phase::Entry, entry).unwrap(),
        parse_rule(direction, Phase::Exit, exit).unwrap(),
    )
    .unwrap()
}

pub fn make_strategy(long: Option<RuleSet>, short: Option<RuleSet>) -> Strategy {
    Strategy {
        name: "Test Strategy".into(),
        description: String::new(),
        instruments: vec!["EUR_USD".into()],
        sizing: SizingPolicy::Fixed(100.0),
        indicators: Vec::new(),
        long,
        short,
    }
}

pub fn with_indicator(mut strategy: Strategy, spec: IndicatorSpec) -> Strategy {
    strategy.indicators.push(spec);
    strategy
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig::new(10_000.0, 0.01)
}
