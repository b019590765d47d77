//! Integration tests for the bar loop.
//!
//! Tests cover:
//! - Take-profit auto-exit with risk-based sizing
//! - Exit levels on the wrong side of the entry
//! - Determinism across repeated runs
//! - Signal priority when several signals fire on one bar
//! - At most one open position per direction
//! - Capital reconciliation against the ledger
//! - Short round trips and close-at-end

mod common;

use approx::assert_relative_eq;
use common::*;
use imatrade::domain::backtest::{ExitCheckOrder, SignalPriority};
use imatrade::domain::bar::{BarAction, Trigger};
use imatrade::domain::error::ImatradeError;
use imatrade::domain::financial::{ExitLevel, SizingPolicy};
use imatrade::domain::indicator::IndicatorSpec;
use imatrade::domain::metrics::Metrics;
use imatrade::domain::position::{Direction, OpenOutcome};
use imatrade::domain::processor::MarketDataProcessor;
use proptest::prelude::*;

mod exit_levels {
    use super::*;

    #[test]
    fn take_profit_closes_long_at_target() {
        let strategy = {
            let mut s = make_strategy(
                Some(rule_set(
                    Direction::Long,
                    &[("at_entry", "close == 1.2350")],
                    &[("never", "close < 0")],
                )),
                None,
            );
            s.sizing = SizingPolicy::RiskBased;
            s
        };
        let mut config = sample_config();
        config.stop_loss = Some(ExitLevel::Price(1.2300));
        config.take_profit = Some(ExitLevel::Price(1.2400));

        let bars = vec![
            make_bar(0, 1.2340, 1.2360, 1.2330, 1.2350),
            make_bar(1, 1.2350, 1.2405, 1.2340, 1.2380),
        ];
        let result = MarketDataProcessor::new("EUR_USD", &strategy, &config)
            .unwrap()
            .run(bars)
            .unwrap();

        assert_eq!(result.ledger.len(), 1);
        let trade = &result.ledger[0];
        let quantity = 100.0 / (1.2350 - 1.2300);
        assert_relative_eq!(trade.quantity, quantity, epsilon = 1e-6);
        assert_relative_eq!(trade.exit_price, 1.2400);
        assert_eq!(trade.close_reason, "take profit");
        assert_relative_eq!(trade.pnl, quantity * (1.2400 - 1.2350), epsilon = 1e-6);
        assert_eq!(trade.exit_time, time(1));
        assert_relative_eq!(result.summary.current_capital, 10_000.0 + trade.pnl, epsilon = 1e-6);
        assert!(result.open_positions.is_empty());
    }

    #[test]
    fn stop_loss_closes_short_at_stop() {
        let strategy = make_strategy(
            None,
            Some(rule_set(
                Direction::Short,
                &[("first", "close == 100")],
                &[("never", "close < 0")],
            )),
        );
        let mut config = sample_config();
        config.stop_loss = Some(ExitLevel::Percent(5.0));

        let bars = vec![
            make_bar(0, 100.0, 100.0, 100.0, 100.0),
            make_bar(1, 101.0, 106.0, 100.5, 104.0),
        ];
        let result = MarketDataProcessor::new("EUR_USD", &strategy, &config)
            .unwrap()
            .run(bars)
            .unwrap();

        assert_eq!(result.ledger.len(), 1);
        assert_eq!(result.ledger[0].close_reason, "stop loss");
        assert_relative_eq!(result.ledger[0].exit_price, 105.0);
        assert_relative_eq!(result.ledger[0].pnl, -500.0);
    }

    #[test]
    fn absolute_stop_above_long_entry_fails_the_run() {
        let strategy = {
            let mut s = make_strategy(
                Some(rule_set(
                    Direction::Long,
                    &[("dip", "close == 1.2250")],
                    &[("never", "close < 0")],
                )),
                None,
            );
            s.sizing = SizingPolicy::RiskBased;
            s
        };
        let mut config = sample_config();
        config.stop_loss = Some(ExitLevel::Price(1.2300));

        let bars = vec![
            make_bar(0, 1.2250, 1.2250, 1.2250, 1.2250),
            make_bar(1, 1.2250, 1.2260, 1.2240, 1.2255),
        ];
        let err = MarketDataProcessor::new("EUR_USD", &strategy, &config)
            .unwrap()
            .run(bars)
            .unwrap_err();

        assert!(matches!(
            err,
            ImatradeError::ExitLevelWrongSide {
                level: "stop-loss",
                direction: Direction::Long,
                ..
            }
        ));
        assert!(err.is_configuration());
    }

    #[test]
    fn after_rules_ordering_lets_exit_signal_win() {
        let strategy = make_strategy(
            Some(rule_set(
                Direction::Long,
                &[("first", "close == 10")],
                &[("drop", "close < 9")],
            )),
            None,
        );
        let mut config = sample_config();
        config.stop_loss = Some(ExitLevel::Price(8.5));
        config.exit_check = ExitCheckOrder::AfterRules;

        let bars = vec![
            make_bar(0, 10.0, 10.0, 10.0, 10.0),
            make_bar(1, 9.5, 9.5, 8.0, 8.8),
        ];
        let result = MarketDataProcessor::new("EUR_USD", &strategy, &config)
            .unwrap()
            .run(bars)
            .unwrap();

        assert_eq!(result.ledger.len(), 1);
        assert_eq!(result.ledger[0].close_reason, "exit signal");
        assert_relative_eq!(result.ledger[0].exit_price, 8.8);
    }
}

mod determinism {
    use super::*;

    #[test]
    fn same_input_gives_same_ledger_and_state() {
        let strategy = with_indicator(
            make_strategy(
                Some(rule_set(
                    Direction::Long,
                    &[("above", "cross_short_ma > cross_long_ma")],
                    &[("below", "cross_short_ma < cross_long_ma")],
                )),
                None,
            ),
            IndicatorSpec::new("cross", "ma_crossover")
                .with_param("short_window", 3.0)
                .with_param("long_window", 6.0),
        );
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + (i as f64 * 0.3).sin() * 8.0)
            .collect();

        let run = || {
            MarketDataProcessor::new("EUR_USD", &strategy, &sample_config())
                .unwrap()
                .run(flat_bars(&closes))
                .unwrap()
        };
        let first = run();
        let second = run();

        assert!(!first.ledger.is_empty());
        assert_eq!(first.ledger, second.ledger);
        assert_eq!(first.summary, second.summary);
        let labels = |r: &imatrade::domain::processor::SimulationResult| {
            r.processed
                .iter()
                .map(|rec| (rec.flags.clone(), rec.action.as_ref().map(|a| a.label())))
                .collect::<Vec<_>>()
        };
        assert_eq!(labels(&first), labels(&second));
    }
}

mod signal_priority {
    use super::*;

    fn both_directions() -> imatrade::domain::strategy::Strategy {
        make_strategy(
            Some(rule_set(
                Direction::Long,
                &[("long_up", "close > 0")],
                &[("long_never", "close < 0")],
            )),
            Some(rule_set(
                Direction::Short,
                &[("short_up", "close > 0")],
                &[("short_never", "close < 0")],
            )),
        )
    }

    #[test]
    fn default_priority_prefers_long_entry() {
        let result = MarketDataProcessor::new("EUR_USD", &both_directions(), &sample_config())
            .unwrap()
            .run(flat_bars(&[10.0, 11.0]))
            .unwrap();

        let first = &result.processed[0];
        assert!(first.signal(Trigger::LongEntry));
        assert!(first.signal(Trigger::ShortEntry));
        assert_eq!(first.action.as_ref().unwrap().trigger(), Trigger::LongEntry);

        // The long entry keeps winning on bar 2 even though it is now a no-op.
        let second = result.processed[1].action.as_ref().unwrap();
        assert_eq!(
            second,
            &BarAction::Open {
                trigger: Trigger::LongEntry,
                outcome: OpenOutcome::AlreadyOpen
            }
        );
        assert_eq!(result.open_positions.len(), 1);
        assert_eq!(result.open_positions[0].direction, Direction::Long);
    }

    #[test]
    fn custom_priority_prefers_short_entry() {
        let mut config = sample_config();
        config.signal_priority = SignalPriority::new(&[
            Trigger::ShortEntry,
            Trigger::LongEntry,
            Trigger::LongExit,
            Trigger::ShortExit,
        ])
        .unwrap();

        let result = MarketDataProcessor::new("EUR_USD", &both_directions(), &config)
            .unwrap()
            .run(flat_bars(&[10.0, 11.0]))
            .unwrap();

        assert_eq!(result.open_positions.len(), 1);
        assert_eq!(result.open_positions[0].direction, Direction::Short);
        assert_eq!(
            result.processed[0].action.as_ref().unwrap().label(),
            "short_entry"
        );
    }
}

mod condition_columns {
    use super::*;

    #[test]
    fn shared_condition_name_is_rejected_at_setup() {
        let strategy = make_strategy(
            Some(rule_set(
                Direction::Long,
                &[("up", "close > 100")],
                &[("long_out", "close < 90")],
            )),
            Some(rule_set(
                Direction::Short,
                &[("up", "close < 50")],
                &[("short_out", "close > 60")],
            )),
        );
        let err = MarketDataProcessor::new("EUR_USD", &strategy, &sample_config()).unwrap_err();
        assert!(matches!(err, ImatradeError::RuleInvalid { .. }));
    }

    #[test]
    fn signal_matches_its_own_condition_columns() {
        let strategy = make_strategy(
            Some(rule_set(
                Direction::Long,
                &[("long_up", "close > 100")],
                &[("long_out", "close < 90")],
            )),
            Some(rule_set(
                Direction::Short,
                &[("short_up", "close < 50")],
                &[("short_out", "close > 60")],
            )),
        );
        let result = MarketDataProcessor::new("EUR_USD", &strategy, &sample_config())
            .unwrap()
            .run(flat_bars(&[150.0]))
            .unwrap();

        let record = &result.processed[0];
        assert!(record.signal(Trigger::LongEntry));
        assert!(record.flag("C.long_up"));
        assert!(!record.signal(Trigger::ShortEntry));
        assert!(!record.flag("C.short_up"));
    }
}

mod accounting {
    use super::*;

    #[test]
    fn capital_equals_initial_plus_realized_pnl() {
        let strategy = make_strategy(
            Some(rule_set(
                Direction::Long,
                &[("cheap", "close < 10")],
                &[("dear", "close > 12")],
            )),
            Some(rule_set(
                Direction::Short,
                &[("very_dear", "close > 13")],
                &[("fair", "close < 11")],
            )),
        );
        let mut config = sample_config();
        config.close_at_end = true;

        let closes = [9.0, 10.0, 12.5, 13.5, 12.0, 10.5, 9.5, 11.0, 14.0];
        let result = MarketDataProcessor::new("EUR_USD", &strategy, &config)
            .unwrap()
            .run(flat_bars(&closes))
            .unwrap();

        assert!(result.open_positions.is_empty());
        let realized: f64 = result.ledger.iter().map(|e| e.pnl).sum();
        assert_relative_eq!(result.summary.current_capital, 10_000.0 + realized, epsilon = 1e-9);
        assert_relative_eq!(result.summary.cumulative_pnl, realized, epsilon = 1e-9);
        assert_eq!(result.summary.trade_count, result.ledger.len());

        let last = result.ledger.last().unwrap();
        assert_relative_eq!(last.capital_after_close, result.summary.current_capital, epsilon = 1e-9);

        let metrics = Metrics::compute(&result.ledger, config.initial_capital);
        assert_relative_eq!(metrics.total_return, realized / 10_000.0, epsilon = 1e-12);
    }

    #[test]
    fn short_round_trip_profits_from_falling_price() {
        let strategy = make_strategy(
            None,
            Some(rule_set(
                Direction::Short,
                &[("high", "close > 10")],
                &[("low", "close < 8")],
            )),
        );
        let result = MarketDataProcessor::new("EUR_USD", &strategy, &sample_config())
            .unwrap()
            .run(flat_bars(&[9.0, 12.0, 10.0, 7.0]))
            .unwrap();

        assert_eq!(result.ledger.len(), 1);
        let trade = &result.ledger[0];
        assert_eq!(trade.direction, Direction::Short);
        assert_relative_eq!(trade.entry_price, 12.0);
        assert_relative_eq!(trade.exit_price, 7.0);
        assert_relative_eq!(trade.pnl, 100.0 * 5.0);
        assert_eq!(trade.close_reason, "exit signal");
    }

    #[test]
    fn leftovers_stay_open_without_close_at_end() {
        let strategy = make_strategy(
            Some(rule_set(
                Direction::Long,
                &[("any", "close > 0")],
                &[("never", "close < 0")],
            )),
            None,
        );
        let result = MarketDataProcessor::new("EUR_USD", &strategy, &sample_config())
            .unwrap()
            .run(flat_bars(&[5.0, 6.0]))
            .unwrap();
        assert!(result.ledger.is_empty());
        assert_eq!(result.open_positions.len(), 1);
    }

    #[test]
    fn close_at_end_books_end_of_data() {
        let strategy = make_strategy(
            Some(rule_set(
                Direction::Long,
                &[("any", "close > 0")],
                &[("never", "close < 0")],
            )),
            None,
        );
        let mut config = sample_config();
        config.close_at_end = true;
        let result = MarketDataProcessor::new("EUR_USD", &strategy, &config)
            .unwrap()
            .run(flat_bars(&[5.0, 6.0]))
            .unwrap();
        assert_eq!(result.ledger.len(), 1);
        assert_eq!(result.ledger[0].close_reason, "end of data");
        assert_relative_eq!(result.ledger[0].pnl, 100.0);
    }
}

mod invariants {
    use super::*;

    proptest! {
        #[test]
        fn at_most_one_open_position_per_direction(
            closes in prop::collection::vec(1.0f64..20.0, 1..60),
            long_in in 1.0f64..20.0,
            long_out in 1.0f64..20.0,
            short_in in 1.0f64..20.0,
            short_out in 1.0f64..20.0,
        ) {
            let long_entry = format!("close < {long_in}");
            let long_exit = format!("close > {long_out}");
            let short_entry = format!("close > {short_in}");
            let short_exit = format!("close < {short_out}");
            let strategy = make_strategy(
                Some(rule_set(Direction::Long, &[("long_in", long_entry.as_str())], &[("long_out", long_exit.as_str())])),
                Some(rule_set(Direction::Short, &[("short_in", short_entry.as_str())], &[("short_out", short_exit.as_str())])),
            );
            let mut config = sample_config();
            config.stop_loss = Some(ExitLevel::Percent(10.0));
            config.take_profit = Some(ExitLevel::Percent(10.0));

            let mut processor = MarketDataProcessor::new("EUR_USD", &strategy, &config).unwrap();
            for bar in flat_bars(&closes) {
                processor.on_bar(bar).unwrap();
                for direction in [Direction::Long, Direction::Short] {
                    let open = processor
                        .position_handler()
                        .open_positions()
                        .filter(|p| p.direction == direction)
                        .count();
                    prop_assert!(open <= 1);
                }
            }

            let summary = processor.position_handler().financial().summary();
            prop_assert_eq!(
                summary.trade_count,
                summary.win_count + summary.loss_count + summary.breakeven_count
            );
        }
    }
}
