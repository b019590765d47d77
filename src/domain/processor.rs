//! Bar-driven simulation loop for one (instrument, strategy) pair.
//!
//! Per bar, in order:
//! 1. push the close into every indicator window and merge the outputs of
//!    full windows into the record as `<indicator>_<key>`
//! 2. with [`ExitCheckOrder::BeforeRules`], close positions whose
//!    stop-loss or take-profit lies inside the bar's range
//! 3. when every indicator produced output, apply the rule sets and act on
//!    the first trigger in priority order whose signal is true
//! 4. with [`ExitCheckOrder::AfterRules`], run the threshold check now
//! 5. append the record to the processed table
//!
//! Each processor owns its windows, position book and ledger; nothing is
//! shared between instances.

use chrono::NaiveDateTime;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::domain::backtest::{BacktestConfig, ExitCheckOrder, SignalPriority};
use crate::domain::bar::{Bar, BarAction, BarRecord};
use crate::domain::error::ImatradeError;
use crate::domain::financial::FinancialSummary;
use crate::domain::indicator::{build_indicator, Indicator, IndicatorOutput};
use crate::domain::position::{CloseOutcome, CloseReason, LedgerEntry, Position};
use crate::domain::position_handler::PositionHandler;
use crate::domain::rule::RuleSet;
use crate::domain::strategy::Strategy;

/// Rolling close-price window owned by one indicator.
#[derive(Debug)]
struct IndicatorWindow {
    indicator: Box<dyn Indicator>,
    window: VecDeque<f64>,
}

impl IndicatorWindow {
    fn new(indicator: Box<dyn Indicator>) -> Self {
        let capacity = indicator.window_size();
        IndicatorWindow {
            indicator,
            window: VecDeque::with_capacity(capacity),
        }
    }

    fn push(&mut self, close: f64) -> Option<IndicatorOutput> {
        let capacity = self.indicator.window_size();
        self.window.push_back(close);
        while self.window.len() > capacity {
            self.window.pop_front();
        }
        if self.window.len() < capacity {
            return None;
        }
        self.indicator.compute_for_window(self.window.make_contiguous())
    }
}

/// Everything a finished run hands to reporting.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub instrument: String,
    pub strategy: String,
    pub processed: Vec<BarRecord>,
    pub ledger: Vec<LedgerEntry>,
    pub summary: FinancialSummary,
    /// Positions still open when the input ran out.
    pub open_positions: Vec<Position>,
}

#[derive(Debug)]
pub struct MarketDataProcessor {
    instrument: String,
    strategy_name: String,
    rule_sets: Vec<RuleSet>,
    priority: SignalPriority,
    exit_check: ExitCheckOrder,
    close_at_end: bool,
    windows: Vec<IndicatorWindow>,
    handler: PositionHandler,
    processed: Vec<BarRecord>,
    last_timestamp: Option<NaiveDateTime>,
}

impl MarketDataProcessor {
    /// Build a processor, failing on any configuration problem before a
    /// single bar is seen.
    pub fn new(
        instrument: &str,
        strategy: &Strategy,
        config: &BacktestConfig,
    ) -> Result<Self, ImatradeError> {
        strategy.validate()?;
        let windows = strategy
            .indicators
            .iter()
            .map(|spec| build_indicator(spec).map(IndicatorWindow::new))
            .collect::<Result<Vec<_>, _>>()?;

        let financial = config.financial(strategy.sizing);
        financial.validate()?;

        Ok(MarketDataProcessor {
            instrument: instrument.to_string(),
            strategy_name: strategy.name.clone(),
            rule_sets: strategy.rule_sets().cloned().collect(),
            priority: config.signal_priority,
            exit_check: config.exit_check,
            close_at_end: config.close_at_end,
            windows,
            handler: PositionHandler::new(financial),
            processed: Vec::new(),
            last_timestamp: None,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn position_handler(&self) -> &PositionHandler {
        &self.handler
    }

    pub fn processed(&self) -> &[BarRecord] {
        &self.processed
    }

    /// Number of bars before every indicator has a full window.
    pub fn warmup(&self) -> usize {
        self.windows
            .iter()
            .map(|w| w.indicator.window_size().saturating_sub(1))
            .max()
            .unwrap_or(0)
    }

    /// Process the next bar. Timestamps must be strictly increasing.
    pub fn on_bar(&mut self, bar: Bar) -> Result<&BarRecord, ImatradeError> {
        if let Some(last) = self.last_timestamp {
            if bar.timestamp <= last {
                return Err(ImatradeError::Data {
                    reason: format!(
                        "{}: bar at {} does not follow {}",
                        self.instrument, bar.timestamp, last
                    ),
                });
            }
        }
        self.last_timestamp = Some(bar.timestamp);

        let mut record = BarRecord::new(self.processed.len(), bar);
        let mut complete = true;
        for window in &mut self.windows {
            match window.push(record.bar.close) {
                Some(output) => {
                    let name = window.indicator.name();
                    for (key, value) in output {
                        record.set_field(format!("{name}_{key}"), value);
                    }
                }
                None => complete = false,
            }
        }
        record.complete = complete;

        if self.exit_check == ExitCheckOrder::BeforeRules {
            self.check_exit_levels(&record.bar);
        }

        if record.complete {
            for rule_set in &self.rule_sets {
                rule_set.apply(&mut record)?;
            }
            record.action = self.act_on_signals(&record)?;
        } else {
            debug!(
                instrument = %self.instrument,
                index = record.index,
                "indicator warm-up, rules skipped"
            );
        }

        if self.exit_check == ExitCheckOrder::AfterRules {
            self.check_exit_levels(&record.bar);
        }

        self.processed.push(record);
        self.processed
            .last()
            .ok_or_else(|| ImatradeError::Data {
                reason: "processed table is empty".to_string(),
            })
    }

    fn check_exit_levels(&mut self, bar: &Bar) {
        for outcome in self.handler.check_stop_loss_and_take_profit(&self.instrument, bar) {
            if let CloseOutcome::Closed { id, reason, .. } = outcome {
                debug!(instrument = %self.instrument, id, %reason, "exit level reached");
            }
        }
    }

    /// First true trigger in priority order wins, even when the resulting
    /// open or close turns out to be a no-op.
    fn act_on_signals(&mut self, record: &BarRecord) -> Result<Option<BarAction>, ImatradeError> {
        let Some(trigger) = self
            .priority
            .triggers()
            .iter()
            .copied()
            .find(|&t| record.signal(t))
        else {
            return Ok(None);
        };

        debug!(
            instrument = %self.instrument,
            index = record.index,
            trigger = trigger.as_str(),
            "signal"
        );

        let time = record.bar.timestamp;
        let price = record.bar.close;
        let direction = trigger.direction();
        let action = if trigger.is_entry() {
            let outcome = self
                .handler
                .open_position(time, &self.instrument, direction, price)?;
            BarAction::Open { trigger, outcome }
        } else {
            let outcome = self.handler.close_position(
                time,
                &self.instrument,
                direction,
                price,
                CloseReason::ExitSignal,
            );
            BarAction::Close { trigger, outcome }
        };
        Ok(Some(action))
    }

    /// End the run, closing leftovers at the last close when configured.
    pub fn finish(mut self) -> SimulationResult {
        if self.close_at_end {
            if let Some(last) = self.processed.last() {
                let time = last.bar.timestamp;
                let price = last.bar.close;
                let leftovers: Vec<_> = self
                    .handler
                    .open_positions()
                    .filter(|p| p.instrument == self.instrument)
                    .map(|p| p.direction)
                    .collect();
                for direction in leftovers {
                    self.handler.close_position(
                        time,
                        &self.instrument,
                        direction,
                        price,
                        CloseReason::EndOfData,
                    );
                }
            }
        }

        let summary = self.handler.financial().summary();
        info!(
            instrument = %self.instrument,
            strategy = %self.strategy_name,
            bars = self.processed.len(),
            trades = summary.trade_count,
            capital = summary.current_capital,
            pnl = summary.cumulative_pnl,
            "simulation finished"
        );

        SimulationResult {
            ledger: self.handler.ledger(),
            open_positions: self.handler.open_positions().cloned().collect(),
            instrument: self.instrument,
            strategy: self.strategy_name,
            processed: self.processed,
            summary,
        }
    }

    /// Feed every bar in order, then [`finish`](Self::finish).
    pub fn run<I>(mut self, bars: I) -> Result<SimulationResult, ImatradeError>
    where
        I: IntoIterator<Item = Bar>,
    {
        for bar in bars {
            self.on_bar(bar)?;
        }
        Ok(self.finish())
    }
}
