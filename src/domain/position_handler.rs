//! Open/closed position book for one simulation run.
//!
//! Per (instrument, direction) the handler walks no-position -> open ->
//! closed; a fresh cycle starts a new [`Position`]. At most one position is
//! open per pair at any time.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::bar::Bar;
use super::error::ImatradeError;
use super::financial::FinancialManagement;
use super::position::{
    CloseOutcome, CloseReason, Direction, LedgerEntry, OpenOutcome, Position, TradeDetails,
};

#[derive(Debug, Clone)]
pub struct PositionHandler {
    financial: FinancialManagement,
    open: BTreeMap<(String, Direction), Position>,
    closed: Vec<Position>,
}

impl PositionHandler {
    pub fn new(financial: FinancialManagement) -> Self {
        PositionHandler {
            financial,
            open: BTreeMap::new(),
            closed: Vec::new(),
        }
    }

    pub fn financial(&self) -> &FinancialManagement {
        &self.financial
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.open.values()
    }

    pub fn open_position_for(&self, instrument: &str, direction: Direction) -> Option<&Position> {
        self.open.get(&(instrument.to_string(), direction))
    }

    pub fn has_open(&self, instrument: &str, direction: Direction) -> bool {
        self.open_position_for(instrument, direction).is_some()
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    pub fn closed_positions(&self) -> &[Position] {
        &self.closed
    }

    /// Closed positions in closing order, as ledger rows.
    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.closed
            .iter()
            .filter_map(Position::ledger_entry)
            .collect()
    }

    /// Open a position at `price`, sized by the financial ledger.
    ///
    /// Returns [`OpenOutcome::AlreadyOpen`] without touching any state when
    /// the pair already has an open position. Sizing failures are errors.
    pub fn open_position(
        &mut self,
        time: NaiveDateTime,
        instrument: &str,
        direction: Direction,
        price: f64,
    ) -> Result<OpenOutcome, ImatradeError> {
        let key = (instrument.to_string(), direction);
        if self.open.contains_key(&key) {
            warn!(%instrument, %direction, %time, "open skipped: position already open");
            return Ok(OpenOutcome::AlreadyOpen);
        }

        let (stop_loss, take_profit) = self.financial.exit_prices(direction, price)?;
        let quantity = self.financial.position_size(direction, price)?;
        let trade = TradeDetails {
            quantity,
            entry_price: price,
            stop_loss,
            take_profit,
            exit_price: None,
        };
        let position = Position::open(instrument, direction, trade, time);
        self.financial.update_capital(-position.invested());

        info!(
            id = position.id,
            %instrument,
            %direction,
            %time,
            price,
            quantity,
            stop_loss = ?position.trade.stop_loss,
            take_profit = ?position.trade.take_profit,
            "position opened"
        );

        let id = position.id;
        self.open.insert(key, position);
        Ok(OpenOutcome::Opened { id, quantity })
    }

    /// Close the open position for the pair at `price`.
    ///
    /// Returns [`CloseOutcome::NotOpen`] when there is nothing to close.
    pub fn close_position(
        &mut self,
        time: NaiveDateTime,
        instrument: &str,
        direction: Direction,
        price: f64,
        reason: CloseReason,
    ) -> CloseOutcome {
        let Some(mut position) = self.open.remove(&(instrument.to_string(), direction)) else {
            warn!(%instrument, %direction, %time, "close skipped: no open position");
            return CloseOutcome::NotOpen;
        };

        let Some(pnl) = position.close(time, price, reason) else {
            // Only open positions live in the open book.
            self.closed.push(position);
            return CloseOutcome::NotOpen;
        };

        self.financial.update_capital(position.invested());
        self.financial.close_trade(pnl);
        position.record_capital_after_close(self.financial.current_capital);

        info!(
            id = position.id,
            %instrument,
            %direction,
            %time,
            price,
            pnl,
            %reason,
            capital = self.financial.current_capital,
            "position closed"
        );

        let id = position.id;
        self.closed.push(position);
        CloseOutcome::Closed { id, pnl, reason }
    }

    /// Close every open position on `instrument` whose stop-loss or
    /// take-profit lies inside the bar's range. The stop is checked first
    /// when both are inside. Fills happen at the threshold price.
    ///
    /// Positions entered at the bar's own timestamp are skipped: they were
    /// filled at the close, after the range was traded.
    pub fn check_stop_loss_and_take_profit(
        &mut self,
        instrument: &str,
        bar: &Bar,
    ) -> Vec<CloseOutcome> {
        let triggered: Vec<(Direction, f64, CloseReason)> = self
            .open
            .values()
            .filter(|pos| pos.instrument == instrument && pos.entry_time < bar.timestamp)
            .filter_map(|pos| {
                if pos.stop_loss_hit(bar) {
                    Some((pos.direction, pos.trade.stop_loss?, CloseReason::StopLoss))
                } else if pos.take_profit_hit(bar) {
                    Some((pos.direction, pos.trade.take_profit?, CloseReason::TakeProfit))
                } else {
                    None
                }
            })
            .collect();

        triggered
            .into_iter()
            .map(|(direction, price, reason)| {
                self.close_position(bar.timestamp, instrument, direction, price, reason)
            })
            .collect()
    }
}
