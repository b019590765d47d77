//! Position lifecycle and trade bookkeeping.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::bar::Bar;

static NEXT_POSITION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    ExitSignal,
    EndOfData,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseReason::StopLoss => "stop loss",
            CloseReason::TakeProfit => "take profit",
            CloseReason::ExitSignal => "exit signal",
            CloseReason::EndOfData => "end of data",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeDetails {
    pub quantity: f64,
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub exit_price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: u64,
    pub instrument: String,
    pub direction: Direction,
    pub trade: TradeDetails,
    pub entry_time: NaiveDateTime,
    pub exit_time: Option<NaiveDateTime>,
    pub is_open: bool,
    pub close_reason: Option<CloseReason>,
    pub realized_pnl: Option<f64>,
    pub capital_after_close: Option<f64>,
}

impl Position {
    /// Create an open position with the next process-wide id.
    pub fn open(
        instrument: &str,
        direction: Direction,
        trade: TradeDetails,
        entry_time: NaiveDateTime,
    ) -> Self {
        Position {
            id: NEXT_POSITION_ID.fetch_add(1, Ordering::Relaxed),
            instrument: instrument.to_string(),
            direction,
            trade,
            entry_time,
            exit_time: None,
            is_open: true,
            close_reason: None,
            realized_pnl: None,
            capital_after_close: None,
        }
    }

    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    /// Capital tied up at entry.
    pub fn invested(&self) -> f64 {
        self.trade.quantity * self.trade.entry_price
    }

    pub fn pnl_at(&self, price: f64) -> f64 {
        self.direction.sign() * self.trade.quantity * (price - self.trade.entry_price)
    }

    /// Transition to closed. Returns the realized P&L, or `None` if the
    /// position was already closed (in which case nothing changes).
    pub fn close(
        &mut self,
        time: NaiveDateTime,
        price: f64,
        reason: CloseReason,
    ) -> Option<f64> {
        if !self.is_open {
            return None;
        }
        let pnl = self.pnl_at(price);
        self.is_open = false;
        self.exit_time = Some(time);
        self.trade.exit_price = Some(price);
        self.close_reason = Some(reason);
        self.realized_pnl = Some(pnl);
        Some(pnl)
    }

    /// Set once, after the ledger has been credited.
    pub(crate) fn record_capital_after_close(&mut self, capital: f64) {
        if !self.is_open && self.capital_after_close.is_none() {
            self.capital_after_close = Some(capital);
        }
    }

    /// Long: low <= stop. Short: high >= stop.
    pub fn stop_loss_hit(&self, bar: &Bar) -> bool {
        match self.trade.stop_loss {
            Some(stop) if self.is_long() => bar.low <= stop,
            Some(stop) => bar.high >= stop,
            None => false,
        }
    }

    /// Long: high >= target. Short: low <= target.
    pub fn take_profit_hit(&self, bar: &Bar) -> bool {
        match self.trade.take_profit {
            Some(target) if self.is_long() => bar.high >= target,
            Some(target) => bar.low <= target,
            None => false,
        }
    }

    /// Ledger row for a closed position.
    pub fn ledger_entry(&self) -> Option<LedgerEntry> {
        if self.is_open {
            return None;
        }
        Some(LedgerEntry {
            instrument: self.instrument.clone(),
            direction: self.direction,
            entry_time: self.entry_time,
            exit_time: self.exit_time?,
            quantity: self.trade.quantity,
            entry_price: self.trade.entry_price,
            exit_price: self.trade.exit_price?,
            pnl: self.realized_pnl?,
            capital_after_close: self.capital_after_close?,
            close_reason: self.close_reason?.to_string(),
        })
    }
}

/// Result of an open request.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    Opened { id: u64, quantity: f64 },
    /// A position for the same instrument and direction is already open.
    AlreadyOpen,
}

/// Result of a close request.
#[derive(Debug, Clone, PartialEq)]
pub enum CloseOutcome {
    Closed {
        id: u64,
        pnl: f64,
        reason: CloseReason,
    },
    /// No open position for that instrument and direction.
    NotOpen,
}

/// One closed trade as handed to reporting collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub instrument: String,
    pub direction: Direction,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl: f64,
    pub capital_after_close: f64,
    pub close_reason: String,
}
