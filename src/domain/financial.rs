//! Account ledger: capital, risk policy, position sizing and trade counts.

use super::error::ImatradeError;
use super::position::Direction;

/// How far from the entry a stop-loss or take-profit sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExitLevel {
    /// Absolute price level, used as-is for both directions.
    Price(f64),
    /// Percentage of the entry price, mirrored for shorts.
    Percent(f64),
}

impl ExitLevel {
    /// Stop level: below entry for longs, above for shorts.
    pub fn stop_price(self, direction: Direction, entry_price: f64) -> f64 {
        match self {
            ExitLevel::Price(p) => p,
            ExitLevel::Percent(pct) => entry_price * (1.0 - direction.sign() * pct / 100.0),
        }
    }

    /// Target level: above entry for longs, below for shorts.
    pub fn target_price(self, direction: Direction, entry_price: f64) -> f64 {
        match self {
            ExitLevel::Price(p) => p,
            ExitLevel::Percent(pct) => entry_price * (1.0 + direction.sign() * pct / 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SizingPolicy {
    /// risk_amount / |entry - stop|, risk_amount = current_capital * risk_per_trade.
    RiskBased,
    /// Same quantity for every trade.
    Fixed(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinancialManagement {
    pub initial_capital: f64,
    pub current_capital: f64,
    pub risk_per_trade: f64,
    pub stop_loss: Option<ExitLevel>,
    pub take_profit: Option<ExitLevel>,
    pub sizing: SizingPolicy,
    pub cumulative_pnl: f64,
    pub trade_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
}

/// Snapshot of the ledger for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct FinancialSummary {
    pub initial_capital: f64,
    pub current_capital: f64,
    pub risk_per_trade: f64,
    pub cumulative_pnl: f64,
    pub trade_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub breakeven_count: usize,
}

impl FinancialManagement {
    pub fn new(initial_capital: f64, risk_per_trade: f64) -> Self {
        FinancialManagement {
            initial_capital,
            current_capital: initial_capital,
            risk_per_trade,
            stop_loss: None,
            take_profit: None,
            sizing: SizingPolicy::RiskBased,
            cumulative_pnl: 0.0,
            trade_count: 0,
            win_count: 0,
            loss_count: 0,
        }
    }

    pub fn with_stop_loss(mut self, level: ExitLevel) -> Self {
        self.stop_loss = Some(level);
        self
    }

    pub fn with_take_profit(mut self, level: ExitLevel) -> Self {
        self.take_profit = Some(level);
        self
    }

    pub fn with_sizing(mut self, sizing: SizingPolicy) -> Self {
        self.sizing = sizing;
        self
    }

    /// Setup-time check that sizing can be performed at all.
    pub fn validate(&self) -> Result<(), ImatradeError> {
        if self.sizing == SizingPolicy::RiskBased && self.stop_loss.is_none() {
            return Err(ImatradeError::MissingStopLoss);
        }
        Ok(())
    }

    pub fn risk_amount(&self) -> f64 {
        self.current_capital * self.risk_per_trade
    }

    pub fn stop_loss_price(&self, direction: Direction, entry_price: f64) -> Option<f64> {
        self.stop_loss
            .map(|level| level.stop_price(direction, entry_price))
    }

    pub fn take_profit_price(&self, direction: Direction, entry_price: f64) -> Option<f64> {
        self.take_profit
            .map(|level| level.target_price(direction, entry_price))
    }

    /// Stop and target for an entry, rejecting levels that sit past the entry
    /// on the profitable (stop) or losing (target) side.
    pub fn exit_prices(
        &self,
        direction: Direction,
        entry_price: f64,
    ) -> Result<(Option<f64>, Option<f64>), ImatradeError> {
        let sign = direction.sign();
        let stop_loss = self.stop_loss_price(direction, entry_price);
        if let Some(price) = stop_loss {
            if (entry_price - price) * sign < 0.0 {
                return Err(ImatradeError::ExitLevelWrongSide {
                    level: "stop-loss",
                    direction,
                    entry_price,
                    price,
                });
            }
        }
        let take_profit = self.take_profit_price(direction, entry_price);
        if let Some(price) = take_profit {
            if (price - entry_price) * sign < 0.0 {
                return Err(ImatradeError::ExitLevelWrongSide {
                    level: "take-profit",
                    direction,
                    entry_price,
                    price,
                });
            }
        }
        Ok((stop_loss, take_profit))
    }

    pub(crate) fn position_size(
        &self,
        direction: Direction,
        entry_price: f64,
    ) -> Result<f64, ImatradeError> {
        match self.sizing {
            SizingPolicy::Fixed(quantity) => Ok(quantity),
            SizingPolicy::RiskBased => {
                let stop_loss = self
                    .stop_loss_price(direction, entry_price)
                    .ok_or(ImatradeError::MissingStopLoss)?;
                let distance = (entry_price - stop_loss).abs();
                if distance == 0.0 {
                    return Err(ImatradeError::InvalidStopDistance {
                        entry_price,
                        stop_loss,
                    });
                }
                Ok(self.risk_amount() / distance)
            }
        }
    }

    /// The only mutator of `current_capital` besides `close_trade`.
    pub fn update_capital(&mut self, delta: f64) {
        self.current_capital += delta;
    }

    /// Book a finished trade. Zero P&L counts as neither win nor loss.
    pub fn close_trade(&mut self, pnl: f64) {
        self.current_capital += pnl;
        self.cumulative_pnl += pnl;
        self.trade_count += 1;
        if pnl > 0.0 {
            self.win_count += 1;
        } else if pnl < 0.0 {
            self.loss_count += 1;
        }
    }

    pub fn summary(&self) -> FinancialSummary {
        FinancialSummary {
            initial_capital: self.initial_capital,
            current_capital: self.current_capital,
            risk_per_trade: self.risk_per_trade,
            cumulative_pnl: self.cumulative_pnl,
            trade_count: self.trade_count,
            win_count: self.win_count,
            loss_count: self.loss_count,
            breakeven_count: self.trade_count - self.win_count - self.loss_count,
        }
    }
}
