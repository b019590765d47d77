//! Run parameters for one simulation: capital, risk, exit levels and the
//! ordering policies applied within a bar.

use crate::domain::bar::Trigger;
use crate::domain::error::ImatradeError;
use crate::domain::financial::{ExitLevel, FinancialManagement, SizingPolicy};

/// Order in which the four triggers are tried on a bar. The first trigger
/// whose signal is true is acted upon and the rest are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalPriority([Trigger; 4]);

impl SignalPriority {
    /// Accepts any permutation of the four triggers.
    pub fn new(order: &[Trigger]) -> Result<Self, ImatradeError> {
        let invalid = |reason: String| ImatradeError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "signal_priority".to_string(),
            reason,
        };
        let order: [Trigger; 4] = order
            .try_into()
            .map_err(|_| invalid(format!("expected 4 triggers, got {}", order.len())))?;
        for trigger in Trigger::ALL {
            if !order.contains(&trigger) {
                return Err(invalid(format!("missing {}", trigger.as_str())));
            }
        }
        Ok(SignalPriority(order))
    }

    pub fn triggers(&self) -> &[Trigger; 4] {
        &self.0
    }
}

impl Default for SignalPriority {
    fn default() -> Self {
        SignalPriority(Trigger::ALL)
    }
}

/// Whether stop-loss and take-profit levels are checked before or after the
/// rule-driven action of a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitCheckOrder {
    #[default]
    BeforeRules,
    AfterRules,
}

impl ExitCheckOrder {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "before_rules" => Some(ExitCheckOrder::BeforeRules),
            "after_rules" => Some(ExitCheckOrder::AfterRules),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fraction of current capital risked per trade.
    pub risk_per_trade: f64,
    pub stop_loss: Option<ExitLevel>,
    pub take_profit: Option<ExitLevel>,
    pub signal_priority: SignalPriority,
    pub exit_check: ExitCheckOrder,
    /// Close whatever is still open at the last bar's close.
    pub close_at_end: bool,
}

impl BacktestConfig {
    pub fn new(initial_capital: f64, risk_per_trade: f64) -> Self {
        BacktestConfig {
            initial_capital,
            risk_per_trade,
            stop_loss: None,
            take_profit: None,
            signal_priority: SignalPriority::default(),
            exit_check: ExitCheckOrder::default(),
            close_at_end: false,
        }
    }

    /// A fresh ledger for one run.
    pub fn financial(&self, sizing: SizingPolicy) -> FinancialManagement {
        let mut fm =
            FinancialManagement::new(self.initial_capital, self.risk_per_trade).with_sizing(sizing);
        if let Some(level) = self.stop_loss {
            fm = fm.with_stop_loss(level);
        }
        if let Some(level) = self.take_profit {
            fm = fm.with_take_profit(level);
        }
        fm
    }
}
