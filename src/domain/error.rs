//! Domain error types.
//!
//! Configuration errors are raised while a run is being assembled and never
//! once the bar loop has started. Domain errors surface from condition
//! evaluation and abort the current run.

use super::position::Direction;

/// A parse error with position information for condition expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for imatrade.
#[derive(Debug, thiserror::Error)]
pub enum ImatradeError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("condition '{condition}': {source}")]
    RuleParse {
        condition: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid rule: {reason}")]
    RuleInvalid { reason: String },

    #[error("unknown indicator type '{name}'")]
    UnknownIndicator { name: String },

    #[error("stop-loss is required for risk-based position sizing")]
    MissingStopLoss,

    #[error("entry price {entry_price} equals stop-loss {stop_loss}; position size is undefined")]
    InvalidStopDistance { entry_price: f64, stop_loss: f64 },

    #[error("{level} {price} is on the wrong side of a {direction} entry at {entry_price}")]
    ExitLevelWrongSide {
        level: &'static str,
        direction: Direction,
        entry_price: f64,
        price: f64,
    },

    #[error("condition '{condition}': operand '{operand}' is neither a known field nor a number")]
    UnresolvedOperand { condition: String, operand: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("no data for {instrument}")]
    NoData { instrument: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ImatradeError {
    /// True for errors caused by a bad strategy or backtest definition.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ImatradeError::ConfigParse { .. }
                | ImatradeError::ConfigMissing { .. }
                | ImatradeError::ConfigInvalid { .. }
                | ImatradeError::RuleParse { .. }
                | ImatradeError::RuleInvalid { .. }
                | ImatradeError::UnknownIndicator { .. }
                | ImatradeError::MissingStopLoss
                | ImatradeError::InvalidStopDistance { .. }
                | ImatradeError::ExitLevelWrongSide { .. }
        )
    }

    /// True for errors raised while evaluating rules against a bar.
    pub fn is_domain(&self) -> bool {
        matches!(self, ImatradeError::UnresolvedOperand { .. })
    }
}

impl From<&ImatradeError> for std::process::ExitCode {
    fn from(err: &ImatradeError) -> Self {
        let code: u8 = match err {
            ImatradeError::Io(_) => 1,
            ImatradeError::ConfigParse { .. }
            | ImatradeError::ConfigMissing { .. }
            | ImatradeError::ConfigInvalid { .. }
            | ImatradeError::UnknownIndicator { .. }
            | ImatradeError::MissingStopLoss
            | ImatradeError::InvalidStopDistance { .. }
            | ImatradeError::ExitLevelWrongSide { .. } => 2,
            ImatradeError::RuleParse { .. } | ImatradeError::RuleInvalid { .. } => 4,
            ImatradeError::Data { .. } | ImatradeError::NoData { .. } => 5,
            ImatradeError::UnresolvedOperand { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
