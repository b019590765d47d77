//! Divergence between a long and a short RSI.
//!
//! `value = rsi_long - rsi_short`. Positive values mean recent momentum is
//! weaker than the longer-term reading.

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{tail, wilder_rsi};

#[derive(Debug, Clone)]
pub struct RsiDivergence {
    name: String,
    short_period: usize,
    long_period: usize,
    signal_period: usize,
}

impl RsiDivergence {
    pub fn new(name: &str, short_period: usize, long_period: usize, signal_period: usize) -> Self {
        RsiDivergence {
            name: name.to_string(),
            short_period,
            long_period,
            signal_period,
        }
    }
}

impl Indicator for RsiDivergence {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.signal_period
            .max(self.long_period + 1)
            .max(self.short_period + 1)
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.window_size())?;
        let rsi_short = wilder_rsi(window, self.short_period)?;
        let rsi_long = wilder_rsi(window, self.long_period)?;
        Some(output([
            ("rsi_short", rsi_short),
            ("rsi_long", rsi_long),
            ("value", rsi_long - rsi_short),
        ]))
    }
}
