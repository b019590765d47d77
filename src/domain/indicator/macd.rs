//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Diff = MACD Line - Signal Line
//!
//! EMAs are seeded with the SMA of their first `period` values. The window
//! holds `slow + signal - 1` closes: `slow` to seed the slow EMA, then enough
//! MACD points to seed the signal line.

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{ema_series, tail};

pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone)]
pub struct Macd {
    name: String,
    fast: usize,
    slow: usize,
    signal: usize,
}

impl Macd {
    /// `fast` must be below `slow`; the factory enforces it.
    pub fn new(name: &str, fast: usize, slow: usize, signal: usize) -> Self {
        Macd {
            name: name.to_string(),
            fast,
            slow,
            signal,
        }
    }
}

impl Indicator for Macd {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.slow + self.signal - 1
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.window_size())?;
        let ema_fast = ema_series(window, self.fast);
        let ema_slow = ema_series(window, self.slow);

        // ema_fast[i] is at window position i + fast - 1; line starts at slow - 1.
        let offset = self.slow - self.fast;
        let line: Vec<f64> = ema_slow
            .iter()
            .enumerate()
            .map(|(i, slow)| ema_fast[i + offset] - slow)
            .collect();

        let signal = *ema_series(&line, self.signal).last()?;
        let macd = *line.last()?;
        Some(output([
            ("line", macd),
            ("signal", signal),
            ("diff", macd - signal),
        ]))
    }
}
