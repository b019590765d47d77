//! Moving-average crossover.
//!
//! Outputs `short_ma`, `long_ma` and `diff = short_ma - long_ma`. A sign
//! change of `diff` between bars marks a crossover.

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{mean, tail};

#[derive(Debug, Clone)]
pub struct MaCrossover {
    name: String,
    short_window: usize,
    long_window: usize,
}

impl MaCrossover {
    pub fn new(name: &str, short_window: usize, long_window: usize) -> Self {
        MaCrossover {
            name: name.to_string(),
            short_window,
            long_window,
        }
    }
}

impl Indicator for MaCrossover {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.short_window.max(self.long_window)
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.window_size())?;
        let short_ma = mean(tail(window, self.short_window)?);
        let long_ma = mean(tail(window, self.long_window)?);
        Some(output([
            ("short_ma", short_ma),
            ("long_ma", long_ma),
            ("diff", short_ma - long_ma),
        ]))
    }
}
