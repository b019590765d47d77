//! Stochastic oscillator on closing prices.
//!
//! %K = 100 × (close - lowest) / (highest - lowest) over `k_window` closes,
//! 50 when the range is flat. %D is the mean of the last `d_window` %K
//! values, so the window holds `k_window + d_window - 1` closes.

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{highest, lowest, mean, tail};

pub const DEFAULT_D_WINDOW: usize = 3;

#[derive(Debug, Clone)]
pub struct Stochastic {
    name: String,
    k_window: usize,
    d_window: usize,
}

impl Stochastic {
    pub fn new(name: &str, k_window: usize, d_window: usize) -> Self {
        Stochastic {
            name: name.to_string(),
            k_window,
            d_window,
        }
    }
}

fn percent_k(closes: &[f64]) -> f64 {
    let low = lowest(closes);
    let high = highest(closes);
    let last = closes[closes.len() - 1];
    if high == low {
        50.0
    } else {
        100.0 * (last - low) / (high - low)
    }
}

impl Indicator for Stochastic {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.k_window + self.d_window - 1
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.window_size())?;
        let ks: Vec<f64> = window.windows(self.k_window).map(percent_k).collect();
        let k = *ks.last()?;
        Some(output([("k", k), ("d", mean(&ks))]))
    }
}
