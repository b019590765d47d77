//! ATR (Average True Range) on closing prices.
//!
//! Only closes reach the indicator window, so the true range of a bar is
//! taken as the absolute close-to-close move. The window holds
//! `period + 1` closes, giving `period` ranges whose mean is the ATR.

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{mean, tail};

#[derive(Debug, Clone)]
pub struct Atr {
    name: String,
    period: usize,
}

impl Atr {
    pub fn new(name: &str, period: usize) -> Self {
        Atr {
            name: name.to_string(),
            period,
        }
    }
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.period + 1
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.window_size())?;
        let ranges: Vec<f64> = window.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        Some(output([("value", mean(&ranges))]))
    }
}
