//! Price breakout above the moving average.
//!
//! `breakout` is 1.0 when the latest close is above the window mean, else 0.0.

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{mean, tail};

#[derive(Debug, Clone)]
pub struct Breakout {
    name: String,
    window: usize,
}

impl Breakout {
    pub fn new(name: &str, window: usize) -> Self {
        Breakout {
            name: name.to_string(),
            window,
        }
    }
}

impl Indicator for Breakout {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.window
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.window)?;
        let ma = mean(window);
        let price = *window.last()?;
        let breakout = if price > ma { 1.0 } else { 0.0 };
        Some(output([("ma", ma), ("price", price), ("breakout", breakout)]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn close_above_mean_breaks_out() {
        let ind = Breakout::new("brk", 3);
        let out = ind.compute_for_window(&[1.0, 1.0, 4.0]).unwrap();
        assert_relative_eq!(out["ma"], 2.0);
        assert_relative_eq!(out["price"], 4.0);
        assert_relative_eq!(out["breakout"], 1.0);
    }

    #[test]
    fn close_at_mean_does_not() {
        let ind = Breakout::new("brk", 3);
        let out = ind.compute_for_window(&[2.0, 2.0, 2.0]).unwrap();
        assert_relative_eq!(out["breakout"], 0.0);
    }
}
