//! RSI (Relative Strength Index).
//!
//! Wilder's smoothing over the price changes in the window:
//! - First average: simple mean of gains/losses over the first `period` changes
//! - Subsequent: avg = (prev_avg * (period - 1) + current) / period
//!
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss), or 100 when avg_loss == 0.
//! The window holds `period + 1` closes so that `period` changes exist.
//! The configured `overbought` / `oversold` levels are echoed as outputs so
//! conditions can compare against them by name.

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{tail, wilder_rsi};

pub const DEFAULT_OVERBOUGHT: f64 = 70.0;
pub const DEFAULT_OVERSOLD: f64 = 30.0;

#[derive(Debug, Clone)]
pub struct Rsi {
    name: String,
    period: usize,
    overbought: f64,
    oversold: f64,
}

impl Rsi {
    pub fn new(name: &str, period: usize, overbought: f64, oversold: f64) -> Self {
        Rsi {
            name: name.to_string(),
            period,
            overbought,
            oversold,
        }
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.period + 1
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.window_size())?;
        let value = wilder_rsi(window, self.period)?;
        Some(output([
            ("value", value),
            ("overbought", self.overbought),
            ("oversold", self.oversold),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rsi14() -> Rsi {
        Rsi::new("rsi", 14, DEFAULT_OVERBOUGHT, DEFAULT_OVERSOLD)
    }

    #[test]
    fn warmup_needs_period_plus_one() {
        let ind = rsi14();
        assert_eq!(ind.window_size(), 15);
        let prices: Vec<f64> = (0..14).map(|i| 100.0 + i as f64).collect();
        assert!(ind.compute_for_window(&prices).is_none());
    }

    #[test]
    fn all_gains_is_100() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        let out = rsi14().compute_for_window(&prices).unwrap();
        assert_relative_eq!(out["value"], 100.0);
    }

    #[test]
    fn all_losses_is_0() {
        let prices: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        let out = rsi14().compute_for_window(&prices).unwrap();
        assert_relative_eq!(out["value"], 0.0);
    }

    #[test]
    fn known_series_is_bullish() {
        let prices = [
            44.0, 44.25, 44.50, 43.75, 44.50, 44.25, 44.75, 45.25, 45.50, 45.25, 45.50, 46.0,
            46.25, 46.0, 46.50,
        ];
        let out = rsi14().compute_for_window(&prices).unwrap();
        assert!(out["value"] > 50.0 && out["value"] < 100.0);
    }

    #[test]
    fn levels_are_echoed() {
        let ind = Rsi::new("rsi", 3, 80.0, 20.0);
        let out = ind.compute_for_window(&[1.0, 2.0, 1.5, 2.5]).unwrap();
        assert_relative_eq!(out["overbought"], 80.0);
        assert_relative_eq!(out["oversold"], 20.0);
    }

    #[test]
    fn value_in_range() {
        let prices: Vec<f64> = (1..=40)
            .map(|i| 100.0 + (i as f64 % 7.0 - 3.0) * 2.0)
            .collect();
        let ind = rsi14();
        for end in ind.window_size()..=prices.len() {
            let value = ind.compute_for_window(&prices[..end]).unwrap()["value"];
            assert!((0.0..=100.0).contains(&value), "RSI {} out of range", value);
        }
    }
}
