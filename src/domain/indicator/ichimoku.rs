//! Ichimoku cloud on closing prices.
//!
//! Each line is the midpoint of the highest and lowest close over its period:
//! - conversion_line: current, `conversion` closes
//! - base_line: current, `base` closes
//! - senkou_span_a: (conversion + base) / 2, as of `displacement` bars ago
//! - senkou_span_b: midpoint over `span_b` closes, as of `displacement` bars ago
//! - lagging_span: the close `displacement` bars ago

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{midpoint, tail};

pub const DEFAULT_CONVERSION: usize = 9;
pub const DEFAULT_BASE: usize = 26;
pub const DEFAULT_SPAN_B: usize = 52;
pub const DEFAULT_DISPLACEMENT: usize = 26;

#[derive(Debug, Clone)]
pub struct Ichimoku {
    name: String,
    conversion: usize,
    base: usize,
    span_b: usize,
    displacement: usize,
}

impl Ichimoku {
    pub fn new(
        name: &str,
        conversion: usize,
        base: usize,
        span_b: usize,
        displacement: usize,
    ) -> Self {
        Ichimoku {
            name: name.to_string(),
            conversion,
            base,
            span_b,
            displacement,
        }
    }

    fn longest_period(&self) -> usize {
        self.conversion.max(self.base).max(self.span_b)
    }
}

impl Indicator for Ichimoku {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.longest_period() + self.displacement
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.window_size())?;
        let shifted = &window[..window.len() - self.displacement];

        let conversion_line = midpoint(tail(window, self.conversion)?);
        let base_line = midpoint(tail(window, self.base)?);
        let past_conversion = midpoint(tail(shifted, self.conversion)?);
        let past_base = midpoint(tail(shifted, self.base)?);
        let senkou_span_b = midpoint(tail(shifted, self.span_b)?);
        let lagging_span = *shifted.last()?;

        Some(output([
            ("conversion_line", conversion_line),
            ("base_line", base_line),
            ("senkou_span_a", (past_conversion + past_base) / 2.0),
            ("senkou_span_b", senkou_span_b),
            ("lagging_span", lagging_span),
        ]))
    }
}
