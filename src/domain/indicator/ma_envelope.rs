//! Moving-average envelope: bands at a fixed fraction above and below the SMA.

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{mean, tail};

#[derive(Debug, Clone)]
pub struct MaEnvelope {
    name: String,
    period: usize,
    distance: f64,
}

impl MaEnvelope {
    /// `distance` is a fraction, e.g. 0.02 for bands 2% from the average.
    pub fn new(name: &str, period: usize, distance: f64) -> Self {
        MaEnvelope {
            name: name.to_string(),
            period,
            distance,
        }
    }
}

impl Indicator for MaEnvelope {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.period
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.period)?;
        let ma = mean(window);
        Some(output([
            ("ma", ma),
            ("price", *window.last()?),
            ("upper_band", ma * (1.0 + self.distance)),
            ("lower_band", ma * (1.0 - self.distance)),
        ]))
    }
}
