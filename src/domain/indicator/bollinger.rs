//! Bollinger Bands.
//!
//! - `mavg`: simple moving average over the window
//! - `hband`: mavg + num_std × stddev
//! - `lband`: mavg - num_std × stddev
//!
//! Stddev is the population standard deviation (divides by N, not N-1).

use super::{output, Indicator, IndicatorOutput};
use crate::domain::indicator_helpers::{mean, population_stddev, tail};

pub const DEFAULT_NUM_STD: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct Bollinger {
    name: String,
    window: usize,
    num_std: f64,
}

impl Bollinger {
    pub fn new(name: &str, window: usize, num_std: f64) -> Self {
        Bollinger {
            name: name.to_string(),
            window,
            num_std,
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn window_size(&self) -> usize {
        self.window
    }

    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput> {
        let window = tail(window, self.window)?;
        let middle = mean(window);
        let band = self.num_std * population_stddev(window);
        Some(output([
            ("hband", middle + band),
            ("mavg", middle),
            ("lband", middle - band),
        ]))
    }
}
