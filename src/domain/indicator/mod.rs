//! Windowed technical indicators.
//!
//! Every indicator follows the same contract: it declares a window length,
//! and given the most recent closing prices (oldest first) it either
//! produces named scalar outputs or abstains with `None` when the window is
//! shorter than declared. Indicators hold no state between calls; the
//! rolling window lives with the caller.

pub mod atr;
pub mod bollinger;
pub mod breakout;
pub mod ichimoku;
pub mod ma_crossover;
pub mod ma_envelope;
pub mod macd;
pub mod rsi;
pub mod rsi_divergence;
pub mod stochastic;

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::ImatradeError;

/// Named outputs of one indicator computation.
pub type IndicatorOutput = BTreeMap<String, f64>;

pub trait Indicator: fmt::Debug + Send {
    /// Configured name; output fields are merged as `<name>_<key>`.
    fn name(&self) -> &str;

    /// Number of closing prices needed before the indicator can compute.
    fn window_size(&self) -> usize;

    /// Compute from up to `window_size()` most recent closes. Extra leading
    /// values are ignored. Returns `None` when the window is too short.
    fn compute_for_window(&self, window: &[f64]) -> Option<IndicatorOutput>;
}

/// Declarative indicator definition: a name, a type and numeric parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSpec {
    pub name: String,
    pub kind: String,
    pub params: BTreeMap<String, f64>,
}

impl IndicatorSpec {
    pub fn new(name: &str, kind: &str) -> Self {
        IndicatorSpec {
            name: name.to_string(),
            kind: kind.to_string(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: f64) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    fn section(&self) -> String {
        format!("indicator.{}", self.name)
    }

    fn invalid(&self, key: &str, reason: &str) -> ImatradeError {
        ImatradeError::ConfigInvalid {
            section: self.section(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn param(&self, key: &str) -> Result<f64, ImatradeError> {
        self.params
            .get(key)
            .copied()
            .ok_or_else(|| ImatradeError::ConfigMissing {
                section: self.section(),
                key: key.to_string(),
            })
    }

    pub fn param_or(&self, key: &str, default: f64) -> f64 {
        self.params.get(key).copied().unwrap_or(default)
    }

    /// A strictly positive whole number of bars.
    pub fn period(&self, key: &str) -> Result<usize, ImatradeError> {
        let value = self.param(key)?;
        if value < 1.0 || value.fract() != 0.0 {
            return Err(self.invalid(key, "must be a positive whole number"));
        }
        Ok(value as usize)
    }

    fn period_or(&self, key: &str, default: usize) -> Result<usize, ImatradeError> {
        if self.params.contains_key(key) {
            self.period(key)
        } else {
            Ok(default)
        }
    }
}

/// Names accepted in the `type` key of an indicator definition.
pub const INDICATOR_TYPES: &[&str] = &[
    "ma_crossover",
    "rsi",
    "macd",
    "bollinger",
    "atr",
    "stochastic",
    "ichimoku",
    "breakout",
    "ma_envelope",
    "rsi_divergence",
];

/// Build a boxed indicator from its definition.
pub fn build_indicator(spec: &IndicatorSpec) -> Result<Box<dyn Indicator>, ImatradeError> {
    let name = spec.name.as_str();
    let indicator: Box<dyn Indicator> = match spec.kind.as_str() {
        "ma_crossover" => Box::new(ma_crossover::MaCrossover::new(
            name,
            spec.period("short_window")?,
            spec.period("long_window")?,
        )),
        "rsi" => Box::new(rsi::Rsi::new(
            name,
            spec.period("rsi_period")?,
            spec.param_or("overbought", rsi::DEFAULT_OVERBOUGHT),
            spec.param_or("oversold", rsi::DEFAULT_OVERSOLD),
        )),
        "macd" => {
            let fast = spec.period("short_window")?;
            let slow = spec.period("long_window")?;
            if fast >= slow {
                return Err(spec.invalid("short_window", "must be below long_window"));
            }
            Box::new(macd::Macd::new(
                name,
                fast,
                slow,
                spec.period_or("signal_window", macd::DEFAULT_SIGNAL)?,
            ))
        }
        "bollinger" => {
            let num_std = spec.param_or("num_std", bollinger::DEFAULT_NUM_STD);
            if num_std <= 0.0 {
                return Err(spec.invalid("num_std", "must be positive"));
            }
            Box::new(bollinger::Bollinger::new(
                name,
                spec.period("window")?,
                num_std,
            ))
        }
        "atr" => Box::new(atr::Atr::new(name, spec.period("window")?)),
        "stochastic" => Box::new(stochastic::Stochastic::new(
            name,
            spec.period("k_window")?,
            spec.period_or("d_window", stochastic::DEFAULT_D_WINDOW)?,
        )),
        "ichimoku" => Box::new(ichimoku::Ichimoku::new(
            name,
            spec.period_or("conversion_line_period", ichimoku::DEFAULT_CONVERSION)?,
            spec.period_or("base_line_period", ichimoku::DEFAULT_BASE)?,
            spec.period_or("lagging_span_periods", ichimoku::DEFAULT_SPAN_B)?,
            spec.period_or("displacement", ichimoku::DEFAULT_DISPLACEMENT)?,
        )),
        "breakout" => Box::new(breakout::Breakout::new(name, spec.period("window")?)),
        "ma_envelope" => {
            let distance = spec.param("ma_distance")?;
            if !(0.0..1.0).contains(&distance) {
                return Err(spec.invalid("ma_distance", "must be in [0, 1)"));
            }
            Box::new(ma_envelope::MaEnvelope::new(
                name,
                spec.period("ma_period")?,
                distance,
            ))
        }
        "rsi_divergence" => Box::new(rsi_divergence::RsiDivergence::new(
            name,
            spec.period("short_rsi_period")?,
            spec.period("long_rsi_period")?,
            spec.period("signal_period")?,
        )),
        other => {
            return Err(ImatradeError::UnknownIndicator {
                name: other.to_string(),
            });
        }
    };
    Ok(indicator)
}

/// Build an output map from `(key, value)` pairs.
pub(crate) fn output<const N: usize>(pairs: [(&str, f64); N]) -> IndicatorOutput {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}
