//! Shared numeric helpers for windowed indicator calculations.
//!
//! All helpers take prices oldest-first.

/// Last `n` values, or `None` when fewer than `n` are available.
pub fn tail(values: &[f64], n: usize) -> Option<&[f64]> {
    if n == 0 || values.len() < n {
        return None;
    }
    Some(&values[values.len() - n..])
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by N).
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

pub fn highest(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn lowest(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

/// (highest + lowest) / 2
pub fn midpoint(values: &[f64]) -> f64 {
    (highest(values) + lowest(values)) / 2.0
}

/// EMA seeded with the SMA of the first `period` values.
///
/// The result holds one value per input position from `period - 1`
/// onwards, so its length is `values.len() - period + 1`. Empty when there
/// are fewer than `period` values.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut ema = mean(&values[..period]);
    out.push(ema);
    for value in &values[period..] {
        ema = value * k + ema * (1.0 - k);
        out.push(ema);
    }
    out
}

/// Wilder RSI over every price change in `closes`.
///
/// The first `period` changes seed the averages with a simple mean, later
/// changes apply Wilder smoothing. Needs at least `period + 1` closes.
/// avg_loss == 0 yields 100.
pub fn wilder_rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let (seed, rest) = changes.split_at(period);

    let mut avg_gain = seed.iter().filter(|&&c| c > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = seed.iter().filter(|&&c| c < 0.0).map(|c| -c).sum::<f64>() / period as f64;

    for &change in rest {
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tail_takes_most_recent() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(tail(&values, 2), Some(&[3.0, 4.0][..]));
        assert_eq!(tail(&values, 5), None);
        assert_eq!(tail(&values, 0), None);
    }

    #[test]
    fn stddev_is_population() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(population_stddev(&values), 2.0);
    }

    #[test]
    fn extremes_and_midpoint() {
        let values = [3.0, 9.0, 1.0, 5.0];
        assert_relative_eq!(highest(&values), 9.0);
        assert_relative_eq!(lowest(&values), 1.0);
        assert_relative_eq!(midpoint(&values), 5.0);
    }

    #[test]
    fn ema_seed_is_sma() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ema = ema_series(&values, 3);
        assert_eq!(ema.len(), 3);
        assert_relative_eq!(ema[0], 2.0);
        // k = 0.5: 4*0.5 + 2*0.5 = 3, 5*0.5 + 3*0.5 = 4
        assert_relative_eq!(ema[1], 3.0);
        assert_relative_eq!(ema[2], 4.0);
    }

    #[test]
    fn ema_short_input_is_empty() {
        assert!(ema_series(&[1.0, 2.0], 3).is_empty());
    }

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64).collect();
        assert_relative_eq!(wilder_rsi(&closes, 14).unwrap(), 100.0);
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (0..15).map(|i| 100.0 - i as f64).collect();
        assert_relative_eq!(wilder_rsi(&closes, 14).unwrap(), 0.0);
    }

    #[test]
    fn rsi_needs_period_plus_one() {
        let closes = vec![100.0; 14];
        assert!(wilder_rsi(&closes, 14).is_none());
    }

    #[test]
    fn rsi_balanced_moves_is_fifty() {
        let closes = [10.0, 11.0, 10.0, 11.0, 10.0];
        assert_relative_eq!(wilder_rsi(&closes, 4).unwrap(), 50.0);
    }
}
