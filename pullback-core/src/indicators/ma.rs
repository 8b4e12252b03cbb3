//! Moving averages: SMA and EMA over close prices.

use crate::domain::Bar;
use crate::error::DataError;

use super::require_bars;

/// Simple moving average of the last `period` closes.
pub fn sma(bars: &[Bar], period: usize) -> Result<f64, DataError> {
    assert!(period >= 1, "SMA period must be >= 1");
    require_bars(bars.len(), period)?;
    let window = &bars[bars.len() - period..];
    let sum: f64 = window.iter().map(|b| b.close).sum();
    Ok(sum / period as f64)
}

/// Exponential moving average at the last bar.
///
/// Seeded with the SMA of the first `period` closes of the window, then
/// smoothed recursively with alpha = 2 / (period + 1).
pub fn ema(bars: &[Bar], period: usize) -> Result<f64, DataError> {
    assert!(period >= 1, "EMA period must be >= 1");
    require_bars(bars.len(), period)?;

    let seed: f64 = bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64;
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut value = seed;
    for bar in &bars[period..] {
        value = alpha * bar.close + (1.0 - alpha) * value;
    }
    Ok(value)
}

/// EMA at the previous and the last bar, for crossover detection.
/// Needs one bar more than [`ema`].
pub fn ema_pair(bars: &[Bar], period: usize) -> Result<(f64, f64), DataError> {
    require_bars(bars.len(), period + 1)?;
    let series = ema_series(bars, period)?;
    let n = series.len();
    Ok((series[n - 2], series[n - 1]))
}

/// EMA values from the seed bar onward (index `period - 1` of the window).
fn ema_series(bars: &[Bar], period: usize) -> Result<Vec<f64>, DataError> {
    assert!(period >= 1, "EMA period must be >= 1");
    require_bars(bars.len(), period)?;

    let seed: f64 = bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64;
    let alpha = 2.0 / (period as f64 + 1.0);

    let mut series = Vec::with_capacity(bars.len() - period + 1);
    series.push(seed);
    let mut prev = seed;
    for bar in &bars[period..] {
        prev = alpha * bar.close + (1.0 - alpha) * prev;
        series.push(prev);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn sma_5_basic() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0]);
        // Last 5 closes: 12..16 -> mean 14
        assert_approx(sma(&bars, 5).unwrap(), 14.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_1_is_close() {
        let bars = make_bars(&[100.0, 200.0, 300.0]);
        assert_approx(sma(&bars, 1).unwrap(), 300.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_too_few_bars() {
        let bars = make_bars(&[10.0, 11.0]);
        let err = sma(&bars, 5).unwrap_err();
        assert_eq!(err, DataError::Insufficient { have: 2, need: 5 });
    }

    #[test]
    fn ema_constant_series_is_constant() {
        let bars = make_bars(&[50.0; 10]);
        assert_approx(ema(&bars, 4).unwrap(), 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_3_hand_computed() {
        // Seed = mean(10, 11, 12) = 11; alpha = 0.5
        // EMA after 13 = 0.5*13 + 0.5*11 = 12
        // EMA after 14 = 0.5*14 + 0.5*12 = 13
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        assert_approx(ema(&bars, 3).unwrap(), 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_pair_returns_consecutive_values() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let (prev, last) = ema_pair(&bars, 3).unwrap();
        assert_approx(prev, 12.0, DEFAULT_EPSILON);
        assert_approx(last, 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_pair_needs_period_plus_one() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        assert!(ema_pair(&bars, 3).is_err());
        assert!(ema(&bars, 3).is_ok());
    }

    #[test]
    fn ema_tracks_trend_above_sma() {
        // In a steady uptrend the EMA sits above the same-period SMA.
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let e = ema(&bars, 10).unwrap();
        let s = sma(&bars, 10).unwrap();
        assert!(e > s, "ema={e} should exceed sma={s} in an uptrend");
    }
}
