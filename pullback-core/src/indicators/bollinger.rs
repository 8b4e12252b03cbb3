//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! Middle: SMA(close, period). Upper/lower: middle +/- mult * stddev.
//! Uses population stddev (divide by N). Lookback: period.

use crate::domain::Bar;
use crate::error::DataError;

use super::require_bars;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    /// %B: where `price` sits inside the bands. 0 at the lower band,
    /// 1 at the upper. Returns 0.5 when the bands have zero width.
    pub fn percent_b(&self, price: f64) -> f64 {
        let width = self.upper - self.lower;
        if width <= 0.0 {
            0.5
        } else {
            (price - self.lower) / width
        }
    }
}

/// Bollinger bands over the last `period` closes.
pub fn bollinger(bars: &[Bar], period: usize, multiplier: f64) -> Result<BollingerBands, DataError> {
    assert!(period >= 1, "Bollinger period must be >= 1");
    require_bars(bars.len(), period)?;

    let window = &bars[bars.len() - period..];
    let mean: f64 = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
    let variance: f64 = window
        .iter()
        .map(|b| {
            let d = b.close - mean;
            d * d
        })
        .sum::<f64>()
        / period as f64;
    let stddev = variance.sqrt();

    Ok(BollingerBands {
        upper: mean + multiplier * stddev,
        middle: mean,
        lower: mean - multiplier * stddev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn bollinger_hand_computed() {
        // Closes 10, 12, 14: mean = 12, pop. variance = 8/3
        let bars = make_bars(&[10.0, 12.0, 14.0]);
        let bands = bollinger(&bars, 3, 2.0).unwrap();
        let stddev = (8.0f64 / 3.0).sqrt();
        assert_approx(bands.middle, 12.0, DEFAULT_EPSILON);
        assert_approx(bands.upper, 12.0 + 2.0 * stddev, DEFAULT_EPSILON);
        assert_approx(bands.lower, 12.0 - 2.0 * stddev, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_flat_series_collapses() {
        let bars = make_bars(&[100.0; 5]);
        let bands = bollinger(&bars, 5, 2.0).unwrap();
        assert_approx(bands.upper, 100.0, DEFAULT_EPSILON);
        assert_approx(bands.lower, 100.0, DEFAULT_EPSILON);
        // Zero-width bands report the midpoint.
        assert_approx(bands.percent_b(100.0), 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn percent_b_at_bands() {
        let bands = BollingerBands {
            upper: 110.0,
            middle: 100.0,
            lower: 90.0,
        };
        assert_approx(bands.percent_b(90.0), 0.0, DEFAULT_EPSILON);
        assert_approx(bands.percent_b(110.0), 1.0, DEFAULT_EPSILON);
        assert_approx(bands.percent_b(100.0), 0.5, DEFAULT_EPSILON);
    }

    #[test]
    fn bollinger_too_few_bars() {
        let bars = make_bars(&[10.0, 12.0]);
        assert!(bollinger(&bars, 3, 2.0).is_err());
    }
}
