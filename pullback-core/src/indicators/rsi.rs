//! Relative Strength Index (RSI).
//!
//! Wilder smoothing of average gains and losses:
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! Lookback: period + 1 bars (period price changes).
//! Edge cases: avg_loss == 0 -> 100; avg_gain == 0 -> 0; flat series -> 50.

use crate::domain::Bar;
use crate::error::DataError;

use super::require_bars;

/// RSI at the last bar of the window.
pub fn rsi(bars: &[Bar], period: usize) -> Result<f64, DataError> {
    assert!(period >= 1, "RSI period must be >= 1");
    require_bars(bars.len(), period + 1)?;

    let changes: Vec<f64> = bars
        .windows(2)
        .map(|pair| pair[1].close - pair[0].close)
        .collect();

    // Seed over the first `period` changes.
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for &ch in &changes[..period] {
        if ch > 0.0 {
            avg_gain += ch;
        } else {
            avg_loss -= ch;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;

    // Wilder smoothing over the remainder.
    let alpha = 1.0 / period as f64;
    for &ch in &changes[period..] {
        let gain = if ch > 0.0 { ch } else { 0.0 };
        let loss = if ch < 0.0 { -ch } else { 0.0 };
        avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
    }

    Ok(rsi_from_averages(avg_gain, avg_loss))
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0 // no movement
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars};

    #[test]
    fn rsi_all_gains() {
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0]);
        assert_approx(rsi(&bars, 3).unwrap(), 100.0, 1e-6);
    }

    #[test]
    fn rsi_all_losses() {
        let bars = make_bars(&[103.0, 102.0, 101.0, 100.0]);
        assert_approx(rsi(&bars, 3).unwrap(), 0.0, 1e-6);
    }

    #[test]
    fn rsi_flat_series() {
        let bars = make_bars(&[100.0; 5]);
        assert_approx(rsi(&bars, 3).unwrap(), 50.0, 1e-6);
    }

    #[test]
    fn rsi_mixed_hand_computed() {
        // Changes: +0.34, -0.25, -0.48
        // avg_gain = 0.34/3, avg_loss = 0.73/3
        // RSI = 100 - 100/(1 + 0.34/0.73)
        let bars = make_bars(&[44.0, 44.34, 44.09, 43.61]);
        let expected = 100.0 - 100.0 / (1.0 + 0.34 / 0.73);
        assert_approx(rsi(&bars, 3).unwrap(), expected, 1e-9);
    }

    #[test]
    fn rsi_bounds() {
        let bars = make_bars(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        let v = rsi(&bars, 3).unwrap();
        assert!((0.0..=100.0).contains(&v), "RSI out of bounds: {v}");
    }

    #[test]
    fn rsi_lookback() {
        let bars = make_bars(&[100.0, 101.0, 102.0]);
        let err = rsi(&bars, 3).unwrap_err();
        assert_eq!(err, DataError::Insufficient { have: 3, need: 4 });
    }
}
