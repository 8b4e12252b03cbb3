//! Volume and rolling-extreme helpers.

use crate::domain::Bar;
use crate::error::DataError;

use super::require_bars;

/// Last bar's volume relative to the mean of the preceding `period` bars.
///
/// A value of 1.5 means the decision bar traded 150% of recent average
/// volume. Lookback: period + 1 bars.
pub fn relative_volume(bars: &[Bar], period: usize) -> Result<f64, DataError> {
    assert!(period >= 1, "volume period must be >= 1");
    require_bars(bars.len(), period + 1)?;

    let last = bars[bars.len() - 1].volume as f64;
    let prior = &bars[bars.len() - 1 - period..bars.len() - 1];
    let avg: f64 = prior.iter().map(|b| b.volume as f64).sum::<f64>() / period as f64;
    if avg <= 0.0 {
        return Err(DataError::Malformed {
            reason: "zero average volume over lookback".into(),
        });
    }
    Ok(last / avg)
}

/// Highest high over the last `period` bars.
pub fn rolling_high(bars: &[Bar], period: usize) -> Result<f64, DataError> {
    assert!(period >= 1, "rolling window must be >= 1");
    require_bars(bars.len(), period)?;
    Ok(bars[bars.len() - period..]
        .iter()
        .map(|b| b.high)
        .fold(f64::MIN, f64::max))
}

/// Lowest low over the last `period` bars.
pub fn rolling_low(bars: &[Bar], period: usize) -> Result<f64, DataError> {
    assert!(period >= 1, "rolling window must be >= 1");
    require_bars(bars.len(), period)?;
    Ok(bars[bars.len() - period..]
        .iter()
        .map(|b| b.low)
        .fold(f64::MAX, f64::min))
}
