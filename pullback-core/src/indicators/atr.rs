//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|).
//! ATR uses Wilder smoothing (EMA with alpha = 1/period), seeded with the
//! mean of the first `period` true ranges. The first bar of the window has
//! no previous close, so its TR is excluded from the seed; the lookback is
//! therefore `period + 1` bars.

use crate::domain::Bar;
use crate::error::DataError;

use super::require_bars;

/// ATR at the last bar of the window.
pub fn atr(bars: &[Bar], period: usize) -> Result<f64, DataError> {
    assert!(period >= 1, "ATR period must be >= 1");
    require_bars(bars.len(), period + 1)?;
    let tr = true_range_series(bars);
    // tr[0] is just high-low (no prev close); the Wilder seed starts at tr[1].
    Ok(wilder_smooth_last(&tr[1..], period))
}

/// True Range series. TR[0] = high[0] - low[0]; later bars use prev close.
pub(crate) fn true_range_series(bars: &[Bar]) -> Vec<f64> {
    let mut tr = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        if i == 0 {
            tr.push(bar.high - bar.low);
        } else {
            tr.push(bar.true_range(bars[i - 1].close));
        }
    }
    tr
}

/// Wilder-smoothed value at the end of `values`.
///
/// Seed: mean of the first `period` values. Then alpha = 1/period.
/// Callers must guarantee `values.len() >= period`.
pub(crate) fn wilder_smooth_last(values: &[f64], period: usize) -> f64 {
    debug_assert!(values.len() >= period);
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    let alpha = 1.0 / period as f64;
    let mut smoothed = seed;
    for &v in &values[period..] {
        smoothed = alpha * v + (1.0 - alpha) * smoothed;
    }
    smoothed
}

/// Full Wilder-smoothed series; indices before `period - 1` are NaN.
/// Used by the ADX pipeline, which smooths three series in lockstep.
pub(crate) fn wilder_smooth_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if n < period {
        return result;
    }
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;
    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in period..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};
    use chrono::TimeZone;

    fn make_ohlc_bars(data: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
        let base = chrono::Utc
            .with_ymd_and_hms(2024, 1, 2, 14, 30, 0)
            .unwrap();
        data.iter()
            .enumerate()
            .map(|(i, &(open, high, low, close))| Bar {
                symbol: "TEST".to_string(),
                timestamp: base + chrono::Duration::minutes(5 * i as i64),
                open,
                high,
                low,
                close,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn true_range_basic() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 105-95 = 10
            (102.0, 108.0, 100.0, 106.0), // TR = max(8, 6, 2) = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = max(9, 1, 8) = 9
        ]);
        let tr = true_range_series(&bars);
        assert_approx(tr[0], 10.0, DEFAULT_EPSILON);
        assert_approx(tr[1], 8.0, DEFAULT_EPSILON);
        assert_approx(tr[2], 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let bars = make_ohlc_bars(&[
            (98.0, 102.0, 97.0, 100.0),
            (110.0, 115.0, 108.0, 112.0), // TR = max(7, 15, 8) = 15
        ]);
        let tr = true_range_series(&bars);
        assert_approx(tr[1], 15.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_period_3() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),  // TR = 10 (excluded from seed)
            (102.0, 108.0, 100.0, 106.0), // TR = 8
            (106.0, 107.0, 98.0, 99.0),   // TR = 9
            (99.0, 103.0, 97.0, 101.0),   // TR = 6
            (101.0, 106.0, 100.0, 105.0), // TR = 6
        ]);
        // Seed = mean(8, 9, 6) = 23/3; next = (1/3)*6 + (2/3)*(23/3) = 64/9
        assert_approx(atr(&bars, 3).unwrap(), 64.0 / 9.0, DEFAULT_EPSILON);
    }

    #[test]
    fn atr_needs_period_plus_one_bars() {
        let bars = make_ohlc_bars(&[
            (100.0, 105.0, 95.0, 102.0),
            (102.0, 108.0, 100.0, 106.0),
            (106.0, 107.0, 98.0, 99.0),
        ]);
        let err = atr(&bars, 3).unwrap_err();
        assert_eq!(err, DataError::Insufficient { have: 3, need: 4 });
    }

    #[test]
    fn wilder_series_matches_last() {
        let values = [8.0, 9.0, 6.0, 6.0, 12.0];
        let series = wilder_smooth_series(&values, 3);
        assert!(series[0].is_nan());
        assert!(series[1].is_nan());
        assert_approx(
            *series.last().unwrap(),
            wilder_smooth_last(&values, 3),
            DEFAULT_EPSILON,
        );
    }
}
