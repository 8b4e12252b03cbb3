//! ADX — Average Directional Index (Wilder).
//!
//! Steps:
//! 1. +DM and -DM from consecutive bars
//! 2. Wilder-smooth +DM, -DM, and TR (alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR); likewise -DI
//! 4. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 5. ADX = Wilder-smoothed DX
//!
//! Lookback: 2 * period + 1 bars (period for DI smoothing, then period for
//! ADX smoothing, plus one bar for the first directional move).

use crate::domain::Bar;
use crate::error::DataError;

use super::atr::{true_range_series, wilder_smooth_series};
use super::require_bars;

/// ADX at the last bar of the window.
pub fn adx(bars: &[Bar], period: usize) -> Result<f64, DataError> {
    assert!(period >= 1, "ADX period must be >= 1");
    require_bars(bars.len(), 2 * period + 1)?;

    let n = bars.len();

    // Directional movement; index 0 has no predecessor and stays zero,
    // aligned with TR[0] which the smoothing below skips.
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let high_diff = bars[i].high - bars[i - 1].high;
        let low_diff = bars[i - 1].low - bars[i].low;
        if high_diff > low_diff && high_diff > 0.0 {
            plus_dm[i] = high_diff;
        }
        if low_diff > high_diff && low_diff > 0.0 {
            minus_dm[i] = low_diff;
        }
    }

    let tr = true_range_series(bars);
    // Skip index 0 everywhere: TR[0] has no previous close.
    let smooth_tr = wilder_smooth_series(&tr[1..], period);
    let smooth_plus = wilder_smooth_series(&plus_dm[1..], period);
    let smooth_minus = wilder_smooth_series(&minus_dm[1..], period);

    let mut dx = vec![f64::NAN; smooth_tr.len()];
    for i in 0..smooth_tr.len() {
        if smooth_tr[i].is_nan() || smooth_tr[i] == 0.0 {
            continue;
        }
        let plus_di = 100.0 * smooth_plus[i] / smooth_tr[i];
        let minus_di = 100.0 * smooth_minus[i] / smooth_tr[i];
        let di_sum = plus_di + minus_di;
        dx[i] = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
    }

    // The first `period - 1` DX entries are NaN warmup from DI smoothing;
    // the ADX seed starts after them.
    let valid_dx = &dx[period - 1..];
    if valid_dx.iter().any(|v| v.is_nan()) || valid_dx.len() < period {
        // A degenerate window (e.g. zero true range throughout) cannot
        // produce a directional reading.
        return Err(DataError::Malformed {
            reason: "degenerate window: no directional movement computable".into(),
        });
    }

    let adx_series = wilder_smooth_series(valid_dx, period);
    match adx_series.last() {
        Some(&adx) if !adx.is_nan() => Ok(adx),
        _ => Err(DataError::Malformed {
            reason: "degenerate window: no directional reading".into(),
        }),
    }
}
