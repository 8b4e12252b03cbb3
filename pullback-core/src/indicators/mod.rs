//! Indicator library — pure, deterministic functions of a trailing bar window.
//!
//! Every function treats its input slice as the trailing window ending at
//! the decision bar and returns the indicator value at that bar. Calls with
//! fewer bars than the required lookback fail with
//! [`DataError::Insufficient`]; nothing here has side effects, so the
//! functions are safe to call concurrently for different instruments.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ma;
pub mod rsi;
pub mod snapshot;
pub mod volume;

pub use adx::adx;
pub use atr::atr;
pub use bollinger::{bollinger, BollingerBands};
pub use ma::{ema, ema_pair, sma};
pub use rsi::rsi;
pub use snapshot::{IndicatorParams, Snapshot};
pub use volume::{relative_volume, rolling_high, rolling_low};

use crate::error::DataError;

/// Shared lookback guard: `have` bars against a `need` minimum.
pub(crate) fn require_bars(have: usize, need: usize) -> Result<(), DataError> {
    if have < need {
        Err(DataError::Insufficient { have, need })
    } else {
        Ok(())
    }
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev close (or close for the first
/// bar), high = max(open, close) + 1.0, low = min(open, close) - 1.0,
/// volume = 1000, timestamps five minutes apart.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<crate::domain::Bar> {
    make_bars_with_volume(closes, &vec![1000; closes.len()])
}

#[cfg(test)]
pub fn make_bars_with_volume(closes: &[f64], volumes: &[u64]) -> Vec<crate::domain::Bar> {
    use crate::domain::Bar;
    use chrono::TimeZone;
    let base = chrono::Utc
        .with_ymd_and_hms(2024, 1, 2, 14, 30, 0)
        .unwrap();
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| {
            let open = if i == 0 { close } else { closes[i - 1] };
            let high = open.max(close) + 1.0;
            let low = open.min(close) - 1.0;
            Bar {
                symbol: "TEST".to_string(),
                timestamp: base + chrono::Duration::minutes(5 * i as i64),
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
