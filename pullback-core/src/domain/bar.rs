//! Bar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// OHLCV bar for a single symbol over one bar interval.
///
/// Bars are immutable once recorded. A per-instrument series is ordered by
/// strictly increasing timestamp with no duplicates; [`validate_series`]
/// enforces this at the data boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Bar {
    /// Basic OHLCV sanity check: finite fields, high >= low, high/low
    /// bracket open and close, positive prices.
    pub fn is_sane(&self) -> bool {
        let finite = self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite();
        finite
            && self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Validate an ordered bar series: every bar sane, timestamps strictly
/// increasing, no duplicates.
pub fn validate_series(bars: &[Bar]) -> Result<(), DataError> {
    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(DataError::Malformed {
                reason: format!("bar {i} for {} fails sanity check", bar.symbol),
            });
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(DataError::Malformed {
                reason: format!(
                    "bar {i} for {} is not strictly after its predecessor",
                    bar.symbol
                ),
            });
        }
    }
    Ok(())
}
