//! Aligned market history for replay.
//!
//! A [`MarketHistory`] holds one shared timeline plus a bar series per
//! instrument and one for the benchmark, all index-aligned. Alignment is
//! validated once at construction; everything downstream can then slice
//! by index without re-checking timestamps.

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{DateTime, Utc};
use thiserror::Error;

use pullback_core::domain::{validate_series, Bar};
use pullback_core::error::DataError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HistoryError {
    #[error("history is empty")]
    Empty,

    #[error("series for {symbol} has {have} bars, timeline has {need}")]
    LengthMismatch {
        symbol: String,
        have: usize,
        need: usize,
    },

    #[error("series for {symbol} departs from the timeline at index {index}")]
    Misaligned { symbol: String, index: usize },

    /// The benchmark defines the shared timeline; a corrupt or unordered
    /// benchmark invalidates the whole history, unlike an instrument bar,
    /// which only aborts the replay windows that touch it.
    #[error("benchmark series invalid: {0}")]
    Benchmark(#[from] DataError),
}

/// Index-aligned bar history across a benchmark and a set of instruments.
#[derive(Debug, Clone)]
pub struct MarketHistory {
    timestamps: Vec<DateTime<Utc>>,
    benchmark: Vec<Bar>,
    instruments: BTreeMap<String, Vec<Bar>>,
}

impl MarketHistory {
    pub fn new(
        benchmark: Vec<Bar>,
        instruments: BTreeMap<String, Vec<Bar>>,
    ) -> Result<Self, HistoryError> {
        if benchmark.is_empty() {
            return Err(HistoryError::Empty);
        }
        validate_series(&benchmark)?;
        let timestamps: Vec<DateTime<Utc>> = benchmark.iter().map(|b| b.timestamp).collect();
        for (symbol, bars) in &instruments {
            if bars.len() != timestamps.len() {
                return Err(HistoryError::LengthMismatch {
                    symbol: symbol.clone(),
                    have: bars.len(),
                    need: timestamps.len(),
                });
            }
            for (index, bar) in bars.iter().enumerate() {
                if bar.timestamp != timestamps[index] {
                    return Err(HistoryError::Misaligned {
                        symbol: symbol.clone(),
                        index,
                    });
                }
            }
        }
        Ok(Self {
            timestamps,
            benchmark,
            instruments,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamp(&self, index: usize) -> DateTime<Utc> {
        self.timestamps[index]
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }

    /// Benchmark bars visible up to and including `index`.
    pub fn benchmark_upto(&self, index: usize) -> &[Bar] {
        &self.benchmark[..=index]
    }

    /// One instrument's bars visible up to and including `index`.
    pub fn instrument_upto(&self, symbol: &str, index: usize) -> Option<&[Bar]> {
        self.instruments.get(symbol).map(|bars| &bars[..=index])
    }

    pub fn instrument_bar(&self, symbol: &str, index: usize) -> Option<&Bar> {
        self.instruments.get(symbol).and_then(|bars| bars.get(index))
    }

    /// Clone out an index range as its own history. Alignment is already
    /// established, so no re-validation is needed.
    pub fn slice(&self, range: Range<usize>) -> Self {
        Self {
            timestamps: self.timestamps[range.clone()].to_vec(),
            benchmark: self.benchmark[range.clone()].to_vec(),
            instruments: self
                .instruments
                .iter()
                .map(|(symbol, bars)| (symbol.clone(), bars[range.clone()].to_vec()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_bars(symbol: &str, n: usize) -> Vec<Bar> {
        let base = Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap();
        (0..n)
            .map(|i| Bar {
                symbol: symbol.to_string(),
                timestamp: base + chrono::Duration::minutes(5 * i as i64),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0,
                volume: 1000,
            })
            .collect()
    }

    #[test]
    fn aligned_history_constructs() {
        let mut instruments = BTreeMap::new();
        instruments.insert("ACME".to_string(), make_bars("ACME", 10));
        let history = MarketHistory::new(make_bars("BENCH", 10), instruments).unwrap();
        assert_eq!(history.len(), 10);
        assert_eq!(history.benchmark_upto(4).len(), 5);
        assert_eq!(history.instrument_upto("ACME", 9).unwrap().len(), 10);
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut instruments = BTreeMap::new();
        instruments.insert("ACME".to_string(), make_bars("ACME", 8));
        let err = MarketHistory::new(make_bars("BENCH", 10), instruments).unwrap_err();
        assert!(matches!(err, HistoryError::LengthMismatch { have: 8, need: 10, .. }));
    }

    #[test]
    fn misaligned_timestamps_rejected() {
        let mut bars = make_bars("ACME", 10);
        bars[3].timestamp = bars[3].timestamp + chrono::Duration::minutes(1);
        let mut instruments = BTreeMap::new();
        instruments.insert("ACME".to_string(), bars);
        let err = MarketHistory::new(make_bars("BENCH", 10), instruments).unwrap_err();
        assert!(matches!(err, HistoryError::Misaligned { index: 3, .. }));
    }

    #[test]
    fn unordered_benchmark_rejected() {
        let mut bench = make_bars("BENCH", 10);
        bench[5].timestamp = bench[4].timestamp;
        let err = MarketHistory::new(bench, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, HistoryError::Benchmark(_)));
    }

    #[test]
    fn corrupt_benchmark_rejected() {
        let mut bench = make_bars("BENCH", 10);
        bench[2].close = f64::NAN;
        let err = MarketHistory::new(bench, BTreeMap::new()).unwrap_err();
        assert!(matches!(err, HistoryError::Benchmark(_)));
    }

    #[test]
    fn slice_preserves_alignment() {
        let mut instruments = BTreeMap::new();
        instruments.insert("ACME".to_string(), make_bars("ACME", 10));
        let history = MarketHistory::new(make_bars("BENCH", 10), instruments).unwrap();
        let window = history.slice(3..8);
        assert_eq!(window.len(), 5);
        assert_eq!(window.timestamp(0), history.timestamp(3));
    }
}
