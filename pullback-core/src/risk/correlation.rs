//! Return-series correlation between a candidate and held positions.
//!
//! Correlation is computed over simple per-bar close returns within a
//! fixed lookback window. When the overlapping return series is too short
//! to be meaningful the caller treats the pair as fully correlated, which
//! rejects the candidate rather than waving it through on thin evidence.

use crate::domain::Bar;

/// Simple close-to-close returns over at most the last `window` bars.
pub fn close_returns(bars: &[Bar], window: usize) -> Vec<f64> {
    let start = bars.len().saturating_sub(window + 1);
    let slice = &bars[start..];
    slice
        .windows(2)
        .filter(|w| w[0].close != 0.0)
        .map(|w| (w[1].close - w[0].close) / w[0].close)
        .collect()
}

/// Pearson correlation of two equal-tail return series. The series are
/// truncated to their common length from the end. Returns None when the
/// overlap is shorter than `min_points` or either series is degenerate
/// (zero variance).
pub fn pearson(a: &[f64], b: &[f64], min_points: usize) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < min_points || n < 2 {
        return None;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let nf = n as f64;
    let mean_a = a.iter().sum::<f64>() / nf;
    let mean_b = b.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}
