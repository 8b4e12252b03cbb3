//! Per-bar indicator snapshot for one instrument.
//!
//! Read-only bundle of everything the scoring engine needs at a decision
//! bar. Recomputed per bar, never mutated, never cached across cycles.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::DataError;

use super::{adx, atr, bollinger, ema_pair, relative_volume, rsi, BollingerBands};

/// Lookback periods feeding the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorParams {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub bollinger_period: usize,
    pub bollinger_mult: f64,
    pub atr_period: usize,
    pub adx_period: usize,
    pub volume_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_fast: 21,
            ema_slow: 50,
            rsi_period: 14,
            bollinger_period: 20,
            bollinger_mult: 2.0,
            atr_period: 14,
            adx_period: 14,
            volume_period: 20,
        }
    }
}

impl IndicatorParams {
    /// Bars required before a snapshot can be computed.
    pub fn min_bars(&self) -> usize {
        let mut need = self.ema_slow + 1; // ema_pair on the slow leg
        for candidate in [
            self.ema_fast + 1,
            self.rsi_period + 1,
            self.bollinger_period,
            self.atr_period + 1,
            2 * self.adx_period + 1,
            self.volume_period + 1,
        ] {
            need = need.max(candidate);
        }
        need
    }
}

/// Indicator values at one decision bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub close: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    /// Previous-bar EMAs, for crossover detection.
    pub ema_fast_prev: f64,
    pub ema_slow_prev: f64,
    pub rsi: f64,
    pub bands: BollingerBands,
    pub atr: f64,
    pub adx: f64,
    pub relative_volume: f64,
}

impl Snapshot {
    /// Compute the snapshot at the last bar of `bars`.
    pub fn compute(bars: &[Bar], params: &IndicatorParams) -> Result<Self, DataError> {
        let need = params.min_bars();
        if bars.len() < need {
            return Err(DataError::Insufficient {
                have: bars.len(),
                need,
            });
        }

        let (ema_fast_prev, ema_fast) = ema_pair(bars, params.ema_fast)?;
        let (ema_slow_prev, ema_slow) = ema_pair(bars, params.ema_slow)?;

        Ok(Self {
            close: bars[bars.len() - 1].close,
            ema_fast,
            ema_slow,
            ema_fast_prev,
            ema_slow_prev,
            rsi: rsi(bars, params.rsi_period)?,
            bands: bollinger(bars, params.bollinger_period, params.bollinger_mult)?,
            atr: atr(bars, params.atr_period)?,
            adx: adx(bars, params.adx_period)?,
            relative_volume: relative_volume(bars, params.volume_period)?,
        })
    }

    /// Golden cross on this bar: fast EMA crossed above slow EMA.
    pub fn golden_cross(&self) -> bool {
        self.ema_fast_prev <= self.ema_slow_prev && self.ema_fast > self.ema_slow
    }

    /// Price above both EMAs with fast above slow.
    pub fn trend_aligned(&self) -> bool {
        self.close > self.ema_fast && self.ema_fast > self.ema_slow
    }

    /// ATR as a fraction of price (volatility normalization for sizing).
    pub fn atr_fraction(&self) -> f64 {
        if self.close > 0.0 {
            self.atr / self.close
        } else {
            0.0
        }
    }
}
