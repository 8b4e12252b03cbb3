//! Regime filter — broad-market gate and per-instrument trend classification.
//!
//! The market regime is a global gate: entries are only permitted while the
//! benchmark is in `Uptrend`. Per-instrument regime uses ADX with a
//! hysteresis band so the classification does not flap around a single
//! threshold.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::DataError;
use crate::indicators::adx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketRegime {
    Uptrend,
    Neutral,
    Downtrend,
}

impl MarketRegime {
    /// Whether new entries are permitted under this regime.
    pub fn allows_entries(&self) -> bool {
        matches!(self, MarketRegime::Uptrend)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentRegime {
    Trending,
    Ranging,
}

/// Combined regime state for one decision cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeState {
    pub market: MarketRegime,
    pub instrument: InstrumentRegime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Bars of benchmark history for the total-window return.
    pub market_lookback: usize,
    /// Shorter momentum check window, in bars.
    pub momentum_lookback: usize,
    /// Minimum benchmark return over the full lookback for Uptrend.
    pub min_window_return: f64,
    /// Minimum benchmark return over the momentum window for Uptrend.
    pub min_momentum_return: f64,
    pub adx_period: usize,
    /// ADX at or above this is Trending.
    pub adx_trending: f64,
    /// ADX below this is Ranging; between the two thresholds the previous
    /// classification is retained (hysteresis).
    pub adx_ranging: f64,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            market_lookback: 20,
            momentum_lookback: 5,
            min_window_return: 0.005,
            min_momentum_return: 0.001,
            adx_period: 14,
            adx_trending: 25.0,
            adx_ranging: 20.0,
        }
    }
}

impl RegimeConfig {
    pub fn min_benchmark_bars(&self) -> usize {
        self.market_lookback.max(self.momentum_lookback) + 1
    }
}

/// Classify the broad market from benchmark closes.
///
/// Uptrend requires BOTH the total-window return and the shorter momentum
/// return to exceed their configured minima. A total-window return at or
/// below the negated minimum is Downtrend; everything else is Neutral.
pub fn market_regime(benchmark: &[Bar], cfg: &RegimeConfig) -> Result<MarketRegime, DataError> {
    let need = cfg.min_benchmark_bars();
    if benchmark.len() < need {
        return Err(DataError::Insufficient {
            have: benchmark.len(),
            need,
        });
    }

    let last = benchmark[benchmark.len() - 1].close;
    let window_start = benchmark[benchmark.len() - 1 - cfg.market_lookback].close;
    let momentum_start = benchmark[benchmark.len() - 1 - cfg.momentum_lookback].close;

    if window_start <= 0.0 || momentum_start <= 0.0 {
        return Err(DataError::Malformed {
            reason: "non-positive benchmark close in lookback".into(),
        });
    }

    let window_return = (last - window_start) / window_start;
    let momentum_return = (last - momentum_start) / momentum_start;

    let regime = if window_return > cfg.min_window_return
        && momentum_return > cfg.min_momentum_return
    {
        MarketRegime::Uptrend
    } else if window_return <= -cfg.min_window_return {
        MarketRegime::Downtrend
    } else {
        MarketRegime::Neutral
    };
    Ok(regime)
}

/// Classify one instrument's trend strength with hysteresis.
///
/// `previous` is the classification from the prior cycle; it is retained
/// while ADX sits inside the [adx_ranging, adx_trending) band.
pub fn instrument_regime(
    bars: &[Bar],
    previous: InstrumentRegime,
    cfg: &RegimeConfig,
) -> Result<InstrumentRegime, DataError> {
    let value = adx(bars, cfg.adx_period)?;
    let regime = if value >= cfg.adx_trending {
        InstrumentRegime::Trending
    } else if value < cfg.adx_ranging {
        InstrumentRegime::Ranging
    } else {
        previous
    };
    Ok(regime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    fn cfg() -> RegimeConfig {
        RegimeConfig {
            market_lookback: 10,
            momentum_lookback: 3,
            adx_period: 3,
            ..RegimeConfig::default()
        }
    }

    /// Closes producing an exact return over the lookback window.
    fn benchmark_with_return(total_return: f64, lookback: usize) -> Vec<f64> {
        let start = 100.0;
        let end = start * (1.0 + total_return);
        let step = (end - start) / lookback as f64;
        (0..=lookback).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn strong_benchmark_is_uptrend() {
        let closes = benchmark_with_return(0.02, 10);
        let bars = make_bars(&closes);
        assert_eq!(market_regime(&bars, &cfg()).unwrap(), MarketRegime::Uptrend);
    }

    #[test]
    fn weak_positive_return_is_neutral() {
        // +0.3% over the window, below the 0.5% minimum.
        let closes = benchmark_with_return(0.003, 10);
        let bars = make_bars(&closes);
        let regime = market_regime(&bars, &cfg()).unwrap();
        assert_eq!(regime, MarketRegime::Neutral);
        assert!(!regime.allows_entries());
    }

    #[test]
    fn negative_return_is_downtrend() {
        let closes = benchmark_with_return(-0.02, 10);
        let bars = make_bars(&closes);
        assert_eq!(
            market_regime(&bars, &cfg()).unwrap(),
            MarketRegime::Downtrend
        );
    }

    #[test]
    fn uptrend_needs_momentum_too() {
        // Up over the window but fading at the end: momentum check fails.
        let mut closes = benchmark_with_return(0.03, 10);
        let n = closes.len();
        closes[n - 1] = closes[n - 4] * 0.999; // momentum return negative
        let bars = make_bars(&closes);
        let regime = market_regime(&bars, &cfg()).unwrap();
        assert_ne!(regime, MarketRegime::Uptrend);
    }

    #[test]
    fn market_regime_insufficient_history() {
        let bars = make_bars(&[100.0, 101.0]);
        assert!(market_regime(&bars, &cfg()).is_err());
    }

    #[test]
    fn hysteresis_band_retains_previous() {
        // A config with an artificially wide band lets us pin the ADX value
        // inside it regardless of the exact series.
        let mut c = cfg();
        c.adx_ranging = 0.0;
        c.adx_trending = 101.0; // ADX can never reach this
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);

        let kept = instrument_regime(&bars, InstrumentRegime::Trending, &c).unwrap();
        assert_eq!(kept, InstrumentRegime::Trending);
        let kept = instrument_regime(&bars, InstrumentRegime::Ranging, &c).unwrap();
        assert_eq!(kept, InstrumentRegime::Ranging);
    }

    #[test]
    fn strong_trend_classifies_trending() {
        let mut c = cfg();
        c.adx_trending = 20.0;
        c.adx_ranging = 10.0;
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + 5.0 * i as f64).collect();
        let bars = make_bars(&closes);
        assert_eq!(
            instrument_regime(&bars, InstrumentRegime::Ranging, &c).unwrap(),
            InstrumentRegime::Trending
        );
    }
}
