//! Scoring engine — additive capped contributions with hard disqualifiers.
//!
//! Each contribution is independently clamped to its own maximum before
//! summation and becomes zero (never negative) when its condition is
//! absent; the total is clamped to [0, 100]. A hard disqualifier is
//! absolute: the result carries score 0 and the reason, not a partial
//! score.

use serde::{Deserialize, Serialize};

use crate::indicators::Snapshot;

/// Component caps and thresholds. The component maxima sum to 100 by
/// default; `validate` in the config module enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub crossover_max: f64,
    pub trend_max: f64,
    pub momentum_max: f64,
    pub volatility_max: f64,
    pub volume_max: f64,
    pub trend_strength_max: f64,
    /// RSI band considered healthy momentum.
    pub rsi_health_low: f64,
    pub rsi_health_high: f64,
    /// RSI at or above this is an absolute disqualifier.
    pub rsi_overbought: f64,
    /// ADX below this is an absolute disqualifier.
    pub adx_floor: f64,
    /// ADX at which the trend-strength bonus saturates.
    pub adx_strong: f64,
    /// Relative volume below this is an absolute disqualifier.
    pub volume_floor: f64,
    /// Relative volume at which the volume contribution saturates.
    pub volume_accel: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            crossover_max: 25.0,
            trend_max: 20.0,
            momentum_max: 15.0,
            volatility_max: 10.0,
            volume_max: 15.0,
            trend_strength_max: 15.0,
            rsi_health_low: 45.0,
            rsi_health_high: 70.0,
            rsi_overbought: 75.0,
            adx_floor: 15.0,
            adx_strong: 40.0,
            volume_floor: 0.5,
            volume_accel: 1.5,
        }
    }
}

/// An absolute disqualifying condition. Not an error: a logged outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Disqualifier {
    Overbought { rsi: f64, limit: f64 },
    WeakTrend { adx: f64, floor: f64 },
    ThinVolume { ratio: f64, floor: f64 },
}

impl std::fmt::Display for Disqualifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Disqualifier::Overbought { rsi, limit } => {
                write!(f, "RSI {rsi:.1} at or above overbought limit {limit:.1}")
            }
            Disqualifier::WeakTrend { adx, floor } => {
                write!(f, "ADX {adx:.1} below trend floor {floor:.1}")
            }
            Disqualifier::ThinVolume { ratio, floor } => {
                write!(f, "relative volume {ratio:.2} below floor {floor:.2}")
            }
        }
    }
}

/// Per-component contributions, each already clamped to its cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub crossover: f64,
    pub trend: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub volume: f64,
    pub trend_strength: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.crossover
            + self.trend
            + self.momentum
            + self.volatility
            + self.volume
            + self.trend_strength
    }
}

/// Score for one instrument at one bar. Produced fresh each cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub symbol: String,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub rejection: Option<Disqualifier>,
}

impl ScoreResult {
    pub fn is_disqualified(&self) -> bool {
        self.rejection.is_some()
    }
}

/// Score one instrument's snapshot.
pub fn score(symbol: &str, snap: &Snapshot, cfg: &ScoringConfig) -> ScoreResult {
    // Hard disqualifiers first: absolute, not a penalty.
    let rejection = if snap.rsi >= cfg.rsi_overbought {
        Some(Disqualifier::Overbought {
            rsi: snap.rsi,
            limit: cfg.rsi_overbought,
        })
    } else if snap.adx < cfg.adx_floor {
        Some(Disqualifier::WeakTrend {
            adx: snap.adx,
            floor: cfg.adx_floor,
        })
    } else if snap.relative_volume < cfg.volume_floor {
        Some(Disqualifier::ThinVolume {
            ratio: snap.relative_volume,
            floor: cfg.volume_floor,
        })
    } else {
        None
    };

    if let Some(reason) = rejection {
        return ScoreResult {
            symbol: symbol.to_string(),
            score: 0.0,
            breakdown: ScoreBreakdown::default(),
            rejection: Some(reason),
        };
    }

    let crossover = if snap.golden_cross() {
        cfg.crossover_max
    } else {
        0.0
    };

    let trend = if snap.trend_aligned() {
        cfg.trend_max
    } else if snap.close > snap.ema_slow {
        cfg.trend_max / 2.0
    } else {
        0.0
    };

    let momentum = if (cfg.rsi_health_low..=cfg.rsi_health_high).contains(&snap.rsi) {
        cfg.momentum_max
    } else {
        0.0
    };

    // Best at mid-band, fading toward either band edge.
    let pct_b = snap.bands.percent_b(snap.close);
    let volatility =
        (cfg.volatility_max * (1.0 - (2.0 * pct_b - 1.0).abs())).clamp(0.0, cfg.volatility_max);

    let volume_frac =
        ((snap.relative_volume - 1.0) / (cfg.volume_accel - 1.0)).clamp(0.0, 1.0);
    let volume = volume_frac * cfg.volume_max;

    let strength_frac =
        ((snap.adx - cfg.adx_floor) / (cfg.adx_strong - cfg.adx_floor)).clamp(0.0, 1.0);
    let trend_strength = strength_frac * cfg.trend_strength_max;

    let breakdown = ScoreBreakdown {
        crossover,
        trend,
        momentum,
        volatility,
        volume,
        trend_strength,
    };

    ScoreResult {
        symbol: symbol.to_string(),
        score: breakdown.total().clamp(0.0, 100.0),
        breakdown,
        rejection: None,
    }
}

/// Rank score results for entry consideration: score descending, ties
/// broken by volume contribution descending, then symbol ascending.
/// Fully deterministic for identical inputs.
pub fn rank(results: &mut [ScoreResult]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.breakdown.volume.total_cmp(&a.breakdown.volume))
            .then(a.symbol.cmp(&b.symbol))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::BollingerBands;

    fn healthy_snapshot() -> Snapshot {
        Snapshot {
            close: 105.0,
            ema_fast: 103.0,
            ema_slow: 100.0,
            ema_fast_prev: 99.5,
            ema_slow_prev: 100.0,
            rsi: 60.0,
            bands: BollingerBands {
                upper: 110.0,
                middle: 102.5,
                lower: 95.0,
            },
            atr: 1.5,
            adx: 30.0,
            relative_volume: 1.4,
        }
    }

    #[test]
    fn healthy_snapshot_scores_high() {
        let result = score("ACME", &healthy_snapshot(), &ScoringConfig::default());
        assert!(result.rejection.is_none());
        assert!(result.score > 60.0, "score was {}", result.score);
        assert!(result.score <= 100.0);
        // Golden cross fired: fast was below slow, now above.
        assert_eq!(result.breakdown.crossover, 25.0);
        assert_eq!(result.breakdown.trend, 20.0);
        assert_eq!(result.breakdown.momentum, 15.0);
    }

    #[test]
    fn score_never_negative_or_above_100() {
        let mut snap = healthy_snapshot();
        snap.close = 90.0; // below both EMAs
        snap.rsi = 20.0; // outside health band
        snap.relative_volume = 0.6; // above floor, below 1.0
        let result = score("ACME", &snap, &ScoringConfig::default());
        assert!(result.score >= 0.0);
        assert!(result.score <= 100.0);
        assert_eq!(result.breakdown.volume, 0.0);
    }

    #[test]
    fn overbought_disqualifies_absolutely() {
        let mut snap = healthy_snapshot();
        snap.rsi = 80.0;
        let result = score("ACME", &snap, &ScoringConfig::default());
        assert_eq!(result.score, 0.0);
        assert!(matches!(
            result.rejection,
            Some(Disqualifier::Overbought { .. })
        ));
        // Disqualification wipes the whole breakdown, not just one term.
        assert_eq!(result.breakdown.total(), 0.0);
    }

    #[test]
    fn weak_adx_disqualifies() {
        let mut snap = healthy_snapshot();
        snap.adx = 10.0;
        let result = score("ACME", &snap, &ScoringConfig::default());
        assert_eq!(result.score, 0.0);
        assert!(matches!(
            result.rejection,
            Some(Disqualifier::WeakTrend { .. })
        ));
    }

    #[test]
    fn thin_volume_disqualifies() {
        let mut snap = healthy_snapshot();
        snap.relative_volume = 0.3;
        let result = score("ACME", &snap, &ScoringConfig::default());
        assert_eq!(result.score, 0.0);
        assert!(matches!(
            result.rejection,
            Some(Disqualifier::ThinVolume { .. })
        ));
    }

    #[test]
    fn volume_contribution_saturates() {
        let cfg = ScoringConfig::default();
        let mut snap = healthy_snapshot();
        snap.relative_volume = 5.0; // way past accel threshold
        let result = score("ACME", &snap, &cfg);
        assert_eq!(result.breakdown.volume, cfg.volume_max);
    }

    #[test]
    fn rank_breaks_ties_by_volume_then_symbol() {
        let cfg = ScoringConfig::default();
        let base = healthy_snapshot();

        let mut high_vol = base.clone();
        high_vol.relative_volume = 1.5;
        let mut low_vol = base.clone();
        low_vol.relative_volume = 1.5;

        let a = score("ZULU", &high_vol, &cfg);
        let b = score("ACME", &low_vol, &cfg);
        assert_eq!(a.score, b.score);

        let mut results = vec![a, b];
        rank(&mut results);
        // Equal score and volume contribution: lexicographic symbol wins.
        assert_eq!(results[0].symbol, "ACME");

        // Now give ZULU more volume: it must lead regardless of symbol.
        let mut louder = base.clone();
        louder.relative_volume = 1.45;
        let mut results = vec![score("ACME", &low_vol, &cfg), score("ZULU", &louder, &cfg)];
        // Align scores so only the volume contribution differs.
        let delta = results[0].score - results[1].score;
        results[1].score += delta;
        rank(&mut results);
        assert_eq!(results[0].symbol, "ACME"); // 1.5 rel vol beats 1.45
    }
}
