//! Risk & sizing engine.
//!
//! Takes a scored candidate plus account equity, volatility, and the
//! current portfolio, and either rejects it with a reason or approves a
//! bounded quantity and an initial stop. Checks run in a fixed order and
//! short-circuit on the first rejection, so a reported reason is always
//! the earliest gate the candidate failed.

pub mod correlation;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, PortfolioState};
use crate::scoring::ScoreResult;

use correlation::{close_returns, pearson};

/// Why a candidate was turned away. Gate-level reasons (regime, score,
/// loss limit, exposure) are produced by the decision cycle; the rest
/// come out of [`evaluate`] itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Rejection {
    RegimeGate,
    ScoreBelowMinimum { score: f64, minimum: f64 },
    DailyLossLimit,
    Cooldown,
    TradedToday,
    ExposureCap,
    MaxPositions,
    AlreadyHeld,
    Correlated { with: String, rho: f64 },
    PoorRiskReward { ratio: f64 },
    ZeroQuantity,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::RegimeGate => write!(f, "market regime blocks entries"),
            Rejection::ScoreBelowMinimum { score, minimum } => {
                write!(f, "score {score:.1} below minimum {minimum:.1}")
            }
            Rejection::DailyLossLimit => write!(f, "daily loss limit reached"),
            Rejection::Cooldown => write!(f, "in cooldown after a losing exit"),
            Rejection::TradedToday => write!(f, "already traded this symbol today"),
            Rejection::ExposureCap => write!(f, "portfolio exposure cap reached"),
            Rejection::MaxPositions => write!(f, "maximum concurrent positions open"),
            Rejection::AlreadyHeld => write!(f, "position already open for symbol"),
            Rejection::Correlated { with, rho } => {
                write!(f, "correlated {rho:.2} with open position {with}")
            }
            Rejection::PoorRiskReward { ratio } => {
                write!(f, "risk-reward {ratio:.2} below minimum")
            }
            Rejection::ZeroQuantity => write!(f, "sized quantity rounds to zero"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub max_positions: usize,
    /// Candidates whose return correlation with any open position exceeds
    /// this are rejected. Windows too short to estimate are treated as
    /// fully correlated.
    pub correlation_ceiling: f64,
    pub min_correlation_points: usize,
    pub correlation_window: usize,
    pub min_risk_reward: f64,
    /// Notional target distance, in ATR multiples, used only for the
    /// risk-reward check. Exits are managed by the trailing stop.
    pub reward_atr_mult: f64,
    /// Base position value as a fraction of equity before scaling.
    pub base_position_pct: f64,
    /// Score at which the size multiplier starts rising above 1.0.
    pub score_floor: f64,
    pub max_score_multiplier: f64,
    /// ATR-as-fraction-of-price above which size scales down.
    pub volatility_atr_pct_threshold: f64,
    /// Hard cap on position value as a fraction of equity.
    pub max_position_pct: f64,
    pub stop_loss_pct: f64,
    pub stop_atr_mult: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_positions: 4,
            correlation_ceiling: 0.75,
            min_correlation_points: 10,
            correlation_window: 30,
            min_risk_reward: 1.5,
            reward_atr_mult: 3.0,
            base_position_pct: 0.05,
            score_floor: 60.0,
            max_score_multiplier: 2.0,
            volatility_atr_pct_threshold: 0.02,
            max_position_pct: 0.10,
            stop_loss_pct: 0.007,
            stop_atr_mult: 1.5,
        }
    }
}

/// Approved sizing for a new entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub quantity: i64,
    pub initial_stop: f64,
    pub position_value: f64,
}

/// The wider of the fixed-percentage stop and the ATR-multiple stop,
/// giving the position the most room of the two.
pub fn initial_stop(price: f64, atr: f64, cfg: &RiskConfig) -> f64 {
    let pct_stop = price * (1.0 - cfg.stop_loss_pct);
    let atr_stop = price - cfg.stop_atr_mult * atr;
    pct_stop.min(atr_stop)
}

/// Run the ordered risk checks and size the position. `open_histories`
/// provides the return-series source for each open position, in a
/// deterministic order.
pub fn evaluate(
    cfg: &RiskConfig,
    score: &ScoreResult,
    equity: f64,
    price: f64,
    atr: f64,
    candidate_bars: &[Bar],
    portfolio: &PortfolioState,
    open_histories: &[(&str, &[Bar])],
) -> Result<Approval, Rejection> {
    if portfolio.positions.len() >= cfg.max_positions {
        return Err(Rejection::MaxPositions);
    }
    if portfolio.positions.contains_key(&score.symbol) {
        return Err(Rejection::AlreadyHeld);
    }

    // A held position with no return series counts as maximally
    // correlated; unknown never passes the gate.
    let candidate_returns = close_returns(candidate_bars, cfg.correlation_window);
    for symbol in portfolio.positions.keys() {
        let rho = open_histories
            .iter()
            .find(|(held, _)| *held == symbol.as_str())
            .map(|(_, bars)| {
                let held_returns = close_returns(bars, cfg.correlation_window);
                pearson(
                    &candidate_returns,
                    &held_returns,
                    cfg.min_correlation_points,
                )
                .unwrap_or(1.0)
            })
            .unwrap_or(1.0);
        if rho > cfg.correlation_ceiling {
            return Err(Rejection::Correlated {
                with: symbol.clone(),
                rho,
            });
        }
    }
    for (symbol, bars) in open_histories {
        if portfolio.positions.contains_key(*symbol) {
            continue;
        }
        let held_returns = close_returns(bars, cfg.correlation_window);
        let rho = pearson(
            &candidate_returns,
            &held_returns,
            cfg.min_correlation_points,
        )
        .unwrap_or(1.0);
        if rho > cfg.correlation_ceiling {
            return Err(Rejection::Correlated {
                with: symbol.to_string(),
                rho,
            });
        }
    }

    let stop = initial_stop(price, atr, cfg);
    let risk_per_unit = price - stop;
    let reward_per_unit = atr * cfg.reward_atr_mult;
    let ratio = if risk_per_unit > 0.0 {
        reward_per_unit / risk_per_unit
    } else {
        0.0
    };
    if ratio < cfg.min_risk_reward {
        return Err(Rejection::PoorRiskReward { ratio });
    }

    let span = 100.0 - cfg.score_floor;
    let multiplier = if span > 0.0 {
        (1.0 + (score.score - cfg.score_floor) / span * (cfg.max_score_multiplier - 1.0))
            .clamp(1.0, cfg.max_score_multiplier)
    } else {
        1.0
    };
    let mut value = equity * cfg.base_position_pct * multiplier;

    let atr_frac = atr / price;
    if atr_frac > cfg.volatility_atr_pct_threshold {
        value *= cfg.volatility_atr_pct_threshold / atr_frac;
    }

    value = value.min(equity * cfg.max_position_pct);

    let quantity = (value / price).floor() as i64;
    if quantity <= 0 {
        return Err(Rejection::ZeroQuantity);
    }

    tracing::debug!(
        symbol = %score.symbol,
        quantity,
        stop,
        multiplier,
        "entry approved"
    );
    Ok(Approval {
        quantity,
        initial_stop: stop,
        position_value: quantity as f64 * price,
    })
}
