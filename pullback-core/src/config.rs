//! Engine configuration.
//!
//! One aggregate [`EngineConfig`] covers every component, loads from TOML,
//! and validates itself once at startup. Validation failures are fatal;
//! nothing downstream re-checks config values at runtime.

use serde::{Deserialize, Serialize};

use crate::entry::EntryConfig;
use crate::error::ConfigError;
use crate::indicators::IndicatorParams;
use crate::lifecycle::LifecycleConfig;
use crate::policy::{Policy, PolicyTable};
use crate::regime::RegimeConfig;
use crate::risk::RiskConfig;
use crate::scoring::ScoringConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum quality score required before a candidate reaches the
    /// entry state machine.
    pub min_score: f64,
    /// Portfolio-wide gross exposure cap as a fraction of equity.
    pub max_total_exposure_pct: f64,
    pub indicators: IndicatorParams,
    pub scoring: ScoringConfig,
    pub regime: RegimeConfig,
    pub entry: EntryConfig,
    pub risk: RiskConfig,
    pub lifecycle: LifecycleConfig,
    /// Optional cautious override applied when the market is Neutral.
    pub neutral_policy: Option<Policy>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_score: 60.0,
            max_total_exposure_pct: 0.30,
            indicators: IndicatorParams::default(),
            scoring: ScoringConfig::default(),
            regime: RegimeConfig::default(),
            entry: EntryConfig::default(),
            risk: RiskConfig::default(),
            lifecycle: LifecycleConfig::default(),
            neutral_policy: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = toml::from_str(raw).map_err(|err| ConfigError::Parse {
            reason: err.to_string(),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Regime-to-parameters table the cycle resolves each bar.
    pub fn policy_table(&self) -> PolicyTable {
        let mut table = PolicyTable::uniform(Policy {
            entry: self.entry.clone(),
            risk: self.risk.clone(),
        });
        if let Some(neutral) = &self.neutral_policy {
            table.set_neutral(neutral.clone());
        }
        table
    }

    /// Instrument bars required before the engine can evaluate a symbol.
    pub fn warmup_bars(&self) -> usize {
        self.indicators
            .min_bars()
            .max(self.entry.min_bars())
            .max(self.risk.correlation_window + 1)
    }

    /// Benchmark bars required for the market regime call.
    pub fn benchmark_warmup_bars(&self) -> usize {
        self.regime.min_benchmark_bars()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.min_score) {
            return Err(ConfigError::invalid("min_score", "must be in [0, 100]"));
        }

        let caps_total = self.scoring.crossover_max
            + self.scoring.trend_max
            + self.scoring.momentum_max
            + self.scoring.volatility_max
            + self.scoring.volume_max
            + self.scoring.trend_strength_max;
        if (caps_total - 100.0).abs() > 1e-9 {
            return Err(ConfigError::Contradiction {
                reason: format!("scoring component caps sum to {caps_total}, expected 100"),
            });
        }
        if self.scoring.rsi_health_low >= self.scoring.rsi_health_high {
            return Err(ConfigError::invalid(
                "scoring.rsi_health_low",
                "must be below rsi_health_high",
            ));
        }

        if self.regime.adx_ranging >= self.regime.adx_trending {
            return Err(ConfigError::Contradiction {
                reason: "regime.adx_ranging must be below adx_trending for hysteresis"
                    .to_string(),
            });
        }
        if self.regime.momentum_lookback >= self.regime.market_lookback {
            return Err(ConfigError::invalid(
                "regime.momentum_lookback",
                "must be shorter than market_lookback",
            ));
        }

        if self.entry.pullback_pct <= 0.0 || self.entry.pullback_pct >= 1.0 {
            return Err(ConfigError::invalid("entry.pullback_pct", "must be in (0, 1)"));
        }
        if self.entry.confirm_bars == 0 {
            return Err(ConfigError::invalid("entry.confirm_bars", "must be at least 1"));
        }
        if self.entry.max_bars_in_setup < self.entry.confirm_bars {
            return Err(ConfigError::Contradiction {
                reason: "entry.max_bars_in_setup cannot be below confirm_bars".to_string(),
            });
        }

        self.validate_risk()?;

        if self.lifecycle.trail_activation_pct <= 0.0 {
            return Err(ConfigError::invalid(
                "lifecycle.trail_activation_pct",
                "must be positive",
            ));
        }
        if self.lifecycle.trail_distance_pct <= 0.0 {
            return Err(ConfigError::invalid(
                "lifecycle.trail_distance_pct",
                "must be positive",
            ));
        }
        if self.lifecycle.daily_loss_limit_pct <= 0.0 {
            return Err(ConfigError::invalid(
                "lifecycle.daily_loss_limit_pct",
                "must be positive",
            ));
        }
        if let Some(window) = &self.lifecycle.trading_window {
            if window.open_after >= window.flatten_after {
                return Err(ConfigError::Contradiction {
                    reason: "trading window opens after it flattens".to_string(),
                });
            }
        }

        if let Some(neutral) = &self.neutral_policy {
            Self::validate_risk_config(&neutral.risk, self.max_total_exposure_pct)?;
        }
        Ok(())
    }

    fn validate_risk(&self) -> Result<(), ConfigError> {
        Self::validate_risk_config(&self.risk, self.max_total_exposure_pct)
    }

    fn validate_risk_config(
        risk: &RiskConfig,
        max_total_exposure_pct: f64,
    ) -> Result<(), ConfigError> {
        if risk.max_positions == 0 {
            return Err(ConfigError::invalid("risk.max_positions", "must be at least 1"));
        }
        if risk.base_position_pct <= 0.0 || risk.base_position_pct > 1.0 {
            return Err(ConfigError::invalid(
                "risk.base_position_pct",
                "must be in (0, 1]",
            ));
        }
        if risk.max_position_pct < risk.base_position_pct {
            return Err(ConfigError::Contradiction {
                reason: "risk.max_position_pct below base_position_pct".to_string(),
            });
        }
        if max_total_exposure_pct < risk.max_position_pct {
            return Err(ConfigError::Contradiction {
                reason: "max_total_exposure_pct below risk.max_position_pct".to_string(),
            });
        }
        if risk.stop_loss_pct <= 0.0 || risk.stop_loss_pct >= 1.0 {
            return Err(ConfigError::invalid("risk.stop_loss_pct", "must be in (0, 1)"));
        }
        if risk.stop_atr_mult <= 0.0 {
            return Err(ConfigError::invalid("risk.stop_atr_mult", "must be positive"));
        }
        if risk.max_score_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "risk.max_score_multiplier",
                "must be at least 1",
            ));
        }
        if risk.score_floor >= 100.0 {
            return Err(ConfigError::invalid("risk.score_floor", "must be below 100"));
        }
        if !(0.0..=1.0).contains(&risk.correlation_ceiling) {
            return Err(ConfigError::invalid(
                "risk.correlation_ceiling",
                "must be in [0, 1]",
            ));
        }
        if risk.min_risk_reward <= 0.0 {
            return Err(ConfigError::invalid("risk.min_risk_reward", "must be positive"));
        }
        Ok(())
    }
}
