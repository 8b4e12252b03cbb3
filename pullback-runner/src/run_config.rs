//! Run configuration and fingerprinting.
//!
//! A `RunConfig` is everything a walk-forward run needs besides the bars:
//! universe, capital, engine parameters, and the window/grid settings.
//! Its `run_id()` is a BLAKE3 hash over the canonical JSON serialization,
//! so two identical configs always name the same run.

use serde::{Deserialize, Serialize};
use std::fmt;

use pullback_core::config::EngineConfig;
use pullback_core::error::ConfigError;

use crate::walk_forward::{ParamGrid, WalkForwardConfig};

/// Deterministic run identifier, a BLAKE3 hex digest of the config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Tradeable universe, kept sorted so the fingerprint ignores input order.
    pub symbols: Vec<String>,
    pub benchmark: String,
    pub initial_equity: f64,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub walk_forward: WalkForwardConfig,
    #[serde(default)]
    pub grid: ParamGrid,
}

impl RunConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let mut cfg: Self = toml::from_str(raw).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        cfg.symbols.sort();
        cfg.symbols.dedup();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::invalid("symbols", "universe is empty"));
        }
        if self.symbols.iter().any(|s| s == &self.benchmark) {
            return Err(ConfigError::invalid(
                "symbols",
                "benchmark cannot also be a tradeable symbol",
            ));
        }
        if !(self.initial_equity > 0.0) {
            return Err(ConfigError::invalid(
                "initial_equity",
                "must be positive",
            ));
        }
        if self.walk_forward.train_bars == 0 {
            return Err(ConfigError::invalid(
                "walk_forward.train_bars",
                "must be positive",
            ));
        }
        if self.walk_forward.test_bars == 0 {
            return Err(ConfigError::invalid(
                "walk_forward.test_bars",
                "must be positive",
            ));
        }
        if self.walk_forward.step_bars == 0 {
            return Err(ConfigError::invalid(
                "walk_forward.step_bars",
                "must be positive",
            ));
        }
        if !(self.walk_forward.initial_equity > 0.0) {
            return Err(ConfigError::invalid(
                "walk_forward.initial_equity",
                "must be positive",
            ));
        }
        if self.grid.pullback_pcts.is_empty() || self.grid.trail_distance_pcts.is_empty() {
            return Err(ConfigError::invalid("grid", "parameter grid is empty"));
        }
        self.engine.validate()
    }

    /// BLAKE3 over the canonical JSON form. Serialization is deterministic
    /// because every map in the config tree is a `BTreeMap` and `symbols`
    /// is kept sorted.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("RunConfig must serialize");
        RunId(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RunConfig {
        RunConfig {
            symbols: vec!["AAPL".into(), "MSFT".into(), "NVDA".into()],
            benchmark: "SPY".into(),
            initial_equity: 100_000.0,
            engine: EngineConfig::default(),
            walk_forward: WalkForwardConfig::default(),
            grid: ParamGrid::default(),
        }
    }

    #[test]
    fn run_id_is_deterministic() {
        let cfg = sample();
        assert_eq!(cfg.run_id(), cfg.run_id());
        assert_eq!(cfg.run_id(), cfg.clone().run_id());
    }

    #[test]
    fn run_id_changes_with_parameters() {
        let a = sample();
        let mut b = sample();
        b.engine.entry.pullback_pct = 0.05;
        assert_ne!(a.run_id(), b.run_id());
    }

    #[test]
    fn symbol_order_does_not_matter_after_parse() {
        let toml_a = r#"
            symbols = ["MSFT", "AAPL"]
            benchmark = "SPY"
            initial_equity = 50000.0
        "#;
        let toml_b = r#"
            symbols = ["AAPL", "MSFT"]
            benchmark = "SPY"
            initial_equity = 50000.0
        "#;
        let a = RunConfig::from_toml_str(toml_a).unwrap();
        let b = RunConfig::from_toml_str(toml_b).unwrap();
        assert_eq!(a.run_id(), b.run_id());
    }

    #[test]
    fn benchmark_in_universe_is_rejected() {
        let raw = r#"
            symbols = ["SPY", "AAPL"]
            benchmark = "SPY"
            initial_equity = 50000.0
        "#;
        assert!(RunConfig::from_toml_str(raw).is_err());
    }

    #[test]
    fn empty_universe_is_rejected() {
        let mut cfg = sample();
        cfg.symbols.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_window_geometry_is_rejected_at_parse() {
        let raw = r#"
            symbols = ["AAPL"]
            benchmark = "SPY"
            initial_equity = 50000.0

            [walk_forward]
            train_bars = 100
            test_bars = 20
            step_bars = 0
            initial_equity = 50000.0
        "#;
        let err = RunConfig::from_toml_str(raw).unwrap_err();
        assert!(err.to_string().contains("step_bars"));

        let mut cfg = sample();
        cfg.walk_forward.train_bars = 0;
        assert!(cfg.validate().is_err());
        let mut cfg = sample();
        cfg.walk_forward.test_bars = 0;
        assert!(cfg.validate().is_err());
        let mut cfg = sample();
        cfg.walk_forward.initial_equity = 0.0;
        assert!(cfg.validate().is_err());
    }
}
