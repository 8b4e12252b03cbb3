//! Regime-keyed parameter overrides.
//!
//! A [`PolicyTable`] maps each market regime to the entry and risk
//! parameters the cycle should run with. The default table carries a
//! single policy for every regime; the seam exists so a caution policy
//! (smaller sizes, deeper pullbacks) can be configured for Neutral
//! without touching the engine.

use serde::{Deserialize, Serialize};

use crate::entry::EntryConfig;
use crate::regime::MarketRegime;
use crate::risk::RiskConfig;

/// Parameters the cycle resolves per regime.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub entry: EntryConfig,
    pub risk: RiskConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyTable {
    base: Policy,
    /// Override applied when the market is Uptrend. Unset means base.
    uptrend: Option<Policy>,
    /// Override applied when the market is Neutral. Unset means base.
    neutral: Option<Policy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::uniform(Policy::default())
    }
}

impl PolicyTable {
    /// One policy for every regime.
    pub fn uniform(base: Policy) -> Self {
        Self {
            base,
            uptrend: None,
            neutral: None,
        }
    }

    /// Resolve the policy for a regime. Downtrend never trades, so it
    /// resolves to base purely for warmup arithmetic.
    pub fn resolve(&self, regime: MarketRegime) -> &Policy {
        match regime {
            MarketRegime::Uptrend => self.uptrend.as_ref().unwrap_or(&self.base),
            MarketRegime::Neutral => self.neutral.as_ref().unwrap_or(&self.base),
            MarketRegime::Downtrend => &self.base,
        }
    }

    pub fn base(&self) -> &Policy {
        &self.base
    }

    pub fn set_uptrend(&mut self, policy: Policy) {
        self.uptrend = Some(policy);
    }

    pub fn set_neutral(&mut self, policy: Policy) {
        self.neutral = Some(policy);
    }
}
