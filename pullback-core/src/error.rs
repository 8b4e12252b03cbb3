//! Error taxonomy.
//!
//! Three genuinely erroneous conditions exist in the engine:
//! - [`DataError`] — bad or missing market data; skips the affected
//!   instrument for the cycle, never fatal.
//! - [`ConfigError`] — contradictory or out-of-range configuration;
//!   fatal at startup, never raised at runtime.
//! - [`ExecutionError`] — the broker gateway reported a failed or partial
//!   fill; the lifecycle manager reconciles.
//!
//! A declined entry or exit is NOT an error — see `risk::Rejection`.

use thiserror::Error;

/// Market data problems. An instrument raising a `DataError` is skipped
/// for the current decision cycle; other instruments are unaffected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("insufficient data: have {have} bars, need {need}")]
    Insufficient { have: usize, need: usize },

    #[error("malformed bar series: {reason}")]
    Malformed { reason: String },
}

/// Invalid or contradictory configuration. Produced only by
/// `EngineConfig::validate` and the TOML loader at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("config parse error: {reason}")]
    Parse { reason: String },

    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("contradictory config: {reason}")]
    Contradiction { reason: String },
}

impl ConfigError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Broker gateway failures reported back to the core. A failed open never
/// creates a position; a failed close leaves the position open and is
/// retried on the next cycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("order for {symbol} failed: {reason}")]
    OrderFailed { symbol: String, reason: String },

    #[error("partial fill for {symbol}: requested {requested}, filled {filled}")]
    PartialFill {
        symbol: String,
        requested: i64,
        filled: i64,
    },

    #[error("no open position for {symbol} to reconcile")]
    UnknownPosition { symbol: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message() {
        let err = DataError::Insufficient { have: 10, need: 50 };
        assert_eq!(
            err.to_string(),
            "insufficient data: have 10 bars, need 50"
        );
    }

    #[test]
    fn config_invalid_helper() {
        let err = ConfigError::invalid("stop_loss_pct", "must be positive");
        assert_eq!(
            err.to_string(),
            "invalid config value `stop_loss_pct`: must be positive"
        );
    }
}
