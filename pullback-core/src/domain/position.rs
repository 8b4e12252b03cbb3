//! Open position state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an open position.
///
/// `Open -> TrailingActive` happens once unrealized gain crosses the
/// activation threshold; there is no way back. `PendingExit` marks a
/// position whose exit intent has been handed to the gateway but not yet
/// confirmed; a failed close reverts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Open,
    TrailingActive,
    PendingExit,
}

/// A single open long position, owned exclusively by the lifecycle manager.
///
/// Invariants (enforced by `LifecycleManager`, asserted in tests):
/// - `quantity > 0`
/// - `highest_price_since_entry` is monotonically non-decreasing
/// - `trailing_stop_price`, once set, only rises
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub entry_at: DateTime<Utc>,
    pub initial_stop: f64,
    pub highest_price_since_entry: f64,
    pub trailing_stop_active: bool,
    pub trailing_stop_price: Option<f64>,
    pub state: PositionState,
    /// State to restore when a pending exit fails at the gateway.
    #[serde(default)]
    pub prior_state: Option<PositionState>,
}

impl Position {
    pub fn new(
        symbol: String,
        quantity: i64,
        entry_price: f64,
        entry_at: DateTime<Utc>,
        initial_stop: f64,
    ) -> Self {
        debug_assert!(quantity > 0, "position quantity must be positive");
        debug_assert!(initial_stop < entry_price, "initial stop must protect a long");
        Self {
            symbol,
            quantity,
            entry_price,
            entry_at,
            initial_stop,
            highest_price_since_entry: entry_price,
            trailing_stop_active: false,
            trailing_stop_price: None,
            state: PositionState::Open,
            prior_state: None,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }

    /// Unrealized gain from entry as a fraction of entry price.
    pub fn unrealized_gain_pct(&self, price: f64) -> f64 {
        (price - self.entry_price) / self.entry_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_position() -> Position {
        Position::new(
            "ACME".into(),
            100,
            50.0,
            Utc.with_ymd_and_hms(2024, 1, 15, 15, 0, 0).unwrap(),
            49.0,
        )
    }

    #[test]
    fn new_position_starts_open() {
        let pos = sample_position();
        assert_eq!(pos.state, PositionState::Open);
        assert!(!pos.trailing_stop_active);
        assert_eq!(pos.trailing_stop_price, None);
        assert_eq!(pos.highest_price_since_entry, 50.0);
    }

    #[test]
    fn market_value_and_pnl() {
        let pos = sample_position();
        assert!((pos.market_value(55.0) - 5500.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(45.0) + 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_gain_pct() {
        let pos = sample_position();
        assert!((pos.unrealized_gain_pct(51.0) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn serialization_roundtrip() {
        let pos = sample_position();
        let json = serde_json::to_string(&pos).unwrap();
        let deser: Position = serde_json::from_str(&json).unwrap();
        assert_eq!(deser.symbol, "ACME");
        assert_eq!(deser.quantity, 100);
        assert_eq!(deser.state, PositionState::Open);
    }
}
