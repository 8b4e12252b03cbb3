//! Broker-facing contracts: intents out, execution reports back in.
//!
//! The core never assumes a fill happened until the gateway says so; every
//! intent is answered by an [`ExecutionReport`] which the lifecycle manager
//! reconciles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Order kind handed to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit { limit_price: f64 },
    Stop { stop_price: f64 },
}

/// An order the core wants the gateway to place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntent {
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
    pub kind: OrderKind,
}

impl TradeIntent {
    pub fn market_buy(symbol: impl Into<String>, quantity: i64) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Buy,
            quantity,
            kind: OrderKind::Market,
        }
    }

    pub fn market_sell(symbol: impl Into<String>, quantity: i64) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Sell,
            quantity,
            kind: OrderKind::Market,
        }
    }
}

/// A confirmed fill reported by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub quantity: i64,
    pub price: f64,
    pub filled_at: DateTime<Utc>,
}

/// Gateway response to a submitted intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionReport {
    Filled(Fill),
    Failed { reason: String },
}

/// Why the lifecycle manager wants a position closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TrailingStop,
    SessionClose,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::StopLoss => write!(f, "stop_loss"),
            ExitReason::TrailingStop => write!(f, "trailing_stop"),
            ExitReason::SessionClose => write!(f, "session_close"),
        }
    }
}
