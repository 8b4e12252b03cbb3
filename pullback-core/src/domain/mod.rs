//! Core domain types: bars, positions, portfolio state, broker contracts.

pub mod bar;
pub mod intent;
pub mod portfolio;
pub mod position;

pub use bar::{validate_series, Bar};
pub use intent::{ExecutionReport, ExitReason, Fill, OrderKind, Side, TradeIntent};
pub use portfolio::PortfolioState;
pub use position::{Position, PositionState};
