//! Backtest and walk-forward orchestration on top of `pullback-core`.
//!
//! This crate drives the pure decision engine over recorded bar history:
//! - Aligned multi-symbol history with a benchmark timeline
//! - Single backtest runner with simulated fills and trade extraction
//! - Performance metrics (returns, drawdown, expectancy)
//! - Walk-forward validation with parallel parameter fitting
//! - Run configs with deterministic BLAKE3 fingerprints

pub mod history;
pub mod metrics;
pub mod run_config;
pub mod sim;
pub mod walk_forward;

pub use history::{HistoryError, MarketHistory};
pub use metrics::PerformanceMetrics;
pub use run_config::{RunConfig, RunId};
pub use sim::{run_backtest, BacktestResult, SimError, TradeRecord};
pub use walk_forward::{
    run_walk_forward, windows, ParamChoice, ParamGrid, WalkForwardConfig, WalkForwardResult,
    WindowOutcome, WindowResult, WindowSpec,
};
