//! Walk-forward validation: fit on a train window, evaluate frozen on the
//! test window immediately after it, advance by a fixed step, repeat.
//!
//! Train and test ranges never overlap: a window fits on bar indices
//! `[train_start, train_end)` and trades only on `[train_end, test_end)`.
//! The test run is handed the tail of the train range purely as indicator
//! warmup; those bars are in its past, and its first decision lands
//! exactly on `train_end`.
//!
//! Parameter fitting is a small grid search, run in parallel with rayon.
//! Selection is deterministic: best train total return, ties broken by
//! shallower max drawdown, then by grid order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use pullback_core::config::EngineConfig;

use crate::history::MarketHistory;
use crate::metrics::PerformanceMetrics;
use crate::sim::{run_backtest, TradeRecord};

/// One train/test pair, as bar indices into the full history.
/// Train is `[train_start, train_end)`, test is `[train_end, test_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    pub train_start: usize,
    pub train_end: usize,
    pub test_end: usize,
}

impl WindowSpec {
    pub fn train_len(&self) -> usize {
        self.train_end - self.train_start
    }

    pub fn test_len(&self) -> usize {
        self.test_end - self.train_end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkForwardConfig {
    /// Bars in each train window.
    pub train_bars: usize,
    /// Bars in each test window.
    pub test_bars: usize,
    /// Bars the window start advances between windows.
    pub step_bars: usize,
    pub initial_equity: f64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_bars: 390,
            test_bars: 78,
            step_bars: 78,
            initial_equity: 100_000.0,
        }
    }
}

/// The parameter surface the fit explores, in fixed grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub pullback_pcts: Vec<f64>,
    pub trail_distance_pcts: Vec<f64>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            pullback_pcts: vec![0.015, 0.02, 0.03],
            trail_distance_pcts: vec![0.008, 0.012, 0.018],
        }
    }
}

impl ParamGrid {
    /// All combinations in deterministic grid order.
    pub fn combos(&self) -> Vec<ParamChoice> {
        let mut out = Vec::with_capacity(self.pullback_pcts.len() * self.trail_distance_pcts.len());
        for &pullback_pct in &self.pullback_pcts {
            for &trail_distance_pct in &self.trail_distance_pcts {
                out.push(ParamChoice {
                    pullback_pct,
                    trail_distance_pct,
                });
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamChoice {
    pub pullback_pct: f64,
    pub trail_distance_pct: f64,
}

impl ParamChoice {
    fn apply(&self, cfg: &EngineConfig) -> EngineConfig {
        let mut cfg = cfg.clone();
        cfg.entry.pullback_pct = self.pullback_pct;
        cfg.lifecycle.trail_distance_pct = self.trail_distance_pct;
        cfg
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowResult {
    pub spec: WindowSpec,
    pub chosen: ParamChoice,
    pub train_metrics: PerformanceMetrics,
    pub test_metrics: PerformanceMetrics,
    pub test_trades: Vec<TradeRecord>,
}

/// A window either completes or is abandoned whole; one bad window never
/// poisons its neighbors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WindowOutcome {
    Completed(Box<WindowResult>),
    Aborted { spec: WindowSpec, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub windows: Vec<WindowOutcome>,
    /// Metrics over all completed test windows chained together.
    pub aggregate: PerformanceMetrics,
}

/// Successive non-overlapping (train, test) index pairs over `total_bars`.
/// Degenerate geometry yields no windows; `RunConfig::validate` rejects it
/// before a run ever gets here.
pub fn windows(total_bars: usize, cfg: &WalkForwardConfig) -> Vec<WindowSpec> {
    debug_assert!(cfg.train_bars > 0, "train_bars must be > 0");
    debug_assert!(cfg.test_bars > 0, "test_bars must be > 0");
    debug_assert!(cfg.step_bars > 0, "step_bars must be > 0");
    if cfg.train_bars == 0 || cfg.test_bars == 0 || cfg.step_bars == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut start = 0usize;
    while start + cfg.train_bars + cfg.test_bars <= total_bars {
        out.push(WindowSpec {
            train_start: start,
            train_end: start + cfg.train_bars,
            test_end: start + cfg.train_bars + cfg.test_bars,
        });
        start += cfg.step_bars;
    }
    out
}

pub fn run_walk_forward(
    history: &MarketHistory,
    engine: &EngineConfig,
    cfg: &WalkForwardConfig,
    grid: &ParamGrid,
) -> WalkForwardResult {
    let specs = windows(history.len(), cfg);
    let combos = grid.combos();

    let mut outcomes = Vec::with_capacity(specs.len());
    let mut aggregate_trades: Vec<TradeRecord> = Vec::new();
    let mut aggregate_curve: Vec<f64> = vec![cfg.initial_equity];

    for spec in specs {
        match run_window(history, engine, cfg, &combos, spec) {
            Ok(result) => {
                aggregate_trades.extend(result.test_trades.iter().cloned());
                chain_equity(&mut aggregate_curve, &result.test_metrics);
                outcomes.push(WindowOutcome::Completed(Box::new(result)));
            }
            Err(reason) => {
                tracing::warn!(
                    train_start = spec.train_start,
                    train_end = spec.train_end,
                    test_end = spec.test_end,
                    reason,
                    "walk-forward window aborted"
                );
                outcomes.push(WindowOutcome::Aborted { spec, reason });
            }
        }
    }

    let aggregate = PerformanceMetrics::compute(&aggregate_curve, &aggregate_trades);
    WalkForwardResult {
        windows: outcomes,
        aggregate,
    }
}

fn run_window(
    history: &MarketHistory,
    engine: &EngineConfig,
    cfg: &WalkForwardConfig,
    combos: &[ParamChoice],
    spec: WindowSpec,
) -> Result<WindowResult, String> {
    let train = history.slice(spec.train_start..spec.train_end);

    // Fit: every combo on the train slice, in parallel. Results carry
    // their grid index so selection stays order-stable.
    let fitted: Vec<(usize, Result<PerformanceMetrics, String>)> = combos
        .par_iter()
        .enumerate()
        .map(|(i, choice)| {
            let run = run_backtest(&train, &choice.apply(engine), cfg.initial_equity)
                .map(|r| r.metrics)
                .map_err(|e| e.to_string());
            (i, run)
        })
        .collect();

    let mut best: Option<(usize, PerformanceMetrics)> = None;
    for (i, outcome) in fitted {
        let metrics = outcome?;
        let better = match &best {
            None => true,
            Some((_, incumbent)) => {
                metrics.total_return > incumbent.total_return
                    || (metrics.total_return == incumbent.total_return
                        && metrics.max_drawdown > incumbent.max_drawdown)
            }
        };
        if better {
            best = Some((i, metrics));
        }
    }
    let (chosen_index, train_metrics) = best.ok_or_else(|| "empty parameter grid".to_string())?;
    let chosen = combos[chosen_index];

    // Evaluate frozen. The test slice reaches back far enough that the
    // warmup ends exactly at train_end; no trade can land before it.
    let frozen = chosen.apply(engine);
    let warmup = frozen.warmup_bars().max(frozen.benchmark_warmup_bars());
    let context_start = spec.train_end.saturating_sub(warmup.saturating_sub(1));
    let test = history.slice(context_start..spec.test_end);
    let test_run = run_backtest(&test, &frozen, cfg.initial_equity).map_err(|e| e.to_string())?;

    Ok(WindowResult {
        spec,
        chosen,
        train_metrics,
        test_metrics: test_run.metrics,
        test_trades: test_run.trades,
    })
}

/// Extend the aggregate curve by compounding a window's test return onto
/// the running equity.
fn chain_equity(curve: &mut Vec<f64>, window_metrics: &PerformanceMetrics) {
    let last = curve[curve.len() - 1];
    curve.push(last * (1.0 + window_metrics.total_return));
}
