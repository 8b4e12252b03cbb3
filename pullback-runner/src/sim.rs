//! Bar-by-bar backtest of the decision cycle.
//!
//! The simulator replays an aligned [`MarketHistory`] through the engine
//! exactly as the live loop would: at bar `i` every component sees only
//! `&bars[..=i]`. Fills are modeled at the decision bar's close with no
//! slippage. The run is fully deterministic: identical history and config
//! produce identical trades and metrics, byte for byte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pullback_core::config::EngineConfig;
use pullback_core::cycle::{advance, Candidate, CycleInput, StrategyState};
use pullback_core::domain::{ExecutionReport, ExitReason, Fill, PortfolioState};
use pullback_core::error::{DataError, ExecutionError};
use pullback_core::lifecycle::LifecycleManager;

use crate::history::MarketHistory;
use crate::metrics::PerformanceMetrics;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// One completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_at: DateTime<Utc>,
    pub exit_at: DateTime<Utc>,
    pub exit_reason: ExitReason,
    pub net_pnl: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.net_pnl > 0.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Marked-to-market equity after each decision bar.
    pub equity_curve: Vec<f64>,
    pub trades: Vec<TradeRecord>,
    pub metrics: PerformanceMetrics,
    pub final_portfolio: PortfolioState,
}

/// Replay the whole history from warmup onward. Positions still open at
/// the end stay in `final_portfolio`; only closed round trips appear in
/// `trades`.
pub fn run_backtest(
    history: &MarketHistory,
    cfg: &EngineConfig,
    initial_equity: f64,
) -> Result<BacktestResult, SimError> {
    let warmup = cfg.warmup_bars().max(cfg.benchmark_warmup_bars());
    let symbols: Vec<String> = history.symbols().map(str::to_string).collect();

    let mut cash = initial_equity;
    let mut portfolio = PortfolioState::new(
        history.timestamp(0).date_naive(),
        initial_equity,
    );
    let mut strategy = StrategyState::default();
    let mut equity_curve = Vec::new();
    let mut trades = Vec::new();

    for index in warmup.saturating_sub(1)..history.len() {
        let now = history.timestamp(index);

        // Sanity-check the bars the cycle is about to act on; a corrupt
        // bar aborts the run rather than silently trading on it.
        for symbol in &symbols {
            if let Some(bar) = history.instrument_bar(symbol, index) {
                if !bar.is_sane() {
                    return Err(DataError::Malformed {
                        reason: format!("corrupt bar for {symbol} at {now}"),
                    }
                    .into());
                }
            }
        }

        let equity = cash + mark_to_market(&portfolio, history, index);

        let candidates: Vec<Candidate<'_>> = symbols
            .iter()
            .filter_map(|symbol| {
                history.instrument_upto(symbol, index).map(|bars| Candidate {
                    symbol: symbol.as_str(),
                    bars,
                })
            })
            .collect();

        let input = CycleInput {
            now,
            equity,
            benchmark: history.benchmark_upto(index),
            candidates: &candidates,
            portfolio: &portfolio,
        };
        let output = advance(&input, &strategy, cfg)?;

        // Apply the cycle's output atomically: adopt the proposed state,
        // then reconcile fills at the decision bar's close.
        strategy = output.next_strategy;
        let mut mgr = LifecycleManager::new(cfg.lifecycle.clone(), output.next_portfolio);

        for exit in &output.exits {
            let Some(bar) = history.instrument_bar(&exit.symbol, index) else {
                continue;
            };
            let position = match mgr.portfolio().get_position(&exit.symbol) {
                Some(p) => p.clone(),
                None => continue,
            };
            let fill = ExecutionReport::Filled(Fill {
                quantity: exit.quantity,
                price: bar.close,
                filled_at: now,
            });
            let net_pnl = mgr.apply_exit(&exit.symbol, &fill)?;
            cash += exit.quantity as f64 * bar.close;
            trades.push(TradeRecord {
                symbol: exit.symbol.clone(),
                quantity: exit.quantity,
                entry_price: position.entry_price,
                exit_price: bar.close,
                entry_at: position.entry_at,
                exit_at: now,
                exit_reason: exit.reason,
                net_pnl,
            });
        }

        for entry in &output.entries {
            let fill = ExecutionReport::Filled(Fill {
                quantity: entry.approval.quantity,
                price: entry.price,
                filled_at: now,
            });
            mgr.apply_entry(&entry.symbol, &fill, entry.approval.initial_stop)?;
            cash -= entry.approval.quantity as f64 * entry.price;
        }

        portfolio = mgr.into_portfolio();
        equity_curve.push(cash + mark_to_market(&portfolio, history, index));
    }

    let metrics = PerformanceMetrics::compute(&equity_curve, &trades);
    tracing::info!(
        trades = trades.len(),
        total_return = metrics.total_return,
        "backtest complete"
    );
    Ok(BacktestResult {
        equity_curve,
        trades,
        metrics,
        final_portfolio: portfolio,
    })
}

fn mark_to_market(portfolio: &PortfolioState, history: &MarketHistory, index: usize) -> f64 {
    portfolio
        .positions
        .values()
        .map(|pos| {
            let price = history
                .instrument_bar(&pos.symbol, index)
                .map(|bar| bar.close)
                .unwrap_or(pos.entry_price);
            pos.market_value(price)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pullback_core::domain::Bar;
    use std::collections::BTreeMap;

    fn ts(i: usize) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 30, 0).unwrap()
            + chrono::Duration::minutes(5 * i as i64)
    }

    pub(crate) fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<Bar> {
        let mut prev = closes[0];
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { prev };
                prev = close;
                Bar {
                    symbol: symbol.to_string(),
                    timestamp: ts(i),
                    open,
                    high: open.max(close) + 0.6,
                    low: open.min(close) - 0.6,
                    close,
                    volume: 1000,
                }
            })
            .collect()
    }

    pub(crate) fn test_config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.min_score = 0.0;
        cfg.indicators.ema_fast = 3;
        cfg.indicators.ema_slow = 5;
        cfg.indicators.rsi_period = 3;
        cfg.indicators.bollinger_period = 3;
        cfg.indicators.atr_period = 3;
        cfg.indicators.adx_period = 3;
        cfg.indicators.volume_period = 3;
        cfg.regime.market_lookback = 3;
        cfg.regime.momentum_lookback = 1;
        cfg.regime.adx_period = 3;
        cfg.regime.adx_trending = 1.0;
        cfg.regime.adx_ranging = 0.5;
        cfg.scoring.adx_floor = 0.0;
        cfg.scoring.volume_floor = 0.0;
        cfg.scoring.rsi_overbought = 100.5;
        cfg.risk.correlation_window = 5;
        cfg.risk.min_correlation_points = 2;
        cfg.entry.pullback_pct = 0.02;
        cfg.entry.confirm_bars = 1;
        cfg.entry.confirm_ma_period = 3;
        cfg.entry.rolling_high_period = 5;
        cfg
    }

    /// Rise, pullback, confirm (entry), then a slide through the stop.
    pub(crate) fn round_trip_closes() -> Vec<f64> {
        vec![
            100.0, 101.0, 102.0, 103.0, 104.0, 105.0, 106.0, // warmup rise
            103.9, // pullback
            105.2, // confirmation, entry fills here
            104.0, 102.0, 99.0, // slide through the initial stop
            99.5, 99.2, 99.4, // drift after the exit
        ]
    }

    pub(crate) fn round_trip_history() -> MarketHistory {
        let closes = round_trip_closes();
        let bench: Vec<f64> = (0..closes.len()).map(|i| 100.0 + i as f64).collect();
        let mut instruments = BTreeMap::new();
        instruments.insert("ACME".to_string(), bars_from_closes("ACME", &closes));
        MarketHistory::new(bars_from_closes("BENCH", &bench), instruments).unwrap()
    }

    #[test]
    fn round_trip_produces_one_losing_trade() {
        let result = run_backtest(&round_trip_history(), &test_config(), 100_000.0).unwrap();
        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.symbol, "ACME");
        assert!((trade.entry_price - 105.2).abs() < 1e-9);
        assert!(trade.net_pnl < 0.0);
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!(result.final_portfolio.positions.is_empty());
    }

    #[test]
    fn equity_curve_reflects_cash_plus_positions() {
        let result = run_backtest(&round_trip_history(), &test_config(), 100_000.0).unwrap();
        // Flat before the entry.
        assert_eq!(result.equity_curve[0], 100_000.0);
        // Final equity = initial + realized pnl (no open positions).
        let expected = 100_000.0 + result.trades[0].net_pnl;
        let last = result.equity_curve[result.equity_curve.len() - 1];
        assert!((last - expected).abs() < 1e-6);
    }

    #[test]
    fn identical_runs_are_byte_identical() {
        let history = round_trip_history();
        let cfg = test_config();
        let a = run_backtest(&history, &cfg, 100_000.0).unwrap();
        let b = run_backtest(&history, &cfg, 100_000.0).unwrap();
        let ja = serde_json::to_string(&a.metrics).unwrap();
        let jb = serde_json::to_string(&b.metrics).unwrap();
        assert_eq!(ja, jb);
        assert_eq!(a.trades, b.trades);
        assert_eq!(a.equity_curve, b.equity_curve);
    }

    #[test]
    fn corrupt_bar_aborts_the_run() {
        let mut closes = round_trip_closes();
        closes[10] = -5.0;
        let bench: Vec<f64> = (0..closes.len()).map(|i| 100.0 + i as f64).collect();
        let mut instruments = BTreeMap::new();
        instruments.insert("ACME".to_string(), bars_from_closes("ACME", &closes));
        let history =
            MarketHistory::new(bars_from_closes("BENCH", &bench), instruments).unwrap();
        let err = run_backtest(&history, &test_config(), 100_000.0).unwrap_err();
        assert!(matches!(err, SimError::Data(DataError::Malformed { .. })));
    }

    #[test]
    fn never_trades_without_a_setup() {
        // Monotonic rise: no pullback ever, no trades ever.
        let closes: Vec<f64> = (0..15).map(|i| 100.0 + i as f64 * 0.5).collect();
        let bench: Vec<f64> = (0..closes.len()).map(|i| 100.0 + i as f64).collect();
        let mut instruments = BTreeMap::new();
        instruments.insert("ACME".to_string(), bars_from_closes("ACME", &closes));
        let history =
            MarketHistory::new(bars_from_closes("BENCH", &bench), instruments).unwrap();
        let result = run_backtest(&history, &test_config(), 100_000.0).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.equity_curve.iter().all(|&e| e == 100_000.0));
    }
}
