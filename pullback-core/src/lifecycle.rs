//! Position lifecycle manager.
//!
//! Owns [`PortfolioState`] and enforces the exit rules: initial stop,
//! trailing stop with a ratchet that never loosens, and a flatten window
//! before the session close. There is no fixed take-profit; profit-taking
//! is delegated entirely to the trailing stop, which never deactivates
//! once armed. Entry gating for the daily loss limit, cooldowns, and the
//! once-per-symbol-per-day rule also lives here because the portfolio
//! accumulators it reads are owned here.
//!
//! Fills are reconciled explicitly: no position is created or removed
//! until the gateway reports a fill. A failed close reverts the position
//! to its prior state so the exit is retried next cycle.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    ExecutionReport, ExitReason, Fill, PortfolioState, Position, PositionState, TradeIntent,
};
use crate::error::ExecutionError;
use crate::risk::Rejection;

/// Intraday session window. Entries are allowed only inside it; open
/// positions are flattened once the clock reaches `flatten_after`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingWindow {
    /// Earliest time of day (UTC) new entries are considered.
    pub open_after: NaiveTime,
    /// Time of day (UTC) after which open positions are force-closed.
    pub flatten_after: NaiveTime,
}

impl TradingWindow {
    pub fn allows_entry(&self, at: DateTime<Utc>) -> bool {
        let t = at.time();
        t >= self.open_after && t < self.flatten_after
    }

    pub fn must_flatten(&self, at: DateTime<Utc>) -> bool {
        at.time() >= self.flatten_after
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Unrealized gain that arms the trailing stop.
    pub trail_activation_pct: f64,
    /// Distance of the trailing stop below the high-water mark.
    pub trail_distance_pct: f64,
    /// Daily realized loss, as a fraction of day-start equity, that blocks
    /// new entries for the rest of the day.
    pub daily_loss_limit_pct: f64,
    /// Optional session window with flatten-before-close.
    pub trading_window: Option<TradingWindow>,
    /// Minutes a symbol is untouchable after a losing exit.
    pub cooldown_minutes: i64,
    /// Entries allowed per symbol per trading day.
    pub max_entries_per_symbol_per_day: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            trail_activation_pct: 0.01,
            trail_distance_pct: 0.012,
            daily_loss_limit_pct: 0.02,
            trading_window: None,
            cooldown_minutes: 30,
            max_entries_per_symbol_per_day: 1,
        }
    }
}

/// An exit the manager wants executed. The position is parked in
/// `PendingExit` until the gateway's report is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitDecision {
    pub symbol: String,
    pub quantity: i64,
    pub reason: ExitReason,
    /// Price that triggered the decision, for the audit trail.
    pub trigger_price: f64,
}

impl ExitDecision {
    pub fn to_intent(&self) -> TradeIntent {
        TradeIntent::market_sell(self.symbol.clone(), self.quantity)
    }
}

/// Owns the portfolio and drives every position through its lifecycle.
#[derive(Debug, Clone)]
pub struct LifecycleManager {
    cfg: LifecycleConfig,
    portfolio: PortfolioState,
}

impl LifecycleManager {
    pub fn new(cfg: LifecycleConfig, portfolio: PortfolioState) -> Self {
        Self { cfg, portfolio }
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    pub fn into_portfolio(self) -> PortfolioState {
        self.portfolio
    }

    /// Roll day-anchored accumulators when the calendar day changes and
    /// drop cooldown stamps that have expired.
    pub fn roll_day(&mut self, now: DateTime<Utc>, equity: f64) {
        self.portfolio.roll_day(now.date_naive(), equity);
        let cooldown = Duration::minutes(self.cfg.cooldown_minutes);
        self.portfolio
            .last_loss_at
            .retain(|_, stamp| now - *stamp < cooldown);
    }

    /// Portfolio-wide entry gate. `None` means entries are allowed.
    pub fn entries_blocked(&self, now: DateTime<Utc>) -> Option<Rejection> {
        if self.portfolio.daily_realized_pnl_pct <= -self.cfg.daily_loss_limit_pct {
            return Some(Rejection::DailyLossLimit);
        }
        if let Some(window) = &self.cfg.trading_window {
            if !window.allows_entry(now) {
                return Some(Rejection::RegimeGate);
            }
        }
        None
    }

    /// Per-symbol entry gate: cooldown after a loss and the per-day
    /// entry budget.
    pub fn symbol_blocked(&self, symbol: &str, now: DateTime<Utc>) -> Option<Rejection> {
        if let Some(stamp) = self.portfolio.last_loss_at.get(symbol) {
            if now - *stamp < Duration::minutes(self.cfg.cooldown_minutes) {
                return Some(Rejection::Cooldown);
            }
        }
        let entries = self.portfolio.entries_today.get(symbol).copied().unwrap_or(0);
        if entries >= self.cfg.max_entries_per_symbol_per_day {
            return Some(Rejection::TradedToday);
        }
        None
    }

    /// Evaluate one price update for an open position. Updates the
    /// high-water mark and the trailing stop, then checks exit triggers in
    /// priority order. Returns at most one exit decision; a position
    /// already pending exit is left alone.
    pub fn on_price(
        &mut self,
        symbol: &str,
        price: f64,
        now: DateTime<Utc>,
    ) -> Option<ExitDecision> {
        let cfg = self.cfg.clone();
        let position = self.portfolio.positions.get_mut(symbol)?;
        if position.state == PositionState::PendingExit {
            return None;
        }

        if price > position.highest_price_since_entry {
            position.highest_price_since_entry = price;
        }

        if !position.trailing_stop_active
            && position.unrealized_gain_pct(price) >= cfg.trail_activation_pct
        {
            position.trailing_stop_active = true;
            position.state = PositionState::TrailingActive;
            let stop = position.highest_price_since_entry * (1.0 - cfg.trail_distance_pct);
            position.trailing_stop_price = Some(stop);
            tracing::info!(symbol, stop, "trailing stop armed");
        } else if position.trailing_stop_active {
            let candidate =
                position.highest_price_since_entry * (1.0 - cfg.trail_distance_pct);
            if let Some(current) = position.trailing_stop_price {
                // Ratchet: the stop only ever rises.
                if candidate > current {
                    position.trailing_stop_price = Some(candidate);
                }
            }
        }

        let reason = if !position.trailing_stop_active && price <= position.initial_stop {
            Some(ExitReason::StopLoss)
        } else if position.trailing_stop_active
            && position
                .trailing_stop_price
                .is_some_and(|stop| price <= stop)
        {
            Some(ExitReason::TrailingStop)
        } else if cfg
            .trading_window
            .is_some_and(|window| window.must_flatten(now))
        {
            Some(ExitReason::SessionClose)
        } else {
            None
        };

        let reason = reason?;
        position.prior_state = Some(position.state);
        position.state = PositionState::PendingExit;
        tracing::info!(symbol, price, reason = %reason, "exit triggered");
        Some(ExitDecision {
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            reason,
            trigger_price: price,
        })
    }

    /// Reconcile an entry report. A filled buy creates the position at the
    /// fill's price and quantity; a failure creates nothing.
    pub fn apply_entry(
        &mut self,
        symbol: &str,
        report: &ExecutionReport,
        initial_stop: f64,
    ) -> Result<(), ExecutionError> {
        match report {
            ExecutionReport::Filled(fill) => {
                self.open_position(symbol, fill, initial_stop);
                Ok(())
            }
            ExecutionReport::Failed { reason } => {
                tracing::warn!(symbol, reason, "entry order failed, no position opened");
                Err(ExecutionError::OrderFailed {
                    symbol: symbol.to_string(),
                    reason: reason.clone(),
                })
            }
        }
    }

    fn open_position(&mut self, symbol: &str, fill: &Fill, initial_stop: f64) {
        let position = Position::new(
            symbol.to_string(),
            fill.quantity,
            fill.price,
            fill.filled_at,
            initial_stop,
        );
        self.portfolio.positions.insert(symbol.to_string(), position);
        *self
            .portfolio
            .entries_today
            .entry(symbol.to_string())
            .or_insert(0) += 1;
        tracing::info!(
            symbol,
            quantity = fill.quantity,
            price = fill.price,
            "position opened"
        );
    }

    /// Reconcile an exit report. A full fill removes the position and books
    /// the realized P&L against the day; a losing exit stamps the cooldown.
    /// A partial fill books the filled slice and leaves the remainder under
    /// management, so the next price update re-emits the exit. A failed
    /// close reverts the position so the exit retries next cycle.
    pub fn apply_exit(
        &mut self,
        symbol: &str,
        report: &ExecutionReport,
    ) -> Result<f64, ExecutionError> {
        let position = self.portfolio.positions.get_mut(symbol).ok_or_else(|| {
            ExecutionError::UnknownPosition {
                symbol: symbol.to_string(),
            }
        })?;

        match report {
            ExecutionReport::Filled(fill) if fill.quantity == position.quantity => {
                let pnl = position.quantity as f64 * (fill.price - position.entry_price);
                let filled_at = fill.filled_at;
                self.portfolio.positions.remove(symbol);
                self.portfolio.record_realized_pnl(pnl);
                if pnl < 0.0 {
                    self.portfolio
                        .last_loss_at
                        .insert(symbol.to_string(), filled_at);
                }
                tracing::info!(symbol, pnl, "position closed");
                Ok(pnl)
            }
            ExecutionReport::Filled(fill) => {
                let requested = position.quantity;
                let filled = fill.quantity.clamp(0, requested);
                let pnl = filled as f64 * (fill.price - position.entry_price);
                position.quantity -= filled;
                position.state = position.prior_state.take().unwrap_or(PositionState::Open);
                self.portfolio.record_realized_pnl(pnl);
                tracing::warn!(
                    symbol,
                    requested,
                    filled,
                    "partial exit fill, remainder stays managed"
                );
                Err(ExecutionError::PartialFill {
                    symbol: symbol.to_string(),
                    requested,
                    filled: fill.quantity,
                })
            }
            ExecutionReport::Failed { reason } => {
                position.state = position.prior_state.take().unwrap_or(PositionState::Open);
                tracing::warn!(symbol, reason, "exit order failed, position stays open");
                Err(ExecutionError::OrderFailed {
                    symbol: symbol.to_string(),
                    reason: reason.clone(),
                })
            }
        }
    }
}
