//! Portfolio state — open positions plus day-anchored risk accumulators.
//!
//! This struct is the sole state that must survive a process restart: it is
//! handed to the external persistence collaborator as a serde snapshot and
//! accepted back verbatim on resume.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::position::Position;

/// Aggregate portfolio state. At most one open position per symbol.
///
/// `daily_realized_pnl_pct` accumulates only fills from the current
/// trading day; the day rollover (`roll_day`) is the only allowed wipe of
/// accumulated risk state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioState {
    /// Open positions keyed by symbol. BTreeMap keeps iteration (and thus
    /// every downstream decision) deterministic.
    pub positions: BTreeMap<String, Position>,
    /// Realized P&L for the current trading day, as a fraction of
    /// `day_start_equity`.
    pub daily_realized_pnl_pct: f64,
    /// Account equity at the start of the current trading day.
    pub day_start_equity: f64,
    /// Calendar day the daily accumulators are anchored to.
    pub day_anchor: NaiveDate,
    /// Per-symbol timestamp of the most recent losing exit, for
    /// cooldown-after-loss gating. Pruned as cooldowns expire.
    #[serde(default)]
    pub last_loss_at: BTreeMap<String, DateTime<Utc>>,
    /// Entries filled per symbol on the current trading day.
    #[serde(default)]
    pub entries_today: BTreeMap<String, u32>,
}

impl PortfolioState {
    pub fn new(day_anchor: NaiveDate, day_start_equity: f64) -> Self {
        Self {
            positions: BTreeMap::new(),
            daily_realized_pnl_pct: 0.0,
            day_start_equity,
            day_anchor,
            last_loss_at: BTreeMap::new(),
            entries_today: BTreeMap::new(),
        }
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    /// Gross exposure: sum of open position values at the given prices.
    /// Symbols without a quoted price fall back to their entry price.
    pub fn gross_exposure(&self, prices: &BTreeMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = prices.get(&pos.symbol).copied().unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum()
    }

    /// Reset day-anchored accumulators when the calendar day changes.
    /// Open positions and cooldown stamps carry across days.
    pub fn roll_day(&mut self, today: NaiveDate, start_equity: f64) {
        if today != self.day_anchor {
            self.day_anchor = today;
            self.day_start_equity = start_equity;
            self.daily_realized_pnl_pct = 0.0;
            self.entries_today.clear();
        }
    }

    /// Record a realized P&L amount (in currency) against the current day.
    pub fn record_realized_pnl(&mut self, pnl: f64) {
        if self.day_start_equity > 0.0 {
            self.daily_realized_pnl_pct += pnl / self.day_start_equity;
        }
    }

    /// Serialize the snapshot for the persistence collaborator.
    pub fn to_snapshot(&self) -> String {
        serde_json::to_string(self).expect("portfolio state serializes")
    }

    /// Resume from a prior snapshot.
    pub fn from_snapshot(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
