//! Entry signal state machine — pullback, then confirmation.
//!
//! Per instrument, per bar:
//!
//! ```text
//! Idle -> PullbackDetected -> Confirming -> SignalReady -> Idle
//! ```
//!
//! A pullback is a close at least `pullback_pct` below the rolling high.
//! Confirmation is `confirm_bars` consecutive up-closes with price back
//! above a short moving average. Any bar breaking below the pullback's low,
//! or exceeding the bars-in-setup budget, resets to Idle. `SignalReady` is
//! edge-triggered: it is consumed exactly once via [`EntryTracker::take_signal`]
//! and expires if left unread for a bar.
//!
//! Trackers are independent per instrument; one symbol's state never
//! affects another's.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::error::DataError;
use crate::indicators::{rolling_high, sma};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Minimum retracement from the rolling high to count as a pullback.
    pub pullback_pct: f64,
    /// Consecutive up-closes required for confirmation.
    pub confirm_bars: usize,
    /// Bars allowed in the setup (pullback + confirmation) before reset.
    pub max_bars_in_setup: usize,
    /// Short moving average price must reclaim to confirm resumption.
    pub confirm_ma_period: usize,
    /// Window for the rolling high the pullback is measured from.
    pub rolling_high_period: usize,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            pullback_pct: 0.02,
            confirm_bars: 2,
            max_bars_in_setup: 10,
            confirm_ma_period: 10,
            rolling_high_period: 20,
        }
    }
}

impl EntryConfig {
    pub fn min_bars(&self) -> usize {
        self.rolling_high_period.max(self.confirm_ma_period).max(2)
    }
}

/// Discrete setup state. The payload carries the levels the setup was
/// anchored to when the pullback was first detected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntryState {
    Idle,
    PullbackDetected {
        anchor_high: f64,
        pullback_low: f64,
        bars_in_setup: usize,
    },
    Confirming {
        anchor_high: f64,
        pullback_low: f64,
        up_bars: usize,
        bars_in_setup: usize,
    },
    SignalReady,
}

/// Per-instrument tracker. Feed it the instrument's full trailing window
/// each bar; read a confirmed signal with [`take_signal`](Self::take_signal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryTracker {
    state: EntryState,
}

impl Default for EntryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryTracker {
    pub fn new() -> Self {
        Self {
            state: EntryState::Idle,
        }
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    /// Consume a ready signal. Returns true at most once per setup; the
    /// tracker returns to Idle either way once the signal is read.
    pub fn take_signal(&mut self) -> bool {
        if self.state == EntryState::SignalReady {
            self.state = EntryState::Idle;
            true
        } else {
            false
        }
    }

    /// Advance the machine with the window ending at the current bar.
    pub fn on_bar(&mut self, bars: &[Bar], cfg: &EntryConfig) -> Result<(), DataError> {
        let need = cfg.min_bars();
        if bars.len() < need {
            return Err(DataError::Insufficient {
                have: bars.len(),
                need,
            });
        }

        let last = &bars[bars.len() - 1];
        let prev = &bars[bars.len() - 2];
        let up_close = last.close > prev.close;

        // An unread signal is an edge, not a level: it expires now and the
        // machine starts looking for a fresh setup on this same bar.
        if self.state == EntryState::SignalReady {
            self.state = EntryState::Idle;
        }

        match self.state {
            EntryState::Idle => {
                let high = rolling_high(bars, cfg.rolling_high_period)?;
                if last.close <= high * (1.0 - cfg.pullback_pct) {
                    self.state = EntryState::PullbackDetected {
                        anchor_high: high,
                        pullback_low: last.low,
                        bars_in_setup: 0,
                    };
                }
            }
            EntryState::PullbackDetected {
                anchor_high,
                pullback_low,
                bars_in_setup,
            } => {
                let bars_in_setup = bars_in_setup + 1;
                if bars_in_setup > cfg.max_bars_in_setup || last.low < pullback_low {
                    self.state = EntryState::Idle;
                    return Ok(());
                }
                if up_close {
                    self.advance_confirmation(
                        bars,
                        cfg,
                        anchor_high,
                        pullback_low,
                        1,
                        bars_in_setup,
                    )?;
                } else {
                    self.state = EntryState::PullbackDetected {
                        anchor_high,
                        pullback_low,
                        bars_in_setup,
                    };
                }
            }
            EntryState::Confirming {
                anchor_high,
                pullback_low,
                up_bars,
                bars_in_setup,
            } => {
                let bars_in_setup = bars_in_setup + 1;
                if bars_in_setup > cfg.max_bars_in_setup || last.low < pullback_low {
                    self.state = EntryState::Idle;
                    return Ok(());
                }
                if up_close {
                    self.advance_confirmation(
                        bars,
                        cfg,
                        anchor_high,
                        pullback_low,
                        up_bars + 1,
                        bars_in_setup,
                    )?;
                } else {
                    // A down bar breaks the consecutive count but not the setup.
                    self.state = EntryState::PullbackDetected {
                        anchor_high,
                        pullback_low,
                        bars_in_setup,
                    };
                }
            }
            EntryState::SignalReady => unreachable!("cleared above"),
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn advance_confirmation(
        &mut self,
        bars: &[Bar],
        cfg: &EntryConfig,
        anchor_high: f64,
        pullback_low: f64,
        up_bars: usize,
        bars_in_setup: usize,
    ) -> Result<(), DataError> {
        let last_close = bars[bars.len() - 1].close;
        let confirm_ma = sma(bars, cfg.confirm_ma_period)?;
        if up_bars >= cfg.confirm_bars && last_close > confirm_ma {
            self.state = EntryState::SignalReady;
        } else {
            self.state = EntryState::Confirming {
                anchor_high,
                pullback_low,
                up_bars,
                bars_in_setup,
            };
        }
        Ok(())
    }
}
