//! One decision cycle, as a pure function.
//!
//! [`advance`] takes a snapshot of the world (aligned bar windows, equity,
//! the current portfolio) plus the strategy's own carried state, and
//! returns every decision for the bar: exit intents for open positions,
//! sized entry intents for approved candidates, rejection reasons for the
//! rest, and the proposed next portfolio and strategy state. Nothing is
//! mutated in place; the caller applies the output atomically or drops it
//! whole and retries at the next tick.
//!
//! Gate order per candidate mirrors the live flow: market regime, then
//! score, then signal confirmation, then risk. The first gate that fails
//! is the reported reason. Scores are computed for every candidate even
//! when the market gate is closed, so an operator can see what the engine
//! would have liked.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::domain::{Bar, PortfolioState, TradeIntent};
use crate::entry::EntryTracker;
use crate::error::DataError;
use crate::indicators::Snapshot;
use crate::lifecycle::{ExitDecision, LifecycleManager};
use crate::regime::{instrument_regime, market_regime, InstrumentRegime, MarketRegime};
use crate::risk::{self, Approval, Rejection};
use crate::scoring::{rank, score, ScoreResult};

/// One instrument's trailing window, ending at the current bar.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub symbol: &'a str,
    pub bars: &'a [Bar],
}

/// Everything the cycle reads. All references are cycle-scoped snapshots.
#[derive(Debug, Clone)]
pub struct CycleInput<'a> {
    pub now: DateTime<Utc>,
    pub equity: f64,
    pub benchmark: &'a [Bar],
    pub candidates: &'a [Candidate<'a>],
    pub portfolio: &'a PortfolioState,
}

/// State the strategy carries across bars, per instrument: entry state
/// machines and regime hysteresis. Serialized alongside the portfolio
/// snapshot so a restart resumes mid-setup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyState {
    pub entry_trackers: BTreeMap<String, EntryTracker>,
    pub instrument_regimes: BTreeMap<String, InstrumentRegime>,
}

/// What happened to one candidate this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CandidateOutcome {
    /// Bad or insufficient data; the instrument sat this cycle out.
    Skipped { reason: String },
    /// Position already open; managed for exits, not entries.
    Held,
    /// Passed every gate but the state machine had no confirmed signal.
    NoSignal,
    Rejected(Rejection),
    EntrySubmitted,
}

/// An approved, sized entry ready for the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDecision {
    pub symbol: String,
    pub intent: TradeIntent,
    pub approval: Approval,
    /// Decision-bar close the sizing was computed against.
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct CycleOutput {
    pub market: MarketRegime,
    /// All candidate scores, ranked, including gated ones.
    pub scores: Vec<ScoreResult>,
    pub outcomes: BTreeMap<String, CandidateOutcome>,
    pub entries: Vec<EntryDecision>,
    pub exits: Vec<ExitDecision>,
    pub next_portfolio: PortfolioState,
    pub next_strategy: StrategyState,
}

/// Run one decision cycle. Fails only when the benchmark itself cannot be
/// classified; per-instrument data problems skip that instrument alone.
pub fn advance(
    input: &CycleInput<'_>,
    strategy: &StrategyState,
    cfg: &EngineConfig,
) -> Result<CycleOutput, DataError> {
    let market = market_regime(input.benchmark, &cfg.regime)?;
    let table = cfg.policy_table();
    let policy = table.resolve(market);

    let mut mgr = LifecycleManager::new(cfg.lifecycle.clone(), input.portfolio.clone());
    mgr.roll_day(input.now, input.equity);

    let by_symbol: BTreeMap<&str, &[Bar]> = input
        .candidates
        .iter()
        .map(|c| (c.symbol, c.bars))
        .collect();
    let last_prices: BTreeMap<String, f64> = by_symbol
        .iter()
        .filter_map(|(sym, bars)| bars.last().map(|b| (sym.to_string(), b.close)))
        .collect();

    // Exits first: open positions are managed every bar no matter what
    // the entry side of the cycle decides.
    let mut exits = Vec::new();
    let open_symbols: Vec<String> = mgr.portfolio().positions.keys().cloned().collect();
    for symbol in &open_symbols {
        if let Some(price) = last_prices.get(symbol) {
            if let Some(exit) = mgr.on_price(symbol, *price, input.now) {
                exits.push(exit);
            }
        }
    }

    let mut next_strategy = strategy.clone();
    let mut outcomes: BTreeMap<String, CandidateOutcome> = BTreeMap::new();
    let mut scores = Vec::new();
    let mut snapshots: BTreeMap<String, Snapshot> = BTreeMap::new();

    for candidate in input.candidates {
        let symbol = candidate.symbol.to_string();
        let snap = match Snapshot::compute(candidate.bars, &cfg.indicators) {
            Ok(snap) => snap,
            Err(err) => {
                tracing::debug!(symbol = %symbol, error = %err, "candidate skipped");
                outcomes.insert(
                    symbol,
                    CandidateOutcome::Skipped {
                        reason: err.to_string(),
                    },
                );
                continue;
            }
        };

        // The state machine and the hysteresis advance every bar, gated
        // or not; they track price action, not permission to trade.
        let tracker = next_strategy
            .entry_trackers
            .entry(symbol.clone())
            .or_default();
        if let Err(err) = tracker.on_bar(candidate.bars, &policy.entry) {
            outcomes.insert(
                symbol,
                CandidateOutcome::Skipped {
                    reason: err.to_string(),
                },
            );
            continue;
        }
        let previous = next_strategy
            .instrument_regimes
            .get(&symbol)
            .copied()
            .unwrap_or(InstrumentRegime::Ranging);
        let instrument = match instrument_regime(candidate.bars, previous, &cfg.regime) {
            Ok(regime) => regime,
            Err(err) => {
                outcomes.insert(
                    symbol,
                    CandidateOutcome::Skipped {
                        reason: err.to_string(),
                    },
                );
                continue;
            }
        };
        next_strategy
            .instrument_regimes
            .insert(symbol.clone(), instrument);

        scores.push(score(&symbol, &snap, &cfg.scoring));
        snapshots.insert(symbol, snap);
    }
    rank(&mut scores);

    let cycle_block = if !market.allows_entries() {
        Some(Rejection::RegimeGate)
    } else {
        mgr.entries_blocked(input.now)
    };

    let mut entries: Vec<EntryDecision> = Vec::new();
    // Accepted entries count against the book within this same cycle.
    let mut accepted_histories: Vec<(&str, &[Bar])> = Vec::new();
    let mut open_histories: Vec<(&str, &[Bar])> = Vec::new();
    for symbol in mgr.portfolio().positions.keys() {
        if let Some((key, bars)) = by_symbol.get_key_value(symbol.as_str()) {
            open_histories.push((key, bars));
        }
    }
    let mut committed_value: f64 = mgr.portfolio().gross_exposure(&last_prices);
    let exposure_cap = input.equity * cfg.max_total_exposure_pct;

    for result in &scores {
        let symbol = result.symbol.clone();
        if mgr.portfolio().has_position(&symbol) {
            outcomes.insert(symbol, CandidateOutcome::Held);
            continue;
        }
        if let Some(block) = &cycle_block {
            outcomes.insert(symbol, CandidateOutcome::Rejected(block.clone()));
            continue;
        }
        if next_strategy.instrument_regimes.get(&symbol).copied()
            != Some(InstrumentRegime::Trending)
        {
            outcomes.insert(symbol, CandidateOutcome::Rejected(Rejection::RegimeGate));
            continue;
        }
        if result.is_disqualified() || result.score < cfg.min_score {
            outcomes.insert(
                symbol,
                CandidateOutcome::Rejected(Rejection::ScoreBelowMinimum {
                    score: result.score,
                    minimum: cfg.min_score,
                }),
            );
            continue;
        }
        // Every scored candidate leaves a record in the audit map, even on
        // paths that cannot occur for a symbol that made it this far.
        let Some(tracker) = next_strategy.entry_trackers.get_mut(&symbol) else {
            outcomes.insert(
                symbol,
                CandidateOutcome::Skipped {
                    reason: "no entry tracker".to_string(),
                },
            );
            continue;
        };
        if !tracker.take_signal() {
            outcomes.insert(symbol, CandidateOutcome::NoSignal);
            continue;
        }
        if let Some(block) = mgr.symbol_blocked(&symbol, input.now) {
            outcomes.insert(symbol, CandidateOutcome::Rejected(block));
            continue;
        }
        if mgr.portfolio().open_position_count() + entries.len() >= policy.risk.max_positions {
            outcomes.insert(symbol, CandidateOutcome::Rejected(Rejection::MaxPositions));
            continue;
        }
        let (Some(bars), Some(snap), Some(price)) = (
            by_symbol.get(symbol.as_str()).copied(),
            snapshots.get(&symbol),
            last_prices.get(&symbol).copied(),
        ) else {
            outcomes.insert(
                symbol,
                CandidateOutcome::Skipped {
                    reason: "missing bars or quote".to_string(),
                },
            );
            continue;
        };

        let mut histories = open_histories.clone();
        histories.extend_from_slice(&accepted_histories);
        let approval = match risk::evaluate(
            &policy.risk,
            result,
            input.equity,
            price,
            snap.atr,
            bars,
            mgr.portfolio(),
            &histories,
        ) {
            Ok(approval) => approval,
            Err(rejection) => {
                outcomes.insert(symbol, CandidateOutcome::Rejected(rejection));
                continue;
            }
        };
        if committed_value + approval.position_value > exposure_cap {
            outcomes.insert(symbol, CandidateOutcome::Rejected(Rejection::ExposureCap));
            continue;
        }

        committed_value += approval.position_value;
        if let Some((key, cand_bars)) = by_symbol.get_key_value(symbol.as_str()) {
            accepted_histories.push((key, cand_bars));
        }
        outcomes.insert(symbol.clone(), CandidateOutcome::EntrySubmitted);
        entries.push(EntryDecision {
            intent: TradeIntent::market_buy(symbol.clone(), approval.quantity),
            symbol,
            approval,
            price,
        });
    }

    Ok(CycleOutput {
        market,
        scores,
        outcomes,
        entries,
        exits,
        next_portfolio: mgr.into_portfolio(),
        next_strategy,
    })
}
