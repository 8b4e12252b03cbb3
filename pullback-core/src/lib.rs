//! Pullback Core — the decision engine for a trend-pullback equity strategy.
//!
//! This crate contains everything that decides, nothing that performs I/O:
//! - Domain types (bars, positions, portfolio, broker intents)
//! - Pure indicator functions and the per-bar snapshot
//! - Quality scoring with hard disqualifiers and ranked components
//! - Market and instrument regime classification with hysteresis
//! - The pullback-confirmation entry state machine
//! - Ordered risk checks and equity-fraction sizing
//! - Position lifecycle with ratcheting trailing stops
//! - The per-bar decision cycle as a pure function over snapshots
//!
//! Market data, order routing, and persistence live in external
//! collaborators that hand the core already-resolved data structures.

pub mod config;
pub mod cycle;
pub mod domain;
pub mod entry;
pub mod error;
pub mod indicators;
pub mod lifecycle;
pub mod policy;
pub mod regime;
pub mod risk;
pub mod scoring;
