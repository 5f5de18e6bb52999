//! `XorOJ` - contest phase controller
//!
//! Keeps contest views in step with the contest lifecycle: derives the
//! phase and action gate from an injected clock, wakes the view exactly
//! at each phase boundary, and guards registration against double
//! submission. Ships a REST client for the `XorOJ` backend and the
//! `xoroj` CLI built on top of both.

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod observability;
pub mod phase;
pub mod timer;

pub use xoroj_core::{ActionGate, ContestId, ContestPhase, ContestWindow, WindowError};
