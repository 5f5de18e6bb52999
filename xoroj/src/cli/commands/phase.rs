//! `xoroj phase`: offline phase computation.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use xoroj_core::{ActionGate, ContestPhase, ContestWindow, countdown_label};

use crate::cli::args::{OutputFormat, PhaseArgs};
use crate::clock::{Clock, SystemClock};
use crate::error::XorOjError;

/// Snapshot of everything derived from a window at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReport {
    pub at: DateTime<Utc>,
    pub phase: ContestPhase,
    pub gate: ActionGate,
    pub next_boundary: Option<DateTime<Utc>>,
    pub time_until_start_ms: u64,
    pub countdown: String,
}

impl PhaseReport {
    /// Derives the report for `window` at `now`.
    ///
    /// # Errors
    ///
    /// Returns `WindowError::InvalidWindow` for a malformed window.
    pub fn derive(window: &ContestWindow, now: DateTime<Utc>) -> Result<Self, XorOjError> {
        window.validate()?;
        let remaining = window.time_until_start(now);
        Ok(Self {
            at: now,
            phase: window.phase_at(now),
            gate: window.gate_at(now),
            next_boundary: window.next_boundary_at(now),
            time_until_start_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            countdown: countdown_label(remaining),
        })
    }

    /// Human-readable multi-line rendering.
    #[must_use]
    pub fn render_human(&self) -> String {
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        let mut out = String::new();
        let _ = writeln!(out, "phase:              {}", self.phase);
        let _ = writeln!(out, "can register:       {}", yes_no(self.gate.can_register));
        let _ = writeln!(out, "can enter:          {}", yes_no(self.gate.can_enter));
        let _ = writeln!(
            out,
            "can view standings: {}",
            yes_no(self.gate.can_view_standings)
        );
        let _ = writeln!(
            out,
            "next boundary:      {}",
            self.next_boundary.map_or_else(
                || "none".to_string(),
                |b| b.to_rfc3339_opts(SecondsFormat::Secs, true)
            )
        );
        let _ = write!(out, "countdown:          {}", self.countdown);
        out
    }
}

/// Runs `xoroj phase`.
///
/// # Errors
///
/// Returns `XorOjError::Window` for a malformed window.
pub fn run(args: &PhaseArgs) -> Result<(), XorOjError> {
    let window = ContestWindow::new(args.start, args.end, args.registered);
    let now = args.at.unwrap_or_else(|| SystemClock.now());
    let report = PhaseReport::derive(&window, now)?;

    match args.format {
        OutputFormat::Human => println!("{}", report.render_human()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
