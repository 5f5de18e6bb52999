//! Contest window, phase and action gate.
//!
//! A contest's phase is a pure function of its window and an instant:
//!
//! - `now < start`          → [`ContestPhase::Upcoming`]
//! - `start <= now < end`   → [`ContestPhase::Running`]
//! - `now >= end`           → [`ContestPhase::Ended`]
//!
//! The [`ActionGate`] and the next phase boundary are derived from the
//! phase. None of these values are cached; callers re-derive them from a
//! fresh clock reading whenever they need them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::WindowError;

/// Backend identifier of a contest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContestId(pub u64);

impl fmt::Display for ContestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContestId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Temporal phase of a contest relative to an instant.
///
/// Serialized with the backend's `ContestStatus` labels. The front end's
/// lowercase labels (including `finished` for an ended contest) are
/// accepted when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContestPhase {
    /// The contest has not started yet.
    #[serde(rename = "UPCOMING", alias = "upcoming")]
    Upcoming,
    /// The contest is in progress.
    #[serde(rename = "RUNNING", alias = "running")]
    Running,
    /// The contest is over.
    #[serde(rename = "ENDED", alias = "ended", alias = "finished", alias = "FINISHED")]
    Ended,
}

impl ContestPhase {
    /// Returns the backend label for this phase.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "UPCOMING",
            Self::Running => "RUNNING",
            Self::Ended => "ENDED",
        }
    }
}

impl fmt::Display for ContestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI capabilities derived from a phase and the registration flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionGate {
    /// The user may register: the contest has not ended and they are not
    /// registered yet.
    pub can_register: bool,
    /// The user may enter the live contest: it is running and they are
    /// registered. Post-contest access goes through standings instead.
    pub can_enter: bool,
    /// Standings are visible once the contest has started.
    pub can_view_standings: bool,
}

impl ActionGate {
    /// Derives the gate for `phase` and the registration flag.
    #[must_use]
    pub const fn derive(phase: ContestPhase, registered: bool) -> Self {
        Self {
            can_register: !matches!(phase, ContestPhase::Ended) && !registered,
            can_enter: matches!(phase, ContestPhase::Running) && registered,
            can_view_standings: !matches!(phase, ContestPhase::Upcoming),
        }
    }
}

/// Start/end instants of a contest plus the viewer's registration flag.
///
/// This is the raw record as received from the backend. It is not
/// validated on construction; [`ContestWindow::validate`] checks the
/// `end > start` invariant and the controller refuses windows that fail
/// it. The derivation methods are total and accept any window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestWindow {
    /// Contest start instant.
    #[serde(deserialize_with = "deserialize_instant")]
    pub start_time: DateTime<Utc>,
    /// Contest end instant.
    #[serde(deserialize_with = "deserialize_instant")]
    pub end_time: DateTime<Utc>,
    /// Whether the viewing user has registered.
    #[serde(default)]
    pub registered: bool,
}

impl ContestWindow {
    /// Creates a window without validating it.
    #[must_use]
    pub const fn new(start_time: DateTime<Utc>, end_time: DateTime<Utc>, registered: bool) -> Self {
        Self {
            start_time,
            end_time,
            registered,
        }
    }

    /// Checks that the end time lies strictly after the start time.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::InvalidWindow`] when `end_time <= start_time`.
    pub fn validate(&self) -> Result<(), WindowError> {
        if self.end_time <= self.start_time {
            return Err(WindowError::InvalidWindow {
                start: self.start_time,
                end: self.end_time,
            });
        }
        Ok(())
    }

    /// Returns a copy with the registration flag replaced.
    #[must_use]
    pub const fn with_registered(self, registered: bool) -> Self {
        Self { registered, ..self }
    }

    /// Length of the contest.
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end_time - self.start_time
    }

    /// Phase of the contest at `now`.
    #[must_use]
    pub fn phase_at(&self, now: DateTime<Utc>) -> ContestPhase {
        if now < self.start_time {
            ContestPhase::Upcoming
        } else if now < self.end_time {
            ContestPhase::Running
        } else {
            ContestPhase::Ended
        }
    }

    /// Action gate at `now`.
    #[must_use]
    pub fn gate_at(&self, now: DateTime<Utc>) -> ActionGate {
        ActionGate::derive(self.phase_at(now), self.registered)
    }

    /// Earliest instant strictly after `now` at which the phase changes,
    /// or `None` once the contest has ended.
    #[must_use]
    pub fn next_boundary_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.phase_at(now) {
            ContestPhase::Upcoming => Some(self.start_time),
            ContestPhase::Running => Some(self.end_time),
            ContestPhase::Ended => None,
        }
    }

    /// Time remaining until the start, clamped at zero.
    #[must_use]
    pub fn time_until_start(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.start_time - now).to_std().unwrap_or_default()
    }
}

/// Parses an instant as sent by the backend.
///
/// Accepts RFC 3339 with an offset (`2025-01-01T10:00:00Z`) or the
/// zone-less `LocalDateTime` form (`2025-01-01T10:00:00`, optional
/// fractional seconds), which is taken to be UTC.
///
/// # Errors
///
/// Returns the `chrono` parse error of the zone-less attempt when
/// neither form matches.
pub fn parse_instant(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
}

fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).map_err(|e| serde::de::Error::custom(format!("invalid instant '{raw}': {e}")))
}
