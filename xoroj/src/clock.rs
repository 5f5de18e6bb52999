//! Clock capability.
//!
//! Phase derivation never reads the platform clock itself; it asks an
//! injected [`Clock`]. Implementations:
//!
//! - [`SystemClock`]: wall clock (`Utc::now`), may jump backwards
//! - [`AnchoredClock`]: server time anchored once, advanced monotonically
//! - [`ManualClock`]: settable clock for deterministic driving

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time of the local machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Server time, anchored at construction and advanced on the tokio
/// monotonic clock.
///
/// Built from the `now` reported by the backend, this removes the local
/// machine's clock offset from phase derivation and is immune to local
/// clock corrections. Under a paused tokio runtime it advances with
/// `tokio::time::advance`.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredClock {
    anchor: DateTime<Utc>,
    origin: Instant,
}

impl AnchoredClock {
    /// Anchors the clock so that `now()` returns `server_now` at this
    /// moment.
    #[must_use]
    pub fn new(server_now: DateTime<Utc>) -> Self {
        Self {
            anchor: server_now,
            origin: Instant::now(),
        }
    }

    /// Offset of the anchored time relative to the local wall clock at
    /// construction. Positive when the server is ahead.
    #[must_use]
    pub fn offset_from(&self, local_now: DateTime<Utc>) -> TimeDelta {
        self.anchor - local_now
    }
}

impl Clock for AnchoredClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Sets the current instant. Moving backwards is allowed.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Moves the clock by `delta`, which may be negative.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }

    /// Moves the clock forward by a std duration.
    pub fn advance_std(&self, delta: std::time::Duration) {
        self.advance(TimeDelta::from_std(delta).unwrap_or(TimeDelta::MAX));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}
