//! One-shot timer capability.
//!
//! The phase controller schedules its boundary wake-ups through a
//! [`Timer`] so the scheduling protocol can be driven deterministically.
//!
//! Contract for implementations: a callback never runs before
//! `schedule_once` has returned, and a callback whose token was cancelled
//! before the firing task claimed it does not run. A firing that was
//! already claimed can still start after `cancel` returns, so callers
//! must recognize stale firings themselves.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Callback run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Handle identifying a scheduled wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken(u64);

impl TimerToken {
    /// Raw identifier, unique per timer instance.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// Single-shot timer primitive.
pub trait Timer: Send + Sync {
    /// Runs `callback` once after `delay`.
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> TimerToken;

    /// Cancels a pending wake-up. Cancelling a fired or unknown token is
    /// a no-op.
    fn cancel(&self, token: TimerToken);
}

// ============================================================================
// Tokio timer
// ============================================================================

/// Timer backed by spawned `tokio::time::sleep` tasks.
///
/// Each pending wake-up owns a [`CancellationToken`] tracked in a
/// concurrent map. Whoever removes the map entry first (the firing task
/// or `cancel`) decides whether the callback runs.
pub struct TokioTimer {
    handle: Handle,
    next_id: AtomicU64,
    pending: Arc<DashMap<u64, CancellationToken>>,
}

impl TokioTimer {
    /// Creates a timer spawning onto the given runtime.
    #[must_use]
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            next_id: AtomicU64::new(0),
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Creates a timer spawning onto the current runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Number of wake-ups scheduled and not yet fired or cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Timer for TokioTimer {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> TimerToken {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        self.pending.insert(id, cancel.clone());

        let pending = Arc::clone(&self.pending);
        self.handle.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    trace!(id, "timer cancelled");
                }
                () = tokio::time::sleep(delay) => {
                    if pending.remove(&id).is_some() {
                        trace!(id, "timer fired");
                        callback();
                    }
                }
            }
        });

        TimerToken(id)
    }

    fn cancel(&self, token: TimerToken) {
        if let Some((_, cancel)) = self.pending.remove(&token.0) {
            cancel.cancel();
        }
    }
}

impl std::fmt::Debug for TokioTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioTimer")
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Manual timer
// ============================================================================

struct Scheduled {
    token: TimerToken,
    delay: Duration,
    callback: TimerCallback,
}

#[derive(Default)]
struct ManualTimerInner {
    next_id: u64,
    queue: Vec<Scheduled>,
}

/// Timer whose wake-ups fire only when [`ManualTimer::fire_next`] is
/// called.
///
/// Pair it with a `ManualClock`: read [`next_delay`](Self::next_delay),
/// advance the clock by that much, then fire.
#[derive(Default)]
pub struct ManualTimer {
    inner: Mutex<ManualTimerInner>,
}

impl ManualTimer {
    /// Creates an empty timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending wake-ups.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.lock().queue.len()
    }

    /// Delay requested by the oldest pending wake-up.
    #[must_use]
    pub fn next_delay(&self) -> Option<Duration> {
        self.lock().queue.first().map(|s| s.delay)
    }

    /// Fires the oldest pending wake-up and returns its requested delay.
    ///
    /// The callback runs after the internal lock is released, so it may
    /// schedule or cancel on this timer.
    pub fn fire_next(&self) -> Option<Duration> {
        let scheduled = {
            let mut inner = self.lock();
            if inner.queue.is_empty() {
                return None;
            }
            inner.queue.remove(0)
        };
        trace!(id = scheduled.token.0, "manual timer fired");
        (scheduled.callback)();
        Some(scheduled.delay)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualTimerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Timer for ManualTimer {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> TimerToken {
        let mut inner = self.lock();
        let token = TimerToken(inner.next_id);
        inner.next_id += 1;
        inner.queue.push(Scheduled {
            token,
            delay,
            callback,
        });
        token
    }

    fn cancel(&self, token: TimerToken) {
        self.lock().queue.retain(|s| s.token != token);
    }
}

impl std::fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualTimer")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
