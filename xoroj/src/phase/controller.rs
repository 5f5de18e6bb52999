//! Contest phase controller.
//!
//! One controller is built per displayed contest. It re-derives the phase
//! from the injected clock on every query and keeps exactly one one-shot
//! timer armed for the next phase boundary. When that timer fires the
//! view callback is invoked and the next boundary is scheduled from a
//! fresh clock reading.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use xoroj_core::{ActionGate, ContestId, ContestPhase, ContestWindow, WindowError, countdown_label};

use crate::clock::Clock;
use crate::error::{NetworkFailure, RegistrationError};
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics::{self, RegistrationOutcome};
use crate::timer::{Timer, TimerToken};

use super::registration::RegistrationService;

/// Margin added past each boundary so the wake-up observes the new phase
/// despite timer and clock quantization.
pub const DEFAULT_SKEW_MARGIN: Duration = Duration::from_millis(20);

/// View callback invoked after each boundary wake-up. It carries no
/// arguments: the view re-reads `current_phase()` / `gate()`.
pub type BoundaryCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Capabilities injected into a controller.
#[derive(Clone)]
pub struct Collaborators {
    /// Time source for every phase derivation
    pub clock: Arc<dyn Clock>,
    /// One-shot timer for boundary wake-ups
    pub timer: Arc<dyn Timer>,
    /// Backend registration endpoint
    pub registration: Arc<dyn RegistrationService>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// Tunables for a controller.
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Added to every boundary delay. With a zero margin a wake-up that
    /// lands a hair early re-targets the same boundary.
    pub skew_margin: Duration,
    /// Optional structured event sink.
    pub events: Option<Arc<EventEmitter>>,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            skew_margin: DEFAULT_SKEW_MARGIN,
            events: None,
        }
    }
}

/// Outstanding wake-up plus a generation counter. A firing whose
/// generation no longer matches was superseded and is ignored.
#[derive(Debug, Default)]
struct PendingWake {
    token: Option<TimerToken>,
    generation: u64,
}

struct Inner {
    contest_id: ContestId,
    window: RwLock<ContestWindow>,
    registered: AtomicBool,
    clock: Arc<dyn Clock>,
    timer: Arc<dyn Timer>,
    registration: Arc<dyn RegistrationService>,
    on_boundary: BoundaryCallback,
    skew_margin: Duration,
    events: Option<Arc<EventEmitter>>,
    pending: Mutex<PendingWake>,
    disposed: AtomicBool,
    register_lock: tokio::sync::Mutex<()>,
}

/// Derives a contest's phase and action gate and wakes the view at each
/// phase boundary.
///
/// Single-owner: dropping the controller disposes it. Timer callbacks
/// only hold a weak reference, so a pending wake-up never keeps a
/// dropped controller alive.
pub struct ContestPhaseController {
    inner: Arc<Inner>,
}

impl ContestPhaseController {
    /// Builds a controller and arms the first boundary wake-up.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::InvalidWindow`] when the window's end does
    /// not lie after its start. No controller is built in that case.
    pub fn create(
        contest_id: ContestId,
        window: ContestWindow,
        collaborators: Collaborators,
        options: ControllerOptions,
        on_boundary: impl Fn() + Send + Sync + 'static,
    ) -> Result<Self, WindowError> {
        window.validate().inspect_err(|e| {
            warn!(%contest_id, error = %e, "rejecting malformed contest window");
        })?;

        let inner = Arc::new(Inner {
            contest_id,
            window: RwLock::new(window),
            registered: AtomicBool::new(window.registered),
            clock: collaborators.clock,
            timer: collaborators.timer,
            registration: collaborators.registration,
            on_boundary: Box::new(on_boundary),
            skew_margin: options.skew_margin,
            events: options.events,
            pending: Mutex::new(PendingWake::default()),
            disposed: AtomicBool::new(false),
            register_lock: tokio::sync::Mutex::new(()),
        });

        metrics::controller_created();
        let now = inner.clock.now();
        let phase = window.phase_at(now);
        let next_boundary = window.next_boundary_at(now);
        debug!(%contest_id, %phase, ?next_boundary, "phase controller created");
        inner.emit(Event::ControllerCreated {
            timestamp: now,
            contest_id,
            phase,
            next_boundary,
        });

        inner.reschedule();
        Ok(Self { inner })
    }

    /// Contest this controller watches.
    #[must_use]
    pub fn contest_id(&self) -> ContestId {
        self.inner.contest_id
    }

    /// Current window, with the live registration flag.
    #[must_use]
    pub fn window(&self) -> ContestWindow {
        self.inner.window()
    }

    /// Phase at the clock's current reading. Never cached.
    #[must_use]
    pub fn current_phase(&self) -> ContestPhase {
        self.inner.current_phase()
    }

    /// Action gate at the clock's current reading.
    #[must_use]
    pub fn gate(&self) -> ActionGate {
        let now = self.inner.clock.now();
        self.inner.window().gate_at(now)
    }

    /// Next phase boundary after the clock's current reading, or `None`
    /// once the contest has ended.
    #[must_use]
    pub fn next_boundary(&self) -> Option<DateTime<Utc>> {
        let now = self.inner.clock.now();
        self.inner.window().next_boundary_at(now)
    }

    /// Remaining time until the start, zero once started.
    #[must_use]
    pub fn time_until_start(&self) -> Duration {
        let now = self.inner.clock.now();
        self.inner.window().time_until_start(now)
    }

    /// Countdown text for the contest card.
    #[must_use]
    pub fn countdown(&self) -> String {
        countdown_label(self.time_until_start())
    }

    /// Whether the backend has confirmed the viewer's registration.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.inner.registered.load(Ordering::SeqCst)
    }

    /// Whether [`dispose`](Self::dispose) has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Registers the viewer for the contest.
    ///
    /// Calls are serialized: a call issued while another is in flight
    /// waits for it and then re-checks the registration flag, so at most
    /// one accepted submission reaches the service. The flag is set only
    /// after the service confirms.
    ///
    /// The submission runs on its own task. Dropping the returned future
    /// does not abandon a request already sent: its outcome still updates
    /// the flag and later calls wait for it.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::AlreadyRegistered`]: already registered, no
    ///   request sent
    /// - [`RegistrationError::ContestEnded`]: contest over, no request sent
    /// - [`RegistrationError::NetworkFailure`]: the service failed; the
    ///   controller stays usable and the call may be retried
    pub async fn register(&self) -> Result<(), RegistrationError> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.register().await })
            .await
            .unwrap_or_else(|e| {
                Err(NetworkFailure::new(format!("registration task failed: {e}")).into())
            })
    }

    /// Replaces the window, e.g. after re-fetching the contest, and
    /// re-arms the boundary wake-up.
    ///
    /// A confirmed registration is never revoked by a refresh.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::InvalidWindow`] for a malformed window; the
    /// previous window and wake-up stay in force.
    pub fn refresh(&self, window: ContestWindow) -> Result<(), WindowError> {
        window.validate()?;
        *self
            .inner
            .window
            .write()
            .unwrap_or_else(PoisonError::into_inner) = window;
        if window.registered {
            self.inner.registered.store(true, Ordering::SeqCst);
        }
        debug!(contest_id = %self.inner.contest_id, "contest window refreshed");
        self.inner.reschedule();
        Ok(())
    }

    /// Cancels the pending wake-up. Idempotent; no boundary callback runs
    /// afterwards.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for ContestPhaseController {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for ContestPhaseController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContestPhaseController")
            .field("contest_id", &self.inner.contest_id)
            .field("window", &self.inner.window())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn window(&self) -> ContestWindow {
        self.window
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .with_registered(self.registered.load(Ordering::SeqCst))
    }

    fn current_phase(&self) -> ContestPhase {
        self.window().phase_at(self.clock.now())
    }

    fn lock_pending(&self) -> MutexGuard<'_, PendingWake> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }

    /// Cancels the outstanding wake-up and arms one for the next boundary
    /// computed from a fresh clock reading.
    fn reschedule(self: &Arc<Self>) {
        let mut pending = self.lock_pending();
        if let Some(token) = pending.token.take() {
            self.timer.cancel(token);
        }
        pending.generation = pending.generation.wrapping_add(1);
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let now = self.clock.now();
        let Some(boundary) = self.window().next_boundary_at(now) else {
            debug!(contest_id = %self.contest_id, "contest ended; no wake-up scheduled");
            return;
        };

        let delay = (boundary - now).to_std().unwrap_or_default() + self.skew_margin;
        let generation = pending.generation;
        let weak = Arc::downgrade(self);
        let token = self.timer.schedule_once(
            delay,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.on_wake(generation);
                }
            }),
        );
        debug!(
            contest_id = %self.contest_id,
            %boundary,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "boundary wake-up scheduled"
        );
        pending.token = Some(token);
    }

    fn on_wake(self: &Arc<Self>, generation: u64) {
        {
            let mut pending = self.lock_pending();
            if self.disposed.load(Ordering::SeqCst) || pending.generation != generation {
                return;
            }
            pending.token = None;
        }

        let now = self.clock.now();
        let phase = self.window().phase_at(now);
        info!(contest_id = %self.contest_id, %phase, "contest phase boundary reached");
        metrics::record_boundary(phase);
        self.emit(Event::BoundaryReached {
            timestamp: now,
            contest_id: self.contest_id,
            phase,
        });

        (self.on_boundary)();
        self.reschedule();
    }

    #[allow(clippy::significant_drop_tightening)]
    async fn register(&self) -> Result<(), RegistrationError> {
        let _guard = self.register_lock.lock().await;

        if self.registered.load(Ordering::SeqCst) {
            debug!(contest_id = %self.contest_id, "registration skipped: already registered");
            metrics::record_registration(RegistrationOutcome::AlreadyRegistered);
            return Err(RegistrationError::AlreadyRegistered);
        }
        if self.current_phase() == ContestPhase::Ended {
            debug!(contest_id = %self.contest_id, "registration skipped: contest ended");
            metrics::record_registration(RegistrationOutcome::ContestEnded);
            return Err(RegistrationError::ContestEnded);
        }

        let started = Instant::now();
        let result = self.registration.submit(self.contest_id).await;
        let elapsed = started.elapsed();
        metrics::record_registration_duration(elapsed);
        let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                self.registered.store(true, Ordering::SeqCst);
                info!(contest_id = %self.contest_id, duration_ms, "registered for contest");
                metrics::record_registration(RegistrationOutcome::Accepted);
                self.emit(Event::RegistrationCompleted {
                    timestamp: self.clock.now(),
                    contest_id: self.contest_id,
                    success: true,
                    error: None,
                    duration_ms,
                });
                Ok(())
            }
            Err(failure) => {
                warn!(contest_id = %self.contest_id, error = %failure, "registration failed");
                metrics::record_registration(RegistrationOutcome::Failed);
                self.emit(Event::RegistrationCompleted {
                    timestamp: self.clock.now(),
                    contest_id: self.contest_id,
                    success: false,
                    error: Some(failure.message.clone()),
                    duration_ms,
                });
                Err(failure.into())
            }
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(token) = self.lock_pending().token.take() {
            self.timer.cancel(token);
        }
        metrics::controller_disposed();
        debug!(contest_id = %self.contest_id, "phase controller disposed");
        self.emit(Event::ControllerDisposed {
            timestamp: self.clock.now(),
            contest_id: self.contest_id,
        });
    }
}
