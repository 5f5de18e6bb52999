//! Structured controller event stream.
//!
//! Discrete, typed events emitted by phase controllers, serialized as
//! newline-delimited JSON with a monotonically increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use xoroj_core::{ContestId, ContestPhase};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// A discrete event emitted during controller operation.
///
/// Tagged with `"type"` when serialized. Timestamps come from the
/// controller's injected clock, not the wall clock.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A controller was built for a contest.
    ControllerCreated {
        /// Clock reading at construction.
        timestamp: DateTime<Utc>,
        /// Contest the controller watches.
        contest_id: ContestId,
        /// Phase at construction.
        phase: ContestPhase,
        /// First scheduled boundary, if any.
        next_boundary: Option<DateTime<Utc>>,
    },

    /// A scheduled boundary wake-up fired.
    BoundaryReached {
        /// Clock reading when the wake-up ran.
        timestamp: DateTime<Utc>,
        /// Contest the controller watches.
        contest_id: ContestId,
        /// Phase observed after the boundary.
        phase: ContestPhase,
    },

    /// A registration request reached the backend and resolved.
    RegistrationCompleted {
        /// Clock reading when the request resolved.
        timestamp: DateTime<Utc>,
        /// Contest registered for.
        contest_id: ContestId,
        /// Whether the backend accepted the registration.
        success: bool,
        /// Failure message when `success` is false.
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        /// Request duration in milliseconds.
        duration_ms: u64,
    },

    /// The controller was disposed.
    ControllerDisposed {
        /// Clock reading at disposal.
        timestamp: DateTime<Utc>,
        /// Contest the controller watched.
        contest_id: ContestId,
    },
}

/// Wraps an [`Event`] with its sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    sequence: u64,
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Every [`emit`](Self::emit) takes the next sequence number, writes one
/// line and flushes. Serialization and I/O failures are dropped.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that writes to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    ///
    /// The sequence number is taken under the writer lock, so lines land
    /// in sequence order even when controllers emit from several threads.
    pub fn emit(&self, event: Event) {
        let Ok(mut w) = self.writer.lock() else {
            return;
        };
        let envelope = EventEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            event,
        };
        if let Ok(line) = serde_json::to_string(&envelope) {
            let _ = writeln!(w, "{line}");
            let _ = w.flush();
        }
    }

    /// Number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
