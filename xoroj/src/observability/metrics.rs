//! Metrics collection for `xoroj`.
//!
//! Prometheus-compatible metrics recorded through the `metrics` facade.
//! All label values come from closed sets (phase labels, outcome names)
//! so cardinality stays bounded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use xoroj_core::ContestPhase;

use crate::error::XorOjError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Outcome label for a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Backend accepted the registration
    Accepted,
    /// Rejected locally: already registered
    AlreadyRegistered,
    /// Rejected locally: contest over
    ContestEnded,
    /// Request failed
    Failed,
}

impl RegistrationOutcome {
    const fn as_label(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AlreadyRegistered => "already_registered",
            Self::ContestEnded => "contest_ended",
            Self::Failed => "failed",
        }
    }
}

/// Initializes the global metrics recorder.
///
/// With `port`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`; without it the recorder is installed with no
/// endpoint.
///
/// # Errors
///
/// Returns `XorOjError::Io` if the recorder or listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), XorOjError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| XorOjError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    describe_counter!(
        "xoroj_boundary_firings_total",
        "Phase boundary wake-ups fired, by observed phase"
    );
    describe_counter!(
        "xoroj_registrations_total",
        "Registration attempts by outcome"
    );
    describe_histogram!(
        "xoroj_registration_duration_ms",
        "Registration request duration in milliseconds"
    );
    describe_gauge!(
        "xoroj_controllers_active",
        "Phase controllers currently alive"
    );
}

/// Records a boundary wake-up and the phase observed after it.
pub fn record_boundary(phase: ContestPhase) {
    counter!("xoroj_boundary_firings_total", "phase" => phase.as_str()).increment(1);
}

/// Records the outcome of a `register()` call.
pub fn record_registration(outcome: RegistrationOutcome) {
    counter!("xoroj_registrations_total", "outcome" => outcome.as_label()).increment(1);
}

/// Records how long a registration request took.
pub fn record_registration_duration(duration: Duration) {
    histogram!("xoroj_registration_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Tracks controller construction.
pub fn controller_created() {
    gauge!("xoroj_controllers_active").increment(1.0);
}

/// Tracks controller disposal.
pub fn controller_disposed() {
    gauge!("xoroj_controllers_active").decrement(1.0);
}
