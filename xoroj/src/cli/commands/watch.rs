//! `xoroj watch`: follow a contest through its phases.

use std::path::Path;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tokio::sync::mpsc;
use tracing::info;
use xoroj_core::ContestPhase;

use crate::cli::args::WatchArgs;
use crate::clock::{AnchoredClock, Clock, SystemClock};
use crate::error::XorOjError;
use crate::observability::EventEmitter;
use crate::phase::{Collaborators, ContestPhaseController, ControllerOptions};
use crate::timer::TokioTimer;

use super::connect;

/// Runs `xoroj watch`.
///
/// Prints one status line at start and one per phase boundary. Returns
/// when the contest ends or on Ctrl+C.
///
/// # Errors
///
/// Returns an error if configuration, the backend, or the contest window
/// is unusable.
pub async fn run(args: &WatchArgs) -> Result<(), XorOjError> {
    let (config, client) = connect(args.config.as_deref())?;
    let (detail, window) = client.fetch_window(args.contest_id).await?;

    let clock: Arc<dyn Clock> = if args.server_clock {
        let snapshot = client.fetch_contest_clock(args.contest_id).await?;
        let anchored = AnchoredClock::new(snapshot.now()?);
        info!(
            offset_ms = anchored.offset_from(Utc::now()).num_milliseconds(),
            "following server clock"
        );
        Arc::new(anchored)
    } else {
        Arc::new(SystemClock)
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let controller = ContestPhaseController::create(
        args.contest_id,
        window,
        Collaborators {
            clock: Arc::clone(&clock),
            timer: Arc::new(TokioTimer::current()),
            registration: client,
        },
        ControllerOptions {
            skew_margin: config.controller.skew_margin,
            events: open_events(args.events.as_deref())?,
        },
        move || {
            let _ = tx.send(());
        },
    )?;

    let title = if detail.title.is_empty() {
        format!("contest {}", args.contest_id)
    } else {
        detail.title
    };
    println!("{}", status_line(&title, &controller, clock.as_ref()));

    while controller.current_phase() != ContestPhase::Ended {
        tokio::select! {
            woke = rx.recv() => {
                if woke.is_none() {
                    break;
                }
                println!("{}", status_line(&title, &controller, clock.as_ref()));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("watch interrupted");
                break;
            }
        }
    }

    controller.dispose();
    Ok(())
}

fn open_events(path: Option<&Path>) -> Result<Option<Arc<EventEmitter>>, XorOjError> {
    let Some(path) = path else {
        return Ok(None);
    };
    let emitter = if path == Path::new("-") {
        EventEmitter::stdout()
    } else {
        EventEmitter::from_file(path)?
    };
    Ok(Some(Arc::new(emitter)))
}

/// One-line summary of the controller's current state.
pub(crate) fn status_line(title: &str, controller: &ContestPhaseController, clock: &dyn Clock) -> String {
    let gate = controller.gate();
    let flag = |b: bool| if b { "yes" } else { "no" };
    let next = controller.next_boundary().map_or_else(
        || "none".to_string(),
        |b| b.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    format!(
        "[{}] {title}: {} | register={} enter={} standings={} | next={next} | {}",
        clock.now().to_rfc3339_opts(SecondsFormat::Secs, true),
        controller.current_phase(),
        flag(gate.can_register),
        flag(gate.can_enter),
        flag(gate.can_view_standings),
        controller.countdown(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::NetworkFailure;
    use crate::phase::RegistrationService;
    use crate::timer::ManualTimer;
    use async_trait::async_trait;
    use xoroj_core::{ContestId, ContestWindow, parse_instant};

    struct Unused;

    #[async_trait]
    impl RegistrationService for Unused {
        async fn submit(&self, _contest_id: ContestId) -> Result<(), NetworkFailure> {
            Err(NetworkFailure::new("unused"))
        }
    }

    #[test]
    fn test_status_line() {
        let clock = Arc::new(ManualClock::new(parse_instant("2025-01-01T09:59:59Z").unwrap()));
        let controller = ContestPhaseController::create(
            ContestId(5),
            ContestWindow::new(
                parse_instant("2025-01-01T10:00:00Z").unwrap(),
                parse_instant("2025-01-01T12:00:00Z").unwrap(),
                false,
            ),
            Collaborators {
                clock: clock.clone(),
                timer: Arc::new(ManualTimer::new()),
                registration: Arc::new(Unused),
            },
            ControllerOptions::default(),
            || {},
        )
        .unwrap();

        assert_eq!(
            status_line("Round 1", &controller, clock.as_ref()),
            "[2025-01-01T09:59:59Z] Round 1: UPCOMING | register=yes enter=no standings=no \
             | next=2025-01-01T10:00:00Z | 0h 0m 1s"
        );
    }

    #[test]
    fn test_open_events_none() {
        assert!(open_events(None).unwrap().is_none());
    }

    #[test]
    fn test_open_events_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        assert!(open_events(Some(&path)).unwrap().is_some());
        assert!(path.exists());
    }
}
