//! `xoroj register`: register the configured user for a contest.

use std::sync::Arc;

use tracing::warn;

use crate::cli::args::RegisterArgs;
use crate::clock::SystemClock;
use crate::error::{RegistrationError, XorOjError};
use crate::phase::{Collaborators, ContestPhaseController, ControllerOptions};
use crate::timer::TokioTimer;

use super::connect;

/// Runs `xoroj register`.
///
/// Goes through a phase controller so the same guards apply as in a
/// view: an ended contest or an existing registration sends no request.
/// An existing registration is reported and is not an error.
///
/// # Errors
///
/// Returns an error if configuration or the backend is unusable, the
/// window is malformed, or the registration fails.
pub async fn run(args: &RegisterArgs, quiet: bool) -> Result<(), XorOjError> {
    let (config, client) = connect(args.config.as_deref())?;
    if !client.is_authenticated() {
        warn!("no API token configured; the backend will likely refuse registration");
    }
    let (detail, window) = client.fetch_window(args.contest_id).await?;
    if !detail.allow_registration {
        warn!(contest_id = %args.contest_id, "contest does not advertise open registration");
    }

    let controller = ContestPhaseController::create(
        args.contest_id,
        window,
        Collaborators {
            clock: Arc::new(SystemClock),
            timer: Arc::new(TokioTimer::current()),
            registration: client,
        },
        ControllerOptions {
            skew_margin: config.controller.skew_margin,
            events: None,
        },
        || {},
    )?;

    let outcome = controller.register().await;
    controller.dispose();

    match outcome {
        Ok(()) => {
            if !quiet {
                println!("registered for contest {}", args.contest_id);
            }
            Ok(())
        }
        Err(RegistrationError::AlreadyRegistered) => {
            if !quiet {
                println!("already registered for contest {}", args.contest_id);
            }
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
