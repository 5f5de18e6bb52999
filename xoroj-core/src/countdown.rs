//! Countdown rendering for contest cards.

use std::time::Duration;

/// Label shown once the start instant has passed.
pub const STARTED_LABEL: &str = "Contest Started!";

/// Renders a remaining duration as `"{h}h {m}m {s}s"`.
///
/// Sub-second remainders are truncated, so 999 ms renders as `0h 0m 0s`.
/// Hours are not wrapped into days.
#[must_use]
pub fn format_countdown(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours}h {minutes}m {seconds}s")
}

/// Renders the countdown to a contest start.
///
/// Any non-zero remaining time is formatted with [`format_countdown`];
/// zero means the contest has started.
#[must_use]
pub fn countdown_label(remaining: Duration) -> String {
    if remaining.is_zero() {
        STARTED_LABEL.to_owned()
    } else {
        format_countdown(remaining)
    }
}
