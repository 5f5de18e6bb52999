//! Core error types for `XorOJ`
//!
//! Errors raised while validating contest data received from the backend.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Contest window validation errors.
///
/// A window that fails validation must not be used to build a
/// controller; the caller renders an error state for that contest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    /// The end time does not lie strictly after the start time.
    #[error("invalid contest window: end {end} is not after start {start}")]
    InvalidWindow {
        /// Start instant as received
        start: DateTime<Utc>,
        /// End instant as received
        end: DateTime<Utc>,
    },
}
