//! Wire models for the `XorOJ` REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xoroj_core::{ContestId, ContestPhase, ContestWindow};

use crate::error::ApiError;

/// `GET /api/contests/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestDetail {
    pub id: ContestId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Start/end as sent by the backend. The registration flag is not
    /// part of this payload and reads `false` until merged.
    #[serde(flatten)]
    pub window: ContestWindow,
    /// Length in minutes.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    /// Server-computed phase, when the backend includes one.
    #[serde(default)]
    pub status: Option<ContestPhase>,
    #[serde(default = "allow_registration_default")]
    pub allow_registration: bool,
}

const fn allow_registration_default() -> bool {
    true
}

/// `GET /api/contests/{id}/is-registered`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RegistrationStatus {
    pub registered: bool,
}

/// `POST /api/contests/{id}/register`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Message used when a refused registration carries none.
pub const DEFAULT_REJECTION: &str = "Failed to register";

/// Error body the backend sends with 4xx answers.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
}

/// Contest clock embedded in `GET /api/standings/contests/{id}`.
///
/// Only the clock fields are read; rows and problem columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestClock {
    #[serde(default)]
    pub contest_id: Option<ContestId>,
    #[serde(default)]
    pub start_epoch_ms: Option<i64>,
    #[serde(default)]
    pub end_epoch_ms: Option<i64>,
    #[serde(default)]
    pub now_epoch_ms: Option<i64>,
    #[serde(default)]
    pub status: Option<ContestPhase>,
}

impl ContestClock {
    /// Server "now" at the time the snapshot was built.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidResponse`] if the field is missing or
    /// out of range.
    pub fn now(&self) -> Result<DateTime<Utc>, ApiError> {
        epoch("nowEpochMs", self.now_epoch_ms)
    }

    /// Contest window carried by the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidResponse`] if either bound is missing or
    /// out of range.
    pub fn window(&self, registered: bool) -> Result<ContestWindow, ApiError> {
        Ok(ContestWindow::new(
            epoch("startEpochMs", self.start_epoch_ms)?,
            epoch("endEpochMs", self.end_epoch_ms)?,
            registered,
        ))
    }
}

fn epoch(field: &str, value: Option<i64>) -> Result<DateTime<Utc>, ApiError> {
    value
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| ApiError::InvalidResponse(format!("standings snapshot has no valid {field}")))
}
