//! Registration collaborator.

use async_trait::async_trait;
use xoroj_core::ContestId;

use crate::error::NetworkFailure;

/// Submits a contest registration to the backend.
///
/// Transport, retries and authentication belong to the implementation.
/// `Ok(())` means the backend confirmed the registration.
#[async_trait]
pub trait RegistrationService: Send + Sync {
    /// Registers the current user for `contest_id`.
    async fn submit(&self, contest_id: ContestId) -> Result<(), NetworkFailure>;
}
