//! Contest phase controller
//!
//! Projects a contest's lifecycle onto the view layer: the current phase,
//! the action gate, and a wake-up at each phase boundary so views
//! re-render exactly when the phase changes instead of polling.
//!
//! # Architecture
//!
//! - [`ContestPhaseController`]: owns one window, one outstanding timer,
//!   and the registration guard
//! - [`RegistrationService`]: backend collaborator used by `register()`
//! - [`Collaborators`] / [`ControllerOptions`]: injected capabilities

pub mod controller;
pub mod registration;

pub use controller::{
    BoundaryCallback, Collaborators, ContestPhaseController, ControllerOptions,
    DEFAULT_SKEW_MARGIN,
};
pub use registration::RegistrationService;
