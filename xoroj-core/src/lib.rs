//! `XorOJ` Core: contest window model
//!
//! Pure, clock-free derivations shared by the `xoroj` controller and CLI:
//! the contest window, its temporal phase, the action gate built on top
//! of it, and countdown rendering. Every function here takes the current
//! instant as an argument; nothing in this crate reads the system clock.

pub mod contest;
pub mod countdown;
pub mod error;

pub use contest::{ActionGate, ContestId, ContestPhase, ContestWindow, parse_instant};
pub use countdown::{countdown_label, format_countdown};
pub use error::WindowError;
