//! Core types shared by the controller: errors, cancellation reasons and permits

pub mod error;
mod gate;
pub mod permit;
pub mod reason;

pub use error::{ControlError, Result};
pub(crate) use gate::PauseGate;
pub use permit::Permit;
pub use reason::CancelReason;
