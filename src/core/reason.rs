//! Cancellation causes

use std::time::Duration;

/// Reason a controller was cancelled
///
/// The controller keeps the first reason it is given until
/// [`Controller::uncancel`](crate::Controller::uncancel) clears it, so every
/// blocked or newly arriving task observes the same cause.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CancelReason {
    /// Explicitly cancelled via `cancel()`
    #[default]
    Manual,
    /// Cancelled by the deadline timer armed with the given duration
    Timeout(Duration),
    /// Cancelled due to an error condition
    Error(String),
    /// Custom cancellation reason
    Custom(String),
}

impl CancelReason {
    /// Returns `true` if the deadline timer raised this cause
    pub fn is_timeout(&self) -> bool {
        matches!(self, CancelReason::Timeout(_))
    }
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Manual => write!(f, "canceled"),
            CancelReason::Timeout(d) => write!(f, "timeout after {:?}", d),
            CancelReason::Error(msg) => write!(f, "error: {}", msg),
            CancelReason::Custom(msg) => write!(f, "{}", msg),
        }
    }
}
