//! Error types for the task controller

use crate::core::CancelReason;
use std::time::Duration;

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors surfaced by the controller
///
/// Only [`Controller::acquire`](crate::Controller::acquire) and
/// [`Controller::check_continue`](crate::Controller::check_continue) report
/// cancellation; construction and the driver loop report the rest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ControlError {
    /// Controller was cancelled with a reason
    #[error("Controller cancelled: {reason}")]
    Cancelled {
        /// Reason for cancellation
        reason: CancelReason,
    },

    /// Controller deadline expired
    #[error("Controller timed out after {after:?}")]
    TimedOut {
        /// Duration the deadline timer was armed with
        after: Duration,
    },

    /// Controller was closed
    #[error("Controller is closed")]
    Closed,

    /// Requested pool does not exist
    #[error("Pool index {index} out of range ({pools} pools configured)")]
    PoolOutOfRange {
        /// Requested pool index
        index: usize,
        /// Number of configured pools
        pools: usize,
    },

    /// Invalid configuration with parameter
    #[error("Invalid configuration for '{parameter}': {message}")]
    InvalidConfig {
        /// Configuration parameter name
        parameter: String,
        /// Error message
        message: String,
    },

    /// Failed to start the deadline timer thread
    #[error("Failed to arm deadline timer: {message}")]
    TimerError {
        /// Error message
        message: String,
    },

    /// Failed to spawn a task thread
    #[error("Failed to spawn task #{seq}: {message}")]
    SpawnError {
        /// Sequence index of the task
        seq: usize,
        /// Error message
        message: String,
    },
}

impl ControlError {
    /// Create the error a caller observes for a cancellation cause
    pub fn from_reason(reason: &CancelReason) -> Self {
        match reason {
            CancelReason::Timeout(after) => ControlError::TimedOut { after: *after },
            other => ControlError::Cancelled {
                reason: other.clone(),
            },
        }
    }

    /// Create a closed error
    pub fn closed() -> Self {
        ControlError::Closed
    }

    /// Create a pool out of range error
    pub fn pool_out_of_range(index: usize, pools: usize) -> Self {
        ControlError::PoolOutOfRange { index, pools }
    }

    /// Create an invalid config error
    pub fn invalid_config(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        ControlError::InvalidConfig {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a timer error
    pub fn timer(message: impl Into<String>) -> Self {
        ControlError::TimerError {
            message: message.into(),
        }
    }

    /// Create a spawn error
    pub fn spawn(seq: usize, message: impl Into<String>) -> Self {
        ControlError::SpawnError {
            seq,
            message: message.into(),
        }
    }

    /// Returns `true` for `Cancelled` and `TimedOut`
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            ControlError::Cancelled { .. } | ControlError::TimedOut { .. }
        )
    }

    /// Returns the cancellation cause carried by this error, if any
    pub fn reason(&self) -> Option<CancelReason> {
        match self {
            ControlError::Cancelled { reason } => Some(reason.clone()),
            ControlError::TimedOut { after } => Some(CancelReason::Timeout(*after)),
            _ => None,
        }
    }
}
