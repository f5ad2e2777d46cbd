//! Convenient re-exports for common types

pub use crate::control::{
    ControlContext, Controller, ControllerConfig, ControllerStats, PermitGuard, PoolStats, Task,
    MAX_POOLS,
};
pub use crate::core::{CancelReason, ControlError, Permit, Result};
