//! Controller configuration

use crate::core::{ControlError, Result};
use std::time::Duration;

/// Maximum number of pools a single controller may own
pub const MAX_POOLS: usize = 16;

/// Configuration for a [`Controller`](crate::Controller)
///
/// # Example
///
/// ```rust
/// use rust_task_control::prelude::*;
/// use std::time::Duration;
///
/// # fn main() -> Result<()> {
/// let config = ControllerConfig::new(&[4, 2])
///     .with_name("uploads")
///     .with_timeout(Duration::from_secs(30));
///
/// let controller = Controller::with_config(config)?;
/// assert_eq!(controller.pool_count(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Capacity of each pool; a zero entry disables that pool
    pub capacities: Vec<usize>,
    /// Name used in log events and as the prefix of spawned thread names
    pub name: String,
    /// Deadline armed when the controller is built
    pub timeout: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            capacities: vec![1],
            name: "task-ctl".to_string(),
            timeout: None,
        }
    }
}

impl ControllerConfig {
    /// Create a configuration with one pool per capacity entry
    #[must_use]
    pub fn new(capacities: &[usize]) -> Self {
        Self {
            capacities: capacities.to_vec(),
            ..Default::default()
        }
    }

    /// Set the controller name
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Arm a deadline as soon as the controller is built.
    ///
    /// Equivalent to calling
    /// [`Controller::set_timeout`](crate::Controller::set_timeout) right after
    /// construction.
    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.capacities.is_empty() {
            return Err(ControlError::invalid_config(
                "capacities",
                "At least one pool is required",
            ));
        }
        if self.capacities.len() > MAX_POOLS {
            return Err(ControlError::invalid_config(
                "capacities",
                format!(
                    "{} pools requested, at most {} are supported",
                    self.capacities.len(),
                    MAX_POOLS
                ),
            ));
        }
        if self.name.contains('\0') {
            return Err(ControlError::invalid_config(
                "name",
                "Name must not contain NUL bytes",
            ));
        }
        Ok(())
    }
}
