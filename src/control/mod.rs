//! Controller, its configuration and the driver loop

pub mod config;
pub mod context;
pub mod controller;
pub mod driver;
pub mod stats;
mod timer;

pub use config::{ControllerConfig, MAX_POOLS};
pub use context::ControlContext;
pub use controller::{Controller, PermitGuard};
pub use driver::Task;
pub use stats::{ControllerStats, PoolStats};
