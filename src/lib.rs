//! # Rust Task Control
//!
//! Bounded-concurrency controller for fleets of blocking tasks.
//!
//! A [`Controller`] owns one or more permit pools. A task acquires a permit
//! before it starts, checks in at safe points while it runs and releases the
//! permit when it finishes. The controller can be paused, resumed, cancelled
//! (with a sticky first cause), given a deadline and closed.
//!
//! ## Features
//!
//! - **Multi-pool permits**: acquire from whichever pool frees a slot first
//! - **Pause / Resume**: withhold capacity and block running tasks at checkpoints
//! - **Cancellation**: first cause wins; blocked acquirers wake immediately
//! - **Deadlines**: arm, re-arm or disarm a timeout that cancels the controller
//! - **Driver loop**: spawn, run and release tasks until the producer or the
//!   controller says stop
//! - **Observability**: state transitions are logged via `log`, or `tracing`
//!   with the `tracing` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use rust_task_control::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! // Two pools with two and three slots
//! let controller = Controller::new(&[2, 3])?;
//!
//! let launched = controller.run_until(
//!     |seq| seq < 8,
//!     |task| {
//!         std::thread::sleep(Duration::from_millis(5));
//!         if task.check_continue().is_err() {
//!             return;
//!         }
//!         println!("task {} ran in pool {}", task.seq(), task.pool());
//!     },
//! )?;
//!
//! assert_eq!(launched, 8);
//! # Ok(())
//! # }
//! ```
//!
//! ## Manual Acquisition
//!
//! ```rust
//! use rust_task_control::prelude::*;
//!
//! # fn main() -> Result<()> {
//! let controller = Controller::new(&[1])?;
//!
//! let permit = controller.acquire()?;
//! controller.check_continue()?;
//! controller.release(permit);
//!
//! controller.cancel();
//! assert!(controller.acquire().is_err());
//!
//! controller.uncancel();
//! let guard = controller.acquire_guard(None)?;
//! drop(guard);
//! controller.wait();
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use rust_task_control::prelude::*;
//! use std::time::Duration;
//!
//! # fn main() -> Result<()> {
//! let config = ControllerConfig::new(&[4, 4])
//!     .with_name("ingest")
//!     .with_timeout(Duration::from_secs(30));
//!
//! let controller = Controller::with_config(config)?;
//! assert!(controller.deadline().is_some());
//! controller.un_timeout();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod control;
pub mod core;
mod events;
pub(crate) mod pool;
pub mod prelude;

pub use control::{
    ControlContext, Controller, ControllerConfig, ControllerStats, PermitGuard, PoolStats, Task,
    MAX_POOLS,
};
pub use core::{CancelReason, ControlError, Permit, Result};
