//! Structured events for observability.
//!
//! Every state transition of a controller is reported through this module.
//! With the `tracing` feature enabled the events are emitted as structured
//! `tracing` events; otherwise they go through the `log` facade.
//!
//! # Example
//!
//! ```rust,ignore
//! use rust_task_control::prelude::*;
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env()
//!         .add_directive("rust_task_control=debug".parse().unwrap()))
//!     .init();
//!
//! let controller = Controller::new(&[4])?;
//! controller.pause(); // "controller paused"
//! ```

use crate::core::CancelReason;
use std::time::Duration;

#[inline]
pub(crate) fn acquired(name: &str, pool: usize, outstanding: usize) {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        controller = name,
        pool = pool,
        gauge.outstanding = outstanding as i64,
        "permit acquired"
    );
    #[cfg(not(feature = "tracing"))]
    log::trace!(
        "[{}] permit acquired from pool {} ({} outstanding)",
        name,
        pool,
        outstanding
    );
}

#[inline]
pub(crate) fn released(name: &str, pool: usize, outstanding: usize) {
    #[cfg(feature = "tracing")]
    tracing::trace!(
        controller = name,
        pool = pool,
        gauge.outstanding = outstanding as i64,
        "permit released"
    );
    #[cfg(not(feature = "tracing"))]
    log::trace!(
        "[{}] permit released to pool {} ({} outstanding)",
        name,
        pool,
        outstanding
    );
}

#[inline]
pub(crate) fn paused(name: &str, drained: usize) {
    #[cfg(feature = "tracing")]
    tracing::debug!(controller = name, drained = drained, "controller paused");
    #[cfg(not(feature = "tracing"))]
    log::debug!("[{}] paused, {} free permits drained", name, drained);
}

#[inline]
pub(crate) fn resumed(name: &str, refilled: usize) {
    #[cfg(feature = "tracing")]
    tracing::debug!(controller = name, refilled = refilled, "controller resumed");
    #[cfg(not(feature = "tracing"))]
    log::debug!("[{}] resumed, {} permits refilled", name, refilled);
}

#[inline]
pub(crate) fn cancelled(name: &str, reason: &CancelReason) {
    #[cfg(feature = "tracing")]
    tracing::info!(controller = name, reason = %reason, "controller cancelled");
    #[cfg(not(feature = "tracing"))]
    log::info!("[{}] cancelled: {}", name, reason);
}

#[inline]
pub(crate) fn uncancelled(name: &str) {
    #[cfg(feature = "tracing")]
    tracing::debug!(controller = name, "cancellation cleared");
    #[cfg(not(feature = "tracing"))]
    log::debug!("[{}] cancellation cleared", name);
}

#[inline]
pub(crate) fn timeout_armed(name: &str, timeout: Duration) {
    #[cfg(feature = "tracing")]
    tracing::debug!(
        controller = name,
        timeout_ms = timeout.as_millis() as u64,
        "deadline armed"
    );
    #[cfg(not(feature = "tracing"))]
    log::debug!("[{}] deadline armed for {:?}", name, timeout);
}

#[inline]
pub(crate) fn timeout_disarmed(name: &str) {
    #[cfg(feature = "tracing")]
    tracing::debug!(controller = name, "deadline disarmed");
    #[cfg(not(feature = "tracing"))]
    log::debug!("[{}] deadline disarmed", name);
}

#[inline]
pub(crate) fn timeout_fired(name: &str, timeout: Duration) {
    #[cfg(feature = "tracing")]
    tracing::warn!(
        controller = name,
        timeout_ms = timeout.as_millis() as u64,
        "deadline expired"
    );
    #[cfg(not(feature = "tracing"))]
    log::warn!("[{}] deadline of {:?} expired", name, timeout);
}

#[inline]
pub(crate) fn closed(name: &str, outstanding: usize) {
    #[cfg(feature = "tracing")]
    tracing::info!(
        controller = name,
        outstanding = outstanding,
        "controller closed"
    );
    #[cfg(not(feature = "tracing"))]
    log::info!("[{}] closed with {} permits outstanding", name, outstanding);
}

#[inline]
pub(crate) fn task_panicked(name: &str, seq: usize, message: &str) {
    #[cfg(feature = "tracing")]
    tracing::error!(
        controller = name,
        seq = seq,
        panic_message = %message,
        "task panicked"
    );
    #[cfg(not(feature = "tracing"))]
    log::error!("[{}] task #{} panicked: {}", name, seq, message);
}

#[inline]
pub(crate) fn spawn_failed(name: &str, seq: usize, error: &std::io::Error) {
    #[cfg(feature = "tracing")]
    tracing::error!(
        controller = name,
        seq = seq,
        error = %error,
        "failed to spawn task thread"
    );
    #[cfg(not(feature = "tracing"))]
    log::error!("[{}] failed to spawn task #{}: {}", name, seq, error);
}
