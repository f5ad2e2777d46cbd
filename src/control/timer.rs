//! One-shot deadline timer
//!
//! The timer runs on its own thread and selects between the expiry channel and
//! a disarm channel. Dropping the [`DeadlineTimer`] disconnects the disarm
//! channel and lets the thread exit without firing. Disarm and expiry can still
//! race inside the select, so the expiry callback receives the generation the
//! timer was armed with and the controller ignores stale generations.

use crate::core::{ControlError, Result};
use crossbeam_channel::{after, bounded, select, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// Handle to an armed deadline
#[derive(Debug)]
pub(crate) struct DeadlineTimer {
    generation: u64,
    timeout: Duration,
    deadline: Option<Instant>,
    /// Never sent to; dropping it disarms the timer thread
    _disarm: Sender<()>,
}

impl DeadlineTimer {
    /// Start a timer thread that calls `on_expire(generation)` once `timeout`
    /// has elapsed, unless the returned handle is dropped first.
    pub(crate) fn arm<F>(name: &str, generation: u64, timeout: Duration, on_expire: F) -> Result<Self>
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let (disarm_tx, disarm_rx) = bounded::<()>(0);
        let deadline = Instant::now().checked_add(timeout);
        let expire = after(timeout);

        thread::Builder::new()
            .name(format!("{}-deadline", name))
            .spawn(move || {
                select! {
                    recv(disarm_rx) -> _ => {}
                    recv(expire) -> _ => on_expire(generation),
                }
            })
            .map_err(|e| ControlError::timer(e.to_string()))?;

        Ok(Self {
            generation,
            timeout,
            deadline,
            _disarm: disarm_tx,
        })
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Point in time the timer fires; `None` if it lies beyond `Instant`'s range
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
