//! Cancellation-context view of a controller
//!
//! Collaborators that only understand "deadline / error / done signal" can be
//! handed a [`ControlContext`] instead of the full controller.

use crate::control::Controller;
use crate::core::ControlError;
use crossbeam_channel::Receiver;
use std::time::Instant;

/// Read-only cancellation context backed by a controller
#[derive(Debug, Clone)]
pub struct ControlContext {
    controller: Controller,
}

impl ControlContext {
    pub(crate) fn new(controller: Controller) -> Self {
        Self { controller }
    }

    /// Point in time the controller cancels itself, if a deadline is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.controller.deadline()
    }

    /// Error a new acquisition would report, or `None` while running
    pub fn err(&self) -> Option<ControlError> {
        self.controller.admission_error()
    }

    /// Check if the controller is cancelled or closed
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// A channel that disconnects once the controller is cancelled or closed.
    ///
    /// Nothing is ever sent on it; `recv()` returning `Err` is the signal, so
    /// it composes with `crossbeam_channel::select!`.
    pub fn done(&self) -> Receiver<()> {
        self.controller.done_channel()
    }
}

impl Controller {
    /// View this controller as a cancellation context
    pub fn context(&self) -> ControlContext {
        ControlContext::new(self.clone())
    }
}
