//! Pause gate used by continuation checks
//!
//! Running tasks call [`Controller::check_continue`](crate::Controller::check_continue)
//! at safe points. While the controller is paused the gate is shut and those
//! calls block; resume, cancel and close open it again.

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct GateState {
    open: bool,
    /// Set by close; a sealed gate never shuts again
    sealed: bool,
}

/// A gate that blocks waiters while shut
#[derive(Debug)]
pub(crate) struct PauseGate {
    state: Mutex<GateState>,
    condvar: Condvar,
}

impl PauseGate {
    /// Create an open gate
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                open: true,
                sealed: false,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Shut the gate so that subsequent waiters block
    pub(crate) fn shut(&self) {
        let mut state = self.state.lock();
        if !state.sealed {
            state.open = false;
        }
    }

    /// Open the gate and wake every waiter
    pub(crate) fn open(&self) {
        let mut state = self.state.lock();
        state.open = true;
        self.condvar.notify_all();
    }

    /// Open the gate permanently
    pub(crate) fn seal(&self) {
        let mut state = self.state.lock();
        state.open = true;
        state.sealed = true;
        self.condvar.notify_all();
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Block until the gate is open
    pub(crate) fn wait(&self) {
        let mut state = self.state.lock();
        while !state.open {
            self.condvar.wait(&mut state);
        }
    }
}
