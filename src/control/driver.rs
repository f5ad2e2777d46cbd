//! Driver loop
//!
//! [`Controller::run_until`] ties acquisition, execution and release together:
//! it acquires a permit, runs the unit of work on its own thread, releases the
//! permit when the work returns (or panics) and finally waits until every
//! launched task has finished.

use crate::control::Controller;
use crate::core::{ControlError, Result};
use crate::events;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Handle given to each unit of work launched by the driver loop
#[derive(Debug)]
pub struct Task {
    seq: usize,
    pool: usize,
    controller: Controller,
    stop: Arc<AtomicBool>,
}

impl Task {
    /// Sequence index assigned by the driver
    pub fn seq(&self) -> usize {
        self.seq
    }

    /// Pool whose permit this task holds
    pub fn pool(&self) -> usize {
        self.pool
    }

    /// Controller running this task
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Cooperative checkpoint; see [`Controller::check_continue`]
    pub fn check_continue(&self) -> Result<()> {
        self.controller.check_continue()
    }

    /// Ask the driver to stop launching new tasks.
    ///
    /// The controller itself is not cancelled; tasks already running keep
    /// going and the driver still waits for them.
    pub fn stop_launching(&self) {
        self.stop.store(true, Ordering::Release);
    }
}

fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

impl Controller {
    /// Launch units of work until `produce` returns `false` or acquisition
    /// fails, then wait for every launched unit to finish.
    ///
    /// `produce(seq)` is asked before each launch. Each unit runs on its own
    /// thread and receives a [`Task`]; its permit is released when `work`
    /// returns, even if it panics.
    ///
    /// Returns the number of units launched.
    ///
    /// # Errors
    ///
    /// The acquisition error (cancellation cause or `Closed`) that stopped
    /// the loop, or `SpawnError`. The loop still waits for running units
    /// before returning it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rust_task_control::prelude::*;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// # fn main() -> Result<()> {
    /// let controller = Controller::new(&[2, 3])?;
    /// let done = Arc::new(AtomicUsize::new(0));
    ///
    /// let counter = Arc::clone(&done);
    /// let launched = controller.run_until(
    ///     |seq| seq < 10,
    ///     move |task| {
    ///         if task.check_continue().is_ok() {
    ///             counter.fetch_add(1, Ordering::SeqCst);
    ///         }
    ///     },
    /// )?;
    ///
    /// assert_eq!(launched, 10);
    /// assert_eq!(done.load(Ordering::SeqCst), 10);
    /// # Ok(())
    /// # }
    /// ```
    pub fn run_until<P, W>(&self, mut produce: P, work: W) -> Result<usize>
    where
        P: FnMut(usize) -> bool,
        W: Fn(&Task) + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let stop = Arc::new(AtomicBool::new(false));
        let mut outcome: Result<()> = Ok(());
        let mut launched = 0;

        loop {
            let seq = launched;
            if stop.load(Ordering::Acquire) || !produce(seq) {
                break;
            }

            let guard = match self.acquire_guard(None) {
                Ok(guard) => guard,
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            };
            // A task asked to stop while we were blocked; the unused permit
            // is released with the guard
            if stop.load(Ordering::Acquire) {
                break;
            }

            let task = Task {
                seq,
                pool: guard.pool(),
                controller: self.clone(),
                stop: Arc::clone(&stop),
            };
            let work = Arc::clone(&work);

            let spawned = thread::Builder::new()
                .name(format!("{}-task-{}", self.name(), seq))
                .spawn(move || {
                    let _permit = guard;
                    if let Err(panic_info) = catch_unwind(AssertUnwindSafe(|| work(&task))) {
                        events::task_panicked(task.controller.name(), task.seq, &panic_message(&*panic_info));
                    }
                });

            if let Err(e) = spawned {
                events::spawn_failed(self.name(), seq, &e);
                outcome = Err(ControlError::spawn(seq, e.to_string()));
                break;
            }
            launched += 1;
        }

        self.wait();
        outcome.map(|()| launched)
    }

    /// Launch units of work until a task calls
    /// [`Task::stop_launching`] or acquisition fails.
    pub fn run<W>(&self, work: W) -> Result<usize>
    where
        W: Fn(&Task) + Send + Sync + 'static,
    {
        self.run_until(|_| true, work)
    }
}
