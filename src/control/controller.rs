//! Lifecycle controller
//!
//! [`Controller`] gates admission into a fixed set of permit pools. It owns the
//! running/paused/cancelled/closed state, serializes every transition behind a
//! single lock and never holds that lock while a caller blocks.

use crate::control::config::ControllerConfig;
use crate::control::stats::{ControllerStats, PoolStats};
use crate::control::timer::DeadlineTimer;
use crate::core::{CancelReason, ControlError, PauseGate, Permit, Result};
use crate::events;
use crate::pool::{Handoff, Ledger, SlotPool};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Mutable controller state; every field is guarded by `Inner::state`
struct State {
    ledger: Ledger,
    paused: bool,
    cause: Option<CancelReason>,
    closed: bool,
    /// Permits held across all pools
    outstanding: usize,
    /// Never sent to. Replaced on cancel and close; dropping the old sender
    /// disconnects `wake_rx` and wakes every acquirer selecting on it.
    _wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    timer: Option<DeadlineTimer>,
    next_timer_generation: u64,
}

impl State {
    fn broadcast(&mut self) {
        let (tx, rx) = bounded(0);
        self._wake_tx = tx;
        self.wake_rx = rx;
    }

    /// Error every acquisition and continuation check reports right now
    fn admission(&self) -> Result<()> {
        if self.closed {
            return Err(ControlError::closed());
        }
        match &self.cause {
            Some(reason) => Err(ControlError::from_reason(reason)),
            None => Ok(()),
        }
    }
}

struct Inner {
    name: String,
    slots: SlotPool,
    state: Mutex<State>,
    /// Signalled when `outstanding` drops to zero
    idle: Condvar,
    gate: PauseGate,
}

impl Inner {
    fn resume_locked(&self, st: &mut State) {
        st.paused = false;
        let tag = st.cause.clone();
        let refilled: usize = (0..self.slots.len())
            .map(|pool| self.slots.refill(&mut st.ledger, pool, &tag))
            .sum();
        self.gate.open();
        events::resumed(&self.name, refilled);
    }

    fn cancel_locked(&self, st: &mut State, reason: CancelReason) {
        if st.closed || st.cause.is_some() {
            return;
        }
        events::cancelled(&self.name, &reason);
        st.cause = Some(reason);
        if st.paused {
            self.resume_locked(st);
        }
        st.broadcast();
        self.gate.open();
    }

    fn fire_timeout(&self, generation: u64) {
        let mut guard = self.state.lock();
        let st = &mut *guard;

        let timeout = match &st.timer {
            Some(timer) if timer.generation() == generation => timer.timeout(),
            _ => return,
        };
        st.timer = None;
        events::timeout_fired(&self.name, timeout);
        self.cancel_locked(st, CancelReason::Timeout(timeout));
    }
}

/// Bounded-concurrency controller over one or more permit pools
///
/// The controller is a cheap, cloneable handle; every clone refers to the same
/// pools and lifecycle state.
///
/// # Example
///
/// ```rust
/// use rust_task_control::prelude::*;
/// use std::thread;
///
/// # fn main() -> Result<()> {
/// let controller = Controller::new(&[2])?;
///
/// let mut handles = Vec::new();
/// for i in 0..4 {
///     let permit = controller.acquire()?;
///     let ctl = controller.clone();
///     handles.push(thread::spawn(move || {
///         // Cooperative checkpoint: blocks while paused, errors once cancelled
///         if ctl.check_continue().is_ok() {
///             println!("task {} running in pool {}", i, permit.pool());
///         }
///         ctl.release(permit);
///     }));
/// }
///
/// controller.wait();
/// assert_eq!(controller.outstanding(), 0);
/// # for h in handles { h.join().unwrap(); }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Controller {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.inner.state.lock();
        f.debug_struct("Controller")
            .field("name", &self.inner.name)
            .field("pools", &self.inner.slots)
            .field("outstanding", &st.outstanding)
            .field("paused", &st.paused)
            .field("cause", &st.cause)
            .field("closed", &st.closed)
            .finish()
    }
}

impl Controller {
    /// Create a controller with one pool per capacity entry
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if `capacities` is empty or longer than
    /// [`MAX_POOLS`](crate::MAX_POOLS).
    pub fn new(capacities: &[usize]) -> Result<Self> {
        Self::with_config(ControllerConfig::new(capacities))
    }

    /// Create a controller from a configuration
    pub fn with_config(config: ControllerConfig) -> Result<Self> {
        config.validate()?;

        let (slots, ledger) = SlotPool::new(&config.capacities);
        let (wake_tx, wake_rx) = bounded(0);

        let controller = Self {
            inner: Arc::new(Inner {
                name: config.name,
                slots,
                state: Mutex::new(State {
                    ledger,
                    paused: false,
                    cause: None,
                    closed: false,
                    outstanding: 0,
                    _wake_tx: wake_tx,
                    wake_rx,
                    timer: None,
                    next_timer_generation: 0,
                }),
                idle: Condvar::new(),
                gate: PauseGate::new(),
            }),
        };

        if let Some(timeout) = config.timeout {
            controller.set_timeout(timeout)?;
        }
        Ok(controller)
    }

    /// Acquire a permit from whichever pool frees one first.
    ///
    /// Blocks while every pool is exhausted or the controller is paused.
    /// Callers must not depend on which pool wins when several are free.
    ///
    /// # Errors
    ///
    /// - `Cancelled` / `TimedOut` - the controller is cancelled (returned
    ///   immediately, or as soon as a cancellation wakes the blocked caller)
    /// - `Closed` - the controller was closed before or while waiting
    pub fn acquire(&self) -> Result<Permit> {
        self.acquire_inner(None)
    }

    /// Acquire a permit from a specific pool.
    ///
    /// A pool configured with zero capacity never grants a permit; callers
    /// block until the controller is cancelled or closed.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire), plus `PoolOutOfRange` for an
    /// unknown pool index.
    pub fn acquire_from(&self, pool: usize) -> Result<Permit> {
        if pool >= self.inner.slots.len() {
            return Err(ControlError::pool_out_of_range(pool, self.inner.slots.len()));
        }
        self.acquire_inner(Some(pool))
    }

    /// Acquire a permit wrapped in a guard that releases it on drop
    pub fn acquire_guard(&self, pool: Option<usize>) -> Result<PermitGuard> {
        let permit = match pool {
            Some(pool) => self.acquire_from(pool)?,
            None => self.acquire()?,
        };
        Ok(PermitGuard {
            pool: permit.pool(),
            permit: Some(permit),
            controller: self.clone(),
        })
    }

    fn acquire_inner(&self, target: Option<usize>) -> Result<Permit> {
        loop {
            let wake = {
                let st = self.inner.state.lock();
                st.admission()?;
                st.wake_rx.clone()
            };

            let (pool, tag) = match self.inner.slots.wait_for(target, &wake) {
                Handoff::Woken => continue,
                Handoff::Closed => return Err(ControlError::closed()),
                Handoff::Token { pool, tag } => (pool, tag),
            };

            let mut guard = self.inner.state.lock();
            let st = &mut *guard;

            // Received during a pause transition or after close: the permit
            // counts as withheld until resume refills it
            if st.closed || st.paused {
                self.inner.slots.discard(&mut st.ledger, pool);
                if st.closed {
                    return Err(ControlError::closed());
                }
                continue;
            }

            // Cancelled between receiving and claiming: hand the permit on
            if let Some(reason) = &st.cause {
                let err = ControlError::from_reason(reason);
                self.inner.slots.put_back(&mut st.ledger, pool, tag);
                return Err(err);
            }

            self.inner.slots.claim(&mut st.ledger, pool);
            st.outstanding += 1;
            events::acquired(&self.inner.name, pool, st.outstanding);
            return Ok(Permit::new(pool));
        }
    }

    /// Return a permit to its pool.
    ///
    /// Never fails. While paused the freed capacity is withheld until
    /// [`resume`](Self::resume).
    pub fn release(&self, permit: Permit) {
        let pool = permit.pool();
        debug_assert!(
            pool < self.inner.slots.len(),
            "permit was not granted by this controller"
        );
        if pool >= self.inner.slots.len() {
            return;
        }

        let mut guard = self.inner.state.lock();
        let st = &mut *guard;

        let tag = st.cause.clone();
        self.inner
            .slots
            .release(&mut st.ledger, pool, st.paused, tag);
        st.outstanding = st.outstanding.saturating_sub(1);
        events::released(&self.inner.name, pool, st.outstanding);

        if st.outstanding == 0 {
            self.inner.idle.notify_all();
        }
    }

    /// Cooperative checkpoint for running tasks.
    ///
    /// Blocks while the controller is paused, then reports whether the task
    /// should keep going. Safe to call any number of times.
    ///
    /// # Errors
    ///
    /// The sticky cancellation cause, or `Closed`.
    pub fn check_continue(&self) -> Result<()> {
        self.inner.state.lock().admission()?;
        self.inner.gate.wait();
        self.inner.state.lock().admission()
    }

    /// Block until no permit is outstanding in any pool
    pub fn wait(&self) {
        let mut st = self.inner.state.lock();
        while st.outstanding > 0 {
            self.inner.idle.wait(&mut st);
        }
    }

    /// Block until no permit is outstanding or the timeout elapses.
    ///
    /// Returns `true` if the controller was idle on return.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut st = self.inner.state.lock();
        if st.outstanding > 0 {
            self.inner
                .idle
                .wait_while_for(&mut st, |s| s.outstanding > 0, timeout);
        }
        st.outstanding == 0
    }

    /// Stop granting permits until [`resume`](Self::resume).
    ///
    /// Free permits are drained from every pool and permits released while
    /// paused are withheld. Running tasks block in
    /// [`check_continue`](Self::check_continue). Idempotent.
    pub fn pause(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if st.closed || st.paused {
            return;
        }

        st.paused = true;
        // A cancelled controller never parks checkpoints
        if st.cause.is_none() {
            self.inner.gate.shut();
        }
        let drained: usize = (0..self.inner.slots.len())
            .map(|pool| self.inner.slots.drain(&mut st.ledger, pool))
            .sum();
        events::paused(&self.inner.name, drained);
    }

    /// Refill every pool to capacity and release paused continuation checks.
    /// Idempotent.
    pub fn resume(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if st.closed || !st.paused {
            return;
        }
        self.inner.resume_locked(st);
    }

    /// Cancel with [`CancelReason::Manual`]
    pub fn cancel(&self) {
        self.cancel_with_reason(CancelReason::Manual);
    }

    /// Cancel with a specific reason.
    ///
    /// Only the first reason is kept until [`uncancel`](Self::uncancel).
    /// A paused controller is resumed so that every blocked acquirer and
    /// continuation check wakes and observes the cause. Tasks that never
    /// call [`check_continue`](Self::check_continue) are not interrupted.
    pub fn cancel_with_reason(&self, reason: CancelReason) {
        let mut guard = self.inner.state.lock();
        self.inner.cancel_locked(&mut guard, reason);
    }

    /// Clear the cancellation cause so new acquisitions can succeed again
    pub fn uncancel(&self) {
        let mut st = self.inner.state.lock();
        if st.cause.take().is_some() {
            if st.paused {
                self.inner.gate.shut();
            }
            events::uncancelled(&self.inner.name);
        }
    }

    /// Arm (or re-arm) the deadline.
    ///
    /// After `timeout` the controller cancels itself with
    /// [`CancelReason::Timeout`] unless [`un_timeout`](Self::un_timeout) is
    /// called first. Re-arming replaces the pending deadline.
    ///
    /// # Errors
    ///
    /// `Closed` after [`close`](Self::close), `TimerError` if the timer thread
    /// cannot be spawned (the previous deadline stays armed).
    pub fn set_timeout(&self, timeout: Duration) -> Result<()> {
        let mut st = self.inner.state.lock();
        if st.closed {
            return Err(ControlError::closed());
        }

        let generation = st.next_timer_generation;
        let weak = Arc::downgrade(&self.inner);
        let timer = DeadlineTimer::arm(&self.inner.name, generation, timeout, move |generation| {
            if let Some(inner) = weak.upgrade() {
                inner.fire_timeout(generation);
            }
        })?;

        st.next_timer_generation += 1;
        st.timer = Some(timer);
        events::timeout_armed(&self.inner.name, timeout);
        Ok(())
    }

    /// Disarm the deadline. An already recorded timeout cause is kept.
    pub fn un_timeout(&self) {
        let mut st = self.inner.state.lock();
        if st.timer.take().is_some() {
            events::timeout_disarmed(&self.inner.name);
        }
    }

    /// Shut the controller down permanently.
    ///
    /// Blocked acquirers wake with `Closed`, continuation checks stop
    /// blocking and the deadline is disarmed. Permits still held may be
    /// released afterwards so that [`wait`](Self::wait) can complete.
    pub fn close(&self) {
        let mut guard = self.inner.state.lock();
        let st = &mut *guard;
        if st.closed {
            return;
        }

        st.closed = true;
        st.timer = None;
        st.broadcast();
        self.inner.slots.close();
        self.inner.gate.seal();
        events::closed(&self.inner.name, st.outstanding);
    }

    /// Controller name from its configuration
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of pools
    pub fn pool_count(&self) -> usize {
        self.inner.slots.len()
    }

    /// Capacity of a pool, or `None` for an unknown index
    pub fn capacity(&self, pool: usize) -> Option<usize> {
        self.inner
            .state
            .lock()
            .ledger
            .get(pool)
            .map(|count| count.capacity)
    }

    /// Permits currently held across all pools
    pub fn outstanding(&self) -> usize {
        self.inner.state.lock().outstanding
    }

    /// Check if the controller is paused
    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    /// Check if the controller has a cancellation cause
    pub fn is_cancelled(&self) -> bool {
        self.inner.state.lock().cause.is_some()
    }

    /// Check if the controller was closed
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Current cancellation cause, if any
    pub fn cause(&self) -> Option<CancelReason> {
        self.inner.state.lock().cause.clone()
    }

    /// Point in time the armed deadline fires, if one is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.inner
            .state
            .lock()
            .timer
            .as_ref()
            .and_then(DeadlineTimer::deadline)
    }

    /// Snapshot of pool occupancy and lifecycle state
    pub fn stats(&self) -> ControllerStats {
        let st = self.inner.state.lock();
        let now = Instant::now();

        ControllerStats {
            name: self.inner.name.clone(),
            pools: st
                .ledger
                .iter()
                .map(|count| PoolStats {
                    capacity: count.capacity,
                    outstanding: count.outstanding,
                    available: count.free,
                    drained: count.drained(),
                })
                .collect(),
            outstanding: st.outstanding,
            paused: st.paused,
            cause: st.cause.as_ref().map(ToString::to_string),
            closed: st.closed,
            deadline_remaining_ms: st
                .timer
                .as_ref()
                .and_then(DeadlineTimer::deadline)
                .map(|deadline| deadline.saturating_duration_since(now).as_millis() as u64),
        }
    }

    /// Current admission error, used by the context adapter
    pub(crate) fn admission_error(&self) -> Option<ControlError> {
        self.inner.state.lock().admission().err()
    }

    /// A receiver that disconnects once the controller is cancelled or closed
    pub(crate) fn done_channel(&self) -> Receiver<()> {
        let st = self.inner.state.lock();
        if st.admission().is_err() {
            let (_, rx) = bounded(0);
            return rx;
        }
        st.wake_rx.clone()
    }
}

/// A permit that is released back to its controller when dropped
#[must_use = "dropping the guard releases the permit immediately"]
#[derive(Debug)]
pub struct PermitGuard {
    pool: usize,
    permit: Option<Permit>,
    controller: Controller,
}

impl PermitGuard {
    /// Index of the pool the permit was drawn from
    pub fn pool(&self) -> usize {
        self.pool
    }

    /// Controller that granted the permit
    pub fn controller(&self) -> &Controller {
        &self.controller
    }
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.controller.release(permit);
        }
    }
}
