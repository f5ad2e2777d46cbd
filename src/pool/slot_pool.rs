//! Multi-pool permit allocator
//!
//! Each pool owns a bounded crossbeam channel whose buffered messages are the
//! free permits of that pool. Blocking acquisition is a plain channel receive,
//! so no lock is held while a caller waits. Every other mutation (claiming a
//! received permit, release, drain, refill) goes through a [`Ledger`] that the
//! controller keeps behind its state lock.
//!
//! For every pool the ledger maintains
//!
//! ```text
//! outstanding + free + drained == capacity
//! ```
//!
//! where `free` counts permits sent into the channel that no caller has
//! claimed yet (including one a caller has received but not yet claimed) and
//! `drained` is whatever capacity a pause withheld.

use crate::core::CancelReason;
use crossbeam_channel::{bounded, Receiver, RecvError, Select, Sender, TryRecvError};
use parking_lot::Mutex;

/// A free permit as it travels through a pool channel.
///
/// Permits pushed while the controller is cancelled carry the cause so that a
/// woken acquirer can tell it was released into a cancelled controller.
pub(crate) type Token = Option<CancelReason>;

/// Outcome of waiting for a permit
#[derive(Debug)]
pub(crate) enum Handoff {
    /// A permit was received from `pool` and must now be claimed, put back or
    /// discarded under the ledger lock
    Token { pool: usize, tag: Token },
    /// The broadcast channel fired; the caller should re-check controller state
    Woken,
    /// The pool channels were torn down
    Closed,
}

/// Per-pool counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotCount {
    pub(crate) capacity: usize,
    pub(crate) outstanding: usize,
    pub(crate) free: usize,
}

impl SlotCount {
    /// Capacity withheld from the channel by a pause
    pub(crate) fn drained(&self) -> usize {
        self.capacity - self.outstanding - self.free
    }
}

/// Bookkeeping for every pool; mutated only under the controller lock
#[derive(Debug, Clone)]
pub(crate) struct Ledger {
    counts: Vec<SlotCount>,
}

impl Ledger {
    pub(crate) fn get(&self, pool: usize) -> Option<&SlotCount> {
        self.counts.get(pool)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &SlotCount> {
        self.counts.iter()
    }
}

struct Slot {
    capacity: usize,
    /// `None` once the pool is closed; dropping the sender disconnects waiters
    sender: Mutex<Option<Sender<Token>>>,
    receiver: Receiver<Token>,
}

impl Slot {
    fn push(&self, tag: Token) -> bool {
        match self.sender.lock().as_ref() {
            Some(sender) => sender.try_send(tag).is_ok(),
            None => false,
        }
    }
}

/// Fixed set of permit pools
pub(crate) struct SlotPool {
    slots: Vec<Slot>,
}

impl std::fmt::Debug for SlotPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotPool")
            .field(
                "capacities",
                &self.slots.iter().map(|s| s.capacity).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl SlotPool {
    /// Create one pool per capacity, each filled to capacity.
    ///
    /// A capacity of zero yields a disabled pool that never grants a permit.
    pub(crate) fn new(capacities: &[usize]) -> (Self, Ledger) {
        let mut slots = Vec::with_capacity(capacities.len());
        let mut counts = Vec::with_capacity(capacities.len());

        for &capacity in capacities {
            let (sender, receiver) = bounded(capacity);
            for _ in 0..capacity {
                // Fresh channel sized to capacity; cannot be full
                let _ = sender.try_send(None);
            }
            slots.push(Slot {
                capacity,
                sender: Mutex::new(Some(sender)),
                receiver,
            });
            counts.push(SlotCount {
                capacity,
                outstanding: 0,
                free: capacity,
            });
        }

        (Self { slots }, Ledger { counts })
    }

    /// Number of pools
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Block until a permit arrives from `target` (or from any pool when
    /// `target` is `None`), or until `wake` fires.
    ///
    /// When several pools are ready at once the winner is chosen by the
    /// channel selector at random. Only the winning pool is consumed from.
    pub(crate) fn wait_for(&self, target: Option<usize>, wake: &Receiver<()>) -> Handoff {
        let pools: Vec<usize> = match target {
            Some(pool) => vec![pool],
            None => (0..self.slots.len()).collect(),
        };

        let mut sel = Select::new();
        for &pool in &pools {
            sel.recv(&self.slots[pool].receiver);
        }
        let wake_index = sel.recv(wake);

        let oper = sel.select();
        let index = oper.index();
        if index == wake_index {
            // Only ever disconnected, never sent to
            let _ = oper.recv(wake);
            return Handoff::Woken;
        }

        let pool = pools[index];
        match oper.recv(&self.slots[pool].receiver) {
            Ok(tag) => Handoff::Token { pool, tag },
            Err(RecvError) => Handoff::Closed,
        }
    }

    /// Turn a received permit into an outstanding one
    pub(crate) fn claim(&self, ledger: &mut Ledger, pool: usize) {
        let count = &mut ledger.counts[pool];
        count.free -= 1;
        count.outstanding += 1;
        debug_assert!(count.outstanding + count.free <= count.capacity);
    }

    /// Return a received but unclaimed permit to its channel
    pub(crate) fn put_back(&self, ledger: &mut Ledger, pool: usize, tag: Token) {
        if !self.slots[pool].push(tag) {
            ledger.counts[pool].free -= 1;
        }
    }

    /// Drop a received but unclaimed permit; its capacity counts as drained
    pub(crate) fn discard(&self, ledger: &mut Ledger, pool: usize) {
        ledger.counts[pool].free -= 1;
    }

    /// Give back an outstanding permit.
    ///
    /// While paused the capacity is withheld instead of being pushed, so a
    /// blocked acquirer cannot slip through the paused window.
    pub(crate) fn release(&self, ledger: &mut Ledger, pool: usize, paused: bool, tag: Token) {
        let count = &mut ledger.counts[pool];
        count.outstanding = count.outstanding.saturating_sub(1);

        if !paused && count.outstanding + count.free < count.capacity && self.slots[pool].push(tag)
        {
            count.free += 1;
        }
    }

    /// Remove every currently free permit from `pool` without blocking.
    ///
    /// Returns the number of permits removed.
    pub(crate) fn drain(&self, ledger: &mut Ledger, pool: usize) -> usize {
        let count = &mut ledger.counts[pool];
        let receiver = &self.slots[pool].receiver;
        let mut drained = 0;

        loop {
            match receiver.try_recv() {
                Ok(_) => {
                    count.free -= 1;
                    drained += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        drained
    }

    /// Push permits until `outstanding + free == capacity`, each tagged with
    /// `tag`.
    ///
    /// Returns the number of permits pushed.
    pub(crate) fn refill(&self, ledger: &mut Ledger, pool: usize, tag: &Token) -> usize {
        let count = &mut ledger.counts[pool];
        let slot = &self.slots[pool];
        let mut pushed = 0;

        while count.outstanding + count.free < count.capacity {
            if !slot.push(tag.clone()) {
                break;
            }
            count.free += 1;
            pushed += 1;
        }
        pushed
    }

    /// Tear down every pool channel; blocked receivers observe a disconnect
    ///
    /// Buffered permits stay receivable; a caller that receives one after
    /// close sees the closed flag and discards it.
    pub(crate) fn close(&self) {
        for slot in &self.slots {
            slot.sender.lock().take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn never_wakes() -> (Sender<()>, Receiver<()>) {
        bounded(0)
    }

    fn take(pool: &SlotPool, ledger: &mut Ledger, target: Option<usize>) -> usize {
        let (_tx, wake) = never_wakes();
        match pool.wait_for(target, &wake) {
            Handoff::Token { pool: index, .. } => {
                pool.claim(ledger, index);
                index
            }
            other => panic!("expected a permit, got {:?}", other),
        }
    }

    #[test]
    fn test_new_pools_are_full() {
        let (pool, ledger) = SlotPool::new(&[2, 0, 3]);
        assert_eq!(pool.len(), 3);
        let counts: Vec<_> = ledger.iter().map(|c| (c.capacity, c.free)).collect();
        assert_eq!(counts, vec![(2, 2), (0, 0), (3, 3)]);
    }

    #[test]
    fn test_acquire_and_release_conserves_permits() {
        let (pool, mut ledger) = SlotPool::new(&[2]);

        assert_eq!(take(&pool, &mut ledger, Some(0)), 0);
        assert_eq!(take(&pool, &mut ledger, Some(0)), 0);
        assert_eq!(ledger.get(0).unwrap().outstanding, 2);
        assert_eq!(ledger.get(0).unwrap().free, 0);

        pool.release(&mut ledger, 0, false, None);
        pool.release(&mut ledger, 0, false, None);

        let count = *ledger.get(0).unwrap();
        assert_eq!(count.outstanding, 0);
        assert_eq!(count.free, 2);
        assert_eq!(pool.slots[0].receiver.len(), 2);
    }

    #[test]
    fn test_any_pool_skips_disabled_pools() {
        let (pool, mut ledger) = SlotPool::new(&[0, 1]);
        assert_eq!(take(&pool, &mut ledger, None), 1);
    }

    #[test]
    fn test_wake_interrupts_wait() {
        let (pool, mut ledger) = SlotPool::new(&[1]);
        take(&pool, &mut ledger, Some(0));

        let (tx, wake) = never_wakes();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            drop(tx);
        });

        assert!(matches!(pool.wait_for(Some(0), &wake), Handoff::Woken));
        handle.join().unwrap();
    }

    #[test]
    fn test_release_while_paused_is_withheld() {
        let (pool, mut ledger) = SlotPool::new(&[2]);
        take(&pool, &mut ledger, Some(0));

        assert_eq!(pool.drain(&mut ledger, 0), 1);
        pool.release(&mut ledger, 0, true, None);

        let count = *ledger.get(0).unwrap();
        assert_eq!(count.outstanding, 0);
        assert_eq!(count.free, 0);
        assert_eq!(count.drained(), 2);

        assert_eq!(pool.refill(&mut ledger, 0, &None), 2);
        assert_eq!(ledger.get(0).unwrap().free, 2);
        assert_eq!(pool.refill(&mut ledger, 0, &None), 0);
    }

    #[test]
    fn test_refill_tags_permits() {
        let (pool, mut ledger) = SlotPool::new(&[1]);
        pool.drain(&mut ledger, 0);
        pool.refill(&mut ledger, 0, &Some(CancelReason::Manual));

        let (_tx, wake) = never_wakes();
        match pool.wait_for(Some(0), &wake) {
            Handoff::Token { pool: 0, tag } => assert_eq!(tag, Some(CancelReason::Manual)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_put_back_and_discard() {
        let (pool, mut ledger) = SlotPool::new(&[1]);
        let (_tx, wake) = never_wakes();

        assert!(matches!(pool.wait_for(Some(0), &wake), Handoff::Token { .. }));
        pool.put_back(&mut ledger, 0, None);
        assert_eq!(ledger.get(0).unwrap().free, 1);

        assert!(matches!(pool.wait_for(Some(0), &wake), Handoff::Token { .. }));
        pool.discard(&mut ledger, 0);
        assert_eq!(ledger.get(0).unwrap().drained(), 1);
    }

    #[test]
    fn test_close_disconnects_waiters() {
        let (pool, mut ledger) = SlotPool::new(&[0]);
        pool.close();

        let (_tx, wake) = never_wakes();
        assert!(matches!(pool.wait_for(None, &wake), Handoff::Closed));
        assert_eq!(pool.refill(&mut ledger, 0, &None), 0);
    }
}
