//! Permit pools backing the controller

mod slot_pool;

pub(crate) use slot_pool::{Handoff, Ledger, SlotPool};
