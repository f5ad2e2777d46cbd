//! Controller statistics snapshots

use serde::Serialize;

/// Occupancy of a single pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Maximum concurrent permits
    pub capacity: usize,
    /// Permits held by running tasks
    pub outstanding: usize,
    /// Permits ready to be acquired
    pub available: usize,
    /// Capacity withheld while paused
    pub drained: usize,
}

/// Point-in-time view of a controller
///
/// Taken under the controller lock, so the per-pool figures are mutually
/// consistent: `outstanding + available + drained == capacity` for every pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    /// Controller name
    pub name: String,
    /// Per-pool occupancy, indexed by pool
    pub pools: Vec<PoolStats>,
    /// Permits held across all pools
    pub outstanding: usize,
    /// Whether admission is paused
    pub paused: bool,
    /// Rendered cancellation cause, if cancelled
    pub cause: Option<String>,
    /// Whether the controller was closed
    pub closed: bool,
    /// Time left until the armed deadline fires
    pub deadline_remaining_ms: Option<u64>,
}

impl ControllerStats {
    /// Total capacity across all pools
    pub fn total_capacity(&self) -> usize {
        self.pools.iter().map(|p| p.capacity).sum()
    }

    /// Total permits ready to be acquired across all pools
    pub fn total_available(&self) -> usize {
        self.pools.iter().map(|p| p.available).sum()
    }
}
