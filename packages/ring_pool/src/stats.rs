/// A point-in-time snapshot of the state of a [`RingPool`][crate::RingPool].
///
/// Obtained via [`RingPool::stats()`][crate::RingPool::stats]. The counters are cumulative since
/// the pool was created.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct PoolStats {
    /// Number of ring slots, fixed at construction.
    pub capacity: usize,

    /// Free slots in the ring.
    pub available: usize,

    /// Ring slots currently handed out. Overflow slots are not counted.
    pub outstanding: usize,

    /// Slots created outside the ring because the ring was exhausted.
    pub overflow_allocations: u64,

    /// Released slots that were dropped instead of being put back into the ring.
    pub discarded_releases: u64,

    /// Leak scans completed, by the background monitor or on demand.
    pub leak_scans: u64,

    /// Number of overdue slots found by the most recent leak scan.
    pub last_overdue: usize,
}

impl PoolStats {
    /// Whether every ring slot is currently handed out, so the next allocation will create an
    /// overflow slot.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.available == 0
    }

    /// Fraction of the ring currently handed out, from 0.0 to 1.0.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "ring capacities are far below the range where f64 loses integer precision"
    )]
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }

        self.capacity.saturating_sub(self.available) as f64 / self.capacity as f64
    }
}
