use std::any::type_name;
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::num::NonZero;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use foldhash::{HashMap, HashMapExt};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::monitor::LeakMonitor;
use crate::slot::SlotState;
use crate::{Payload, PoolStats, RingPoolBuilder, Slot};

/// Creates a new payload for a slot. Any pool-wide construction arguments are captured.
pub(crate) type PayloadFactory<P> = Box<dyn Fn() -> P + Send + Sync>;

/// Read-only settings shared between a pool and every slot it creates.
///
/// Slots hold a reference to this to read diagnostic configuration and to identify the pool
/// they belong to.
#[derive(Debug)]
pub(crate) struct PoolShared {
    pub(crate) capacity: usize,
    pub(crate) stall_warning: Duration,
}

/// A fixed-capacity pool of reusable [`Slot`]s arranged as a circular buffer.
///
/// The ring holds the free slots. [`allocate()`][Self::allocate] takes the slot at the
/// allocation index and [`release()`][Self::release] puts a slot back at the release index,
/// both indices advancing around the ring. Every slot handed out from the ring is also recorded
/// in an index of outstanding slots, which the leak monitor scans for slots held too long.
///
/// If the ring is exhausted, [`allocate()`][Self::allocate] creates an overflow slot outside the
/// ring instead of blocking. Overflow slots are never returned to the ring.
///
/// # Thread safety
///
/// This type is thread-safe. All pool state is guarded by a single lock, held for the full
/// duration of each operation. Share the pool by reference or via `Arc`.
///
/// # Lifetime
///
/// When the pool is dropped, the leak monitor (if enabled) is signaled to stop and the drop
/// blocks until the monitor thread has exited.
///
/// # Example
///
/// ```rust
/// use std::num::NonZero;
/// use std::sync::Arc;
/// use std::thread;
///
/// use ring_pool::{Payload, RingPool};
///
/// struct Buffer(Vec<u8>);
///
/// impl Payload for Buffer {
///     fn reset(&mut self) {
///         self.0.clear();
///     }
///
///     fn describe(&self) -> String {
///         format!("{:?}", self.0)
///     }
/// }
///
/// let pool = Arc::new(RingPool::new(NonZero::new(8).unwrap(), || {
///     Buffer(Vec::with_capacity(64))
/// }));
///
/// let pool_clone = Arc::clone(&pool);
/// thread::spawn(move || {
///     let slot = pool_clone.allocate();
///     slot.payload().0.push(1);
///     pool_clone.release(slot);
/// })
/// .join()
/// .unwrap();
///
/// assert_eq!(pool.available_count(), 8);
/// ```
pub struct RingPool<P: Payload> {
    // Declared first so the monitor stops before the core is released.
    monitor: Option<LeakMonitor>,
    core: Arc<PoolCore<P>>,
}

impl<P: Payload> RingPool<P> {
    /// Creates a new pool with `capacity` ring slots and default diagnostic settings.
    ///
    /// The factory is called once per ring slot here, and again for every overflow slot. Any
    /// pool-wide construction arguments (such as a buffer size) are captured by the closure.
    ///
    /// The leak monitor is disabled. Use [`RingPool::builder()`] to enable it.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::num::NonZero;
    ///
    /// use ring_pool::{Payload, RingPool};
    ///
    /// struct Buffer(Vec<u8>);
    ///
    /// impl Payload for Buffer {
    ///     fn reset(&mut self) {
    ///         self.0.clear();
    ///     }
    ///
    ///     fn describe(&self) -> String {
    ///         format!("{} bytes", self.0.len())
    ///     }
    /// }
    ///
    /// let buffer_len = 1500;
    /// let pool = RingPool::new(NonZero::new(16).unwrap(), move || {
    ///     Buffer(Vec::with_capacity(buffer_len))
    /// });
    ///
    /// assert_eq!(pool.available_count(), 16);
    /// ```
    #[must_use]
    pub fn new<F>(capacity: NonZero<usize>, factory: F) -> Self
    where
        F: Fn() -> P + Send + Sync + 'static,
    {
        Self::builder(capacity, factory).build()
    }

    /// Returns a builder for creating a [`RingPool`] with custom diagnostic configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::num::NonZero;
    /// use std::time::Duration;
    ///
    /// use ring_pool::{Payload, RingPool};
    ///
    /// struct Buffer(Vec<u8>);
    ///
    /// impl Payload for Buffer {
    ///     fn reset(&mut self) {
    ///         self.0.clear();
    ///     }
    ///
    ///     fn describe(&self) -> String {
    ///         format!("{} bytes", self.0.len())
    ///     }
    /// }
    ///
    /// let pool = RingPool::builder(NonZero::new(16).unwrap(), || Buffer(Vec::new()))
    ///     .leak_monitor(true)
    ///     .leak_threshold(Duration::from_secs(30))
    ///     .build();
    /// ```
    pub fn builder<F>(capacity: NonZero<usize>, factory: F) -> RingPoolBuilder<P>
    where
        F: Fn() -> P + Send + Sync + 'static,
    {
        RingPoolBuilder::new(capacity, Box::new(factory))
    }

    pub(crate) fn from_parts(core: PoolCore<P>, monitor_settings: Option<MonitorSettings>) -> Self {
        let core = Arc::new(core);

        let monitor = monitor_settings.map(|settings| {
            let core = Arc::clone(&core);
            LeakMonitor::start(settings.interval, move || {
                core.scan_overdue(settings.threshold);
            })
        });

        Self { monitor, core }
    }

    /// Hands out a slot. Never blocks and never fails.
    ///
    /// If the ring has a free slot, that slot is returned and recorded as outstanding. If the
    /// ring is exhausted, a new overflow slot is created outside the ring and a warning is
    /// logged. Under sustained exhaustion this trades memory growth for availability.
    #[must_use]
    pub fn allocate(&self) -> Slot<P> {
        let mut state = self.core.state.lock();

        if state.is_empty {
            let index = state.claim_overflow_index();
            drop(state);

            return self.core.create_overflow(index);
        }

        let position = state.next_alloc;

        let Some(slot) = state.ring.get_mut(position).and_then(Option::take) else {
            // The flags claim the ring has a free slot but the position is vacant.
            error!(position, "ring position expected to hold a free slot was vacant");
            let index = state.claim_overflow_index();
            drop(state);

            return self.core.create_overflow(index);
        };

        slot.mark_allocated(Instant::now());

        state.next_alloc = self.core.advance(position);
        if state.next_alloc == state.next_free {
            state.is_empty = true;
        }
        state.is_full = false;

        state.allocated.insert(slot.index(), slot.state_handle());

        slot
    }

    /// Takes back a slot previously handed out by [`allocate()`][Self::allocate].
    ///
    /// The slot is reset (payload, trace and allocation timestamp are cleared) and put back into
    /// the ring, where it becomes available for the next allocation.
    ///
    /// Overflow slots, slots created by a different pool and slots released into a ring that is
    /// already full are dropped with a log message instead. None of these are reported to the
    /// caller, who has given up the slot either way.
    pub fn release(&self, slot: Slot<P>) {
        if slot.is_overflow() {
            debug!(
                slot_index = slot.index(),
                "overflow slot returned to pool, dropping it"
            );
            self.core.record_discard();
            return;
        }

        if !slot.belongs_to(&self.core.shared) {
            warn!(
                slot_index = slot.index(),
                "slot returned to a pool that did not create it, dropping it"
            );
            self.core.record_discard();
            return;
        }

        let mut state = self.core.state.lock();

        if state.is_full {
            warn!(
                slot_index = slot.index(),
                "ring is already full, cannot take back another slot, dropping it"
            );
            self.core.record_discard();
            return;
        }

        let index = slot.index();
        let position = state.next_free;

        let Some(vacancy) = state.ring.get_mut(position) else {
            error!(position, "release index is outside the ring, dropping slot");
            self.core.record_discard();
            return;
        };

        // Reset happens before the slot re-enters the ring, inside the same critical section.
        slot.reset();
        *vacancy = Some(slot);

        state.next_free = self.core.advance(position);
        if state.next_free == state.next_alloc {
            state.is_full = true;
        }
        state.is_empty = false;

        state.allocated.remove(&index);
    }

    /// The number of free slots currently in the ring.
    ///
    /// Overflow slots do not count towards this. The value can change as soon as the call
    /// returns if other threads are using the pool.
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.core.state.lock().available(self.core.capacity)
    }

    /// The number of ring slots, fixed at construction.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.capacity.get()
    }

    /// Reports every outstanding slot held for longer than `threshold`, logging its trace.
    ///
    /// This is the same pass that the leak monitor performs on every tick. It only reads slot
    /// state. Reclaiming overdue slots remains the responsibility of whoever holds them.
    ///
    /// Returns the number of overdue slots found.
    pub fn scan_overdue(&self, threshold: Duration) -> usize {
        self.core.scan_overdue(threshold)
    }

    /// Returns a point-in-time snapshot of the pool's occupancy and diagnostic counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (available, outstanding) = {
            let state = self.core.state.lock();
            (state.available(self.core.capacity), state.allocated.len())
        };

        // Relaxed ordering is sufficient for monotonic counters with no synchronization needs.
        PoolStats {
            capacity: self.core.capacity.get(),
            available,
            outstanding,
            overflow_allocations: self.core.overflow_allocations.load(Ordering::Relaxed),
            discarded_releases: self.core.discarded_releases.load(Ordering::Relaxed),
            leak_scans: self.core.leak_scans.load(Ordering::Relaxed),
            last_overdue: self.core.last_overdue.load(Ordering::Relaxed),
        }
    }

    /// Whether the background leak monitor is running for this pool.
    #[must_use]
    pub fn is_monitored(&self) -> bool {
        self.monitor.is_some()
    }
}

impl<P: Payload> fmt::Debug for RingPool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("capacity", &self.core.capacity)
            .field("available", &self.available_count())
            .field("monitored", &self.is_monitored())
            .finish_non_exhaustive()
    }
}

pub(crate) struct MonitorSettings {
    pub(crate) interval: Duration,
    pub(crate) threshold: Duration,
}

/// The pool state shared between the [`RingPool`] and its leak monitor thread.
pub(crate) struct PoolCore<P: Payload> {
    capacity: NonZero<usize>,
    state: Mutex<RingState<P>>,
    shared: Arc<PoolShared>,
    factory: PayloadFactory<P>,

    overflow_allocations: AtomicU64,
    discarded_releases: AtomicU64,
    leak_scans: AtomicU64,
    last_overdue: AtomicUsize,
}

impl<P: Payload> PoolCore<P> {
    pub(crate) fn new(
        capacity: NonZero<usize>,
        factory: PayloadFactory<P>,
        stall_warning: Duration,
    ) -> Self {
        let shared = Arc::new(PoolShared {
            capacity: capacity.get(),
            stall_warning,
        });

        let ring = (0..capacity.get())
            .map(|index| Some(Slot::new(index, factory(), Arc::clone(&shared))))
            .collect();

        Self {
            capacity,
            state: Mutex::new(RingState {
                ring,
                next_alloc: 0,
                next_free: 0,
                // Every slot starts out free.
                is_full: true,
                is_empty: false,
                allocated: HashMap::with_capacity(capacity.get()),
                next_overflow_index: capacity.get().saturating_add(1),
            }),
            shared,
            factory,
            overflow_allocations: AtomicU64::new(0),
            discarded_releases: AtomicU64::new(0),
            leak_scans: AtomicU64::new(0),
            last_overdue: AtomicUsize::new(0),
        }
    }

    fn advance(&self, position: usize) -> usize {
        let next = position.wrapping_add(1);

        if next == self.capacity.get() { 0 } else { next }
    }

    fn create_overflow(&self, index: usize) -> Slot<P> {
        warn!(
            slot_index = index,
            capacity = self.capacity.get(),
            "ring pool is exhausted, allocating an overflow slot; performance will suffer until slots are returned"
        );

        // Relaxed ordering is sufficient for a monotonic counter with no synchronization needs.
        self.overflow_allocations.fetch_add(1, Ordering::Relaxed);

        let slot = Slot::new(index, (self.factory)(), Arc::clone(&self.shared));
        slot.mark_allocated(Instant::now());
        slot
    }

    fn record_discard(&self) {
        // Relaxed ordering is sufficient for a monotonic counter with no synchronization needs.
        self.discarded_releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn scan_overdue(&self, threshold: Duration) -> usize {
        // Slot locks are never taken while holding the pool lock here. A caller may hold a slot
        // lock (via a payload guard) while waiting for the pool lock.
        let outstanding: Vec<_> = {
            let state = self.state.lock();
            state
                .allocated
                .iter()
                .map(|(index, slot)| (*index, Arc::clone(slot)))
                .collect()
        };

        let mut overdue: usize = 0;

        for (index, slot) in outstanding {
            let slot = slot.lock();

            if slot.is_stale(threshold) {
                warn!(
                    slot_index = index,
                    age = ?slot.age(),
                    trace = %slot.render(index),
                    "slot held longer than the leak threshold"
                );
                overdue = overdue.saturating_add(1);
            }
        }

        if overdue > 0 {
            warn!(overdue, ?threshold, "leak scan found overdue slots");
        } else {
            debug!(?threshold, "leak scan found no overdue slots");
        }

        // Relaxed ordering is sufficient, these are only read for statistics.
        self.leak_scans.fetch_add(1, Ordering::Relaxed);
        self.last_overdue.store(overdue, Ordering::Relaxed);

        overdue
    }
}

/// Everything guarded by the pool lock, mutated only as one unit.
struct RingState<P: Payload> {
    /// Free slots. Positions between the allocation and release indices are vacant.
    ring: Vec<Option<Slot<P>>>,

    next_alloc: usize,
    next_free: usize,

    /// The two indices coincide both when every slot is free and when none is.
    /// These flags tell the two cases apart.
    is_full: bool,
    is_empty: bool,

    /// Outstanding ring slots by slot index. Overflow slots are not tracked.
    allocated: HashMap<usize, Arc<Mutex<SlotState<P>>>>,

    next_overflow_index: usize,
}

impl<P: Payload> RingState<P> {
    fn claim_overflow_index(&mut self) -> usize {
        let index = self.next_overflow_index;
        self.next_overflow_index = index.saturating_add(1);
        index
    }

    #[expect(
        clippy::arithmetic_side_effects,
        reason = "both indices are below capacity and each branch subtracts the smaller from the larger"
    )]
    fn available(&self, capacity: NonZero<usize>) -> usize {
        match self.next_alloc.cmp(&self.next_free) {
            CmpOrdering::Greater => capacity.get() - (self.next_alloc - self.next_free),
            CmpOrdering::Less => self.next_free - self.next_alloc,
            CmpOrdering::Equal => {
                if self.is_full {
                    capacity.get()
                } else {
                    0
                }
            }
        }
    }
}
