use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::constants::DONE_MARKER;
use crate::error::Result;
use crate::pool::PoolShared;
use crate::{Error, Payload};

/// One reusable container handed out by a [`RingPool`][crate::RingPool], pairing a payload with
/// the bookkeeping used for leak detection and call-path tracing.
///
/// A slot is obtained from [`RingPool::allocate()`][crate::RingPool::allocate] and given back via
/// [`RingPool::release()`][crate::RingPool::release], which consumes it. While held, the caller
/// may access the payload via [`payload()`][Self::payload] and record the processing stages the
/// slot passes through via [`append_trace()`][Self::append_trace] and friends.
///
/// # Example
///
/// ```rust
/// use std::num::NonZero;
///
/// use ring_pool::{Payload, RingPool};
///
/// struct Counter(u32);
///
/// impl Payload for Counter {
///     fn reset(&mut self) {
///         self.0 = 0;
///     }
///
///     fn describe(&self) -> String {
///         self.0.to_string()
///     }
/// }
///
/// let pool = RingPool::new(NonZero::new(2).unwrap(), || Counter(0));
/// let slot = pool.allocate();
///
/// let ingress = slot.mark_channel_entry("ingress");
/// slot.payload().0 += 1;
/// slot.mark_done(ingress);
///
/// assert_eq!(slot.trace_labels(), vec!["(ingress)✓".to_string()]);
///
/// pool.release(slot);
/// ```
pub struct Slot<P: Payload> {
    index: usize,

    /// Shared with the pool's index of allocated slots so the leak monitor can inspect
    /// a slot that is currently held by a caller.
    state: Arc<Mutex<SlotState<P>>>,

    /// Read-only settings of the pool that created this slot.
    pool: Arc<PoolShared>,
}

impl<P: Payload> Slot<P> {
    pub(crate) fn new(index: usize, payload: P, pool: Arc<PoolShared>) -> Self {
        Self {
            index,
            state: Arc::new(Mutex::new(SlotState::new(payload))),
            pool,
        }
    }

    /// The stable identity of this slot within its pool.
    ///
    /// Ring slots have indices below the pool capacity. Overflow slots, created when the ring was
    /// exhausted, have indices above the pool capacity.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether this slot was created outside the ring because the pool was exhausted.
    ///
    /// Overflow slots are never returned to the ring. Releasing one simply drops it.
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        self.index > self.pool.capacity
    }

    /// Grants access to the payload for reading and writing.
    ///
    /// The slot state stays locked for as long as the returned guard is alive. Do not call other
    /// methods on the same slot while holding the guard, as they would wait for the guard to be
    /// dropped.
    #[must_use]
    pub fn payload(&self) -> MappedMutexGuard<'_, P> {
        MutexGuard::map(self.state.lock(), |state| &mut state.payload)
    }

    /// Appends a trace entry with the given label, stamped with the current time.
    ///
    /// If the previous entry is older than the stall warning threshold of the pool, a warning
    /// naming both labels and the elapsed time is logged.
    ///
    /// Returns the position of the new entry, for use with [`mark_done()`][Self::mark_done].
    pub fn append_trace(&self, label: impl Into<String>) -> usize {
        let label = label.into();
        let now = Instant::now();

        let mut state = self.state.lock();

        if !state.is_allocated {
            warn!(
                slot_index = self.index,
                %label,
                "trace entry ignored because the slot is not allocated"
            );
            return state.trace.len();
        }

        if let Some(previous) = state.trace.last() {
            let elapsed = now.saturating_duration_since(previous.recorded_at);

            if elapsed > self.pool.stall_warning {
                warn!(
                    slot_index = self.index,
                    from = %previous,
                    to = %label,
                    ?elapsed,
                    "slot stalled between processing stages"
                );
            }
        }

        let position = state.trace.len();
        state.trace.push(TraceEntry {
            label,
            recorded_at: now,
            is_done: false,
        });

        position
    }

    /// Marks the trace entry at `position` as completed. Completed entries are shown with the
    /// done marker appended to their label.
    ///
    /// Marking an entry more than once has no further effect. Out of range positions are
    /// ignored. If the slot has already been returned to the pool,
    /// nothing is changed and a warning is logged.
    pub fn mark_done(&self, position: usize) {
        let mut state = self.state.lock();

        if !state.is_allocated {
            warn!(
                slot_index = self.index,
                position, "slot cannot be ticked because it has been returned to the pool"
            );
            return;
        }

        if let Some(entry) = state.trace.get_mut(position) {
            entry.mark_done();
        }
    }

    /// Records entry into a named channel, appending the name wrapped in parentheses as a
    /// trace label.
    ///
    /// Returns the position of the new entry.
    pub fn mark_channel_entry(&self, name: &str) -> usize {
        self.append_trace(format!("({name})"))
    }

    /// Marks the most recent trace entry as completed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotAllocated`] if the slot has been returned to the pool and
    /// [`Error::NoActiveTrace`] if the trace has no entries.
    pub fn mark_channel_done(&self) -> Result<()> {
        let mut state = self.state.lock();

        if !state.is_allocated {
            return Err(Error::NotAllocated {
                slot_index: self.index,
            });
        }

        let entry = state.trace.last_mut().ok_or(Error::NoActiveTrace {
            slot_index: self.index,
        })?;

        entry.mark_done();
        Ok(())
    }

    /// Logs the ordered trace of this slot followed by the description of its payload.
    pub fn print_trace(&self) {
        let rendered = self.render_trace();
        info!(slot_index = self.index, "{rendered}");
    }

    /// Renders the ordered trace of this slot followed by the description of its payload.
    ///
    /// Each entry carries the time elapsed between the allocation of the slot and the entry.
    #[must_use]
    pub fn render_trace(&self) -> String {
        self.state.lock().render(self.index)
    }

    /// The labels of the trace entries, in the order they were appended.
    #[must_use]
    pub fn trace_labels(&self) -> Vec<String> {
        self.state
            .lock()
            .trace
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Whether the slot is currently handed out by its pool.
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.state.lock().is_allocated
    }

    /// Whether the slot has been held for longer than `timeout` since it was allocated.
    ///
    /// A slot that is not allocated is never stale.
    #[must_use]
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.state.lock().is_stale(timeout)
    }

    /// How long the slot has been held since it was allocated, in seconds.
    ///
    /// Zero for a slot that is not allocated.
    #[must_use]
    pub fn age_seconds(&self) -> f64 {
        self.state.lock().age().as_secs_f64()
    }

    pub(crate) fn mark_allocated(&self, now: Instant) {
        let mut state = self.state.lock();
        state.allocated_at = Some(now);
        state.is_allocated = true;
    }

    pub(crate) fn reset(&self) {
        self.state.lock().reset();
    }

    pub(crate) fn belongs_to(&self, pool: &Arc<PoolShared>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }

    pub(crate) fn state_handle(&self) -> Arc<Mutex<SlotState<P>>> {
        Arc::clone(&self.state)
    }
}

impl<P: Payload> fmt::Debug for Slot<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("index", &self.index)
            .field("is_overflow", &self.is_overflow())
            .finish_non_exhaustive()
    }
}

/// The mutable part of a slot, guarded by the slot lock.
///
/// The trace and allocation timestamp are only meaningful while `is_allocated` is set.
/// Only [`reset()`][Self::reset] clears them.
pub(crate) struct SlotState<P> {
    payload: P,
    allocated_at: Option<Instant>,
    trace: Vec<TraceEntry>,
    is_allocated: bool,
}

impl<P: Payload> SlotState<P> {
    fn new(payload: P) -> Self {
        Self {
            payload,
            allocated_at: None,
            trace: Vec::new(),
            is_allocated: false,
        }
    }

    fn reset(&mut self) {
        self.allocated_at = None;
        self.trace.clear();
        self.is_allocated = false;
        self.payload.reset();
    }

    pub(crate) fn age(&self) -> Duration {
        self.allocated_at
            .map_or(Duration::ZERO, |allocated_at| allocated_at.elapsed())
    }

    pub(crate) fn is_stale(&self, timeout: Duration) -> bool {
        self.allocated_at.is_some() && self.age() > timeout
    }

    pub(crate) fn render(&self, index: usize) -> String {
        let steps = if self.trace.is_empty() {
            " (empty)".to_string()
        } else {
            self.trace
                .iter()
                .map(|entry| match self.allocated_at {
                    Some(allocated_at) => format!(
                        " -> {entry} (+{:?})",
                        entry.recorded_at.saturating_duration_since(allocated_at)
                    ),
                    None => format!(" -> {entry}"),
                })
                .collect::<String>()
        };

        format!(
            "slot {index} held for {:?}, trace:{steps}; payload: {}",
            self.age(),
            self.payload.describe()
        )
    }
}

#[derive(Debug)]
struct TraceEntry {
    label: String,
    recorded_at: Instant,
    is_done: bool,
}

impl TraceEntry {
    fn mark_done(&mut self) {
        self.is_done = true;
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)?;

        if self.is_done {
            write!(f, "{DONE_MARKER}")?;
        }

        Ok(())
    }
}
