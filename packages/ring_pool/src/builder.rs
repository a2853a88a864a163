use std::num::NonZero;
use std::time::Duration;

use crate::constants::{DEFAULT_LEAK_SCAN_INTERVAL, DEFAULT_LEAK_THRESHOLD, DEFAULT_STALL_WARNING};
use crate::pool::{MonitorSettings, PayloadFactory, PoolCore};
use crate::{Payload, RingPool};

/// Builder for creating an instance of [`RingPool`].
///
/// The capacity and the payload factory are mandatory and given when creating the builder via
/// [`RingPool::builder()`]. The diagnostic settings are optional and read once, when the pool
/// is built.
///
/// # Examples
///
/// ```
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
/// let pool = RingPool::builder(NonZero::new(32).unwrap(), || Buffer(Vec::new()))
///     .leak_monitor(true)
///     .leak_scan_interval(Duration::from_secs(1))
///     .leak_threshold(Duration::from_secs(2))
///     .stall_warning(Duration::from_millis(100))
///     .build();
///
/// assert!(pool.is_monitored());
/// ```
#[derive(derive_more::Debug)]
#[must_use]
pub struct RingPoolBuilder<P: Payload> {
    capacity: NonZero<usize>,

    #[debug(ignore)]
    factory: PayloadFactory<P>,

    leak_monitor: bool,
    leak_scan_interval: Duration,
    leak_threshold: Duration,
    stall_warning: Duration,
}

impl<P: Payload> RingPoolBuilder<P> {
    pub(crate) fn new(capacity: NonZero<usize>, factory: PayloadFactory<P>) -> Self {
        Self {
            capacity,
            factory,
            leak_monitor: false,
            leak_scan_interval: DEFAULT_LEAK_SCAN_INTERVAL,
            leak_threshold: DEFAULT_LEAK_THRESHOLD,
            stall_warning: DEFAULT_STALL_WARNING,
        }
    }

    /// Whether to run a background thread that periodically reports slots held for longer than
    /// the [leak threshold][Self::leak_threshold].
    ///
    /// Disabled by default.
    pub fn leak_monitor(mut self, enabled: bool) -> Self {
        self.leak_monitor = enabled;
        self
    }

    /// How often the leak monitor scans outstanding slots.
    ///
    /// Default is 5 seconds. Has no effect unless the [leak monitor][Self::leak_monitor] is
    /// enabled.
    ///
    /// # Panics
    ///
    /// Panics if the interval is zero.
    pub fn leak_scan_interval(mut self, interval: Duration) -> Self {
        assert!(
            !interval.is_zero(),
            "leak monitor scan interval must be non-zero"
        );
        self.leak_scan_interval = interval;
        self
    }

    /// How long a slot may be held before the leak monitor reports it.
    ///
    /// Default is 10 seconds.
    pub fn leak_threshold(mut self, threshold: Duration) -> Self {
        self.leak_threshold = threshold;
        self
    }

    /// The longest gap between two consecutive trace entries of a slot before a stall warning
    /// is logged.
    ///
    /// Default is 1 second.
    pub fn stall_warning(mut self, threshold: Duration) -> Self {
        self.stall_warning = threshold;
        self
    }

    /// Builds the pool, creating one payload per ring slot and starting the leak monitor if
    /// it is enabled.
    #[must_use]
    pub fn build(self) -> RingPool<P> {
        let core = PoolCore::new(self.capacity, self.factory, self.stall_warning);

        let monitor = self.leak_monitor.then_some(MonitorSettings {
            interval: self.leak_scan_interval,
            threshold: self.leak_threshold,
        });

        RingPool::from_parts(core, monitor)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::MockPayload;

    fn nz(value: usize) -> NonZero<usize> {
        NonZero::new(value).unwrap()
    }

    #[test]
    fn defaults_match_constants() {
        let builder = RingPool::builder(nz(1), MockPayload::new);

        assert!(!builder.leak_monitor);
        assert_eq!(builder.leak_scan_interval, Duration::from_secs(5));
        assert_eq!(builder.leak_threshold, Duration::from_secs(10));
        assert_eq!(builder.stall_warning, Duration::from_secs(1));
    }

    #[test]
    fn build_calls_factory_once_per_slot() {
        let created = Arc::new(AtomicUsize::new(0));
        let created_clone = Arc::clone(&created);

        let pool = RingPool::builder(nz(7), move || {
            created_clone.fetch_add(1, Ordering::Relaxed);
            MockPayload::new()
        })
        .build();

        assert_eq!(created.load(Ordering::Relaxed), 7);
        assert_eq!(pool.available_count(), 7);
    }

    #[cfg_attr(miri, ignore)]
    #[test]
    fn leak_monitor_is_opt_in() {
        let unmonitored = RingPool::builder(nz(1), MockPayload::new).build();
        let monitored = RingPool::builder(nz(1), MockPayload::new)
            .leak_monitor(true)
            .build();

        assert!(!unmonitored.is_monitored());
        assert!(monitored.is_monitored());
    }

    #[test]
    #[should_panic(expected = "scan interval must be non-zero")]
    fn zero_scan_interval_panics() {
        drop(RingPool::builder(nz(1), MockPayload::new).leak_scan_interval(Duration::ZERO));
    }

    #[test]
    fn debug_output_skips_factory() {
        let builder = RingPool::builder(nz(2), MockPayload::new).leak_monitor(true);

        let debug = format!("{builder:?}");

        assert!(debug.contains("leak_monitor: true"));
        assert!(!debug.contains("factory"));
    }
}
