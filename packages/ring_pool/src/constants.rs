use std::time::Duration;

/// Appended to a trace label once the stage it names has completed.
pub(crate) const DONE_MARKER: char = '✓';

/// How often the leak monitor wakes up to scan outstanding slots, unless overridden.
pub(crate) const DEFAULT_LEAK_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// How long a slot may be held before the leak monitor reports it, unless overridden.
pub(crate) const DEFAULT_LEAK_THRESHOLD: Duration = Duration::from_secs(10);

/// Maximum gap between consecutive trace entries before a stall is reported, unless overridden.
pub(crate) const DEFAULT_STALL_WARNING: Duration = Duration::from_secs(1);

pub(crate) const MONITOR_THREAD_NAME: &str = "ring_pool-leak-monitor";
