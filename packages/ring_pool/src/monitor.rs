//! Background leak monitor lifecycle.

use std::any::type_name;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rsevents::{Awaitable, EventState, ManualResetEvent};
use tracing::{debug, error};

use crate::constants::MONITOR_THREAD_NAME;

/// Runs a scan on a fixed interval on a dedicated thread until dropped.
///
/// Dropping the monitor signals the thread to stop and blocks until it has exited. A scan that
/// is in progress at that moment is allowed to finish.
pub(crate) struct LeakMonitor {
    interval: Duration,
    stop: Arc<ManualResetEvent>,
    thread: Option<JoinHandle<()>>,
}

impl LeakMonitor {
    pub(crate) fn start<S>(interval: Duration, scan: S) -> Self
    where
        S: Fn() + Send + 'static,
    {
        let stop = Arc::new(ManualResetEvent::new(EventState::Unset));
        let stop_clone = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name(MONITOR_THREAD_NAME.to_string())
            .spawn(move || {
                debug!(?interval, "leak monitor started");

                // Returns true once the stop signal is set, false when the interval elapses.
                while !stop_clone.wait_for(interval) {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(&scan)) {
                        error!("leak scan panicked, the leak monitor has stopped");
                        panic::resume_unwind(payload);
                    }
                }

                debug!("leak monitor stopped");
            })
            .expect("failed to spawn leak monitor thread: thread spawning failure is not supported");

        Self {
            interval,
            stop,
            thread: Some(thread),
        }
    }
}

impl fmt::Debug for LeakMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("interval", &self.interval)
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

impl Drop for LeakMonitor {
    #[cfg_attr(test, mutants::skip)] // Removing this causes timeouts (the monitor never stops).
    fn drop(&mut self) {
        self.stop.set();

        if let Some(thread) = self.thread.take() {
            // The scan only reads pool state. A panic here means a payload panicked while
            // describing itself. It was already logged by the monitor thread and is re-raised
            // unless this thread is unwinding, where a second panic would abort.
            if let Err(payload) = thread.join() {
                if !thread::panicking() {
                    panic::resume_unwind(payload);
                }
            }
        }
    }
}
