//! Collects the log output of a closure so tests can assert on emitted diagnostics.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;

/// An in-memory sink for formatted log lines.
#[derive(Clone, Debug, Default)]
struct LogBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a formatting subscriber installed on the current thread and returns the
/// result together with everything logged meanwhile.
///
/// Events emitted by other threads are not captured.
pub(crate) fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);

    let logs = String::from_utf8_lossy(&buffer.bytes.lock()).into_owned();
    (result, logs)
}
